//! Advisory lock on a persist directory.
//!
//! Builders hold it exclusively, readers share it. Both use non-blocking
//! acquisition so contention surfaces as [`RagError::IndexLocked`].

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use rag_core::{RagError, Result};

/// Lock file name inside the persist directory.
pub const LOCK_FILE: &str = ".lock";

/// Held for the lifetime of an index handle; released on drop.
#[derive(Debug)]
pub(crate) struct DirLock {
    file: File,
    dir: PathBuf,
}

impl DirLock {
    pub fn exclusive(dir: &Path) -> Result<Self> {
        Self::acquire(dir, true)
    }

    pub fn shared(dir: &Path) -> Result<Self> {
        Self::acquire(dir, false)
    }

    fn acquire(dir: &Path, exclusive: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        let locked = if exclusive {
            FileExt::try_lock_exclusive(&file)
        } else {
            FileExt::try_lock_shared(&file)
        };

        if let Err(e) = locked {
            return Err(if e.kind() == ErrorKind::WouldBlock {
                RagError::IndexLocked {
                    path: dir.to_path_buf(),
                }
            } else {
                RagError::Io(e)
            });
        }

        debug!(
            "Acquired {} lock on {:?}",
            if exclusive { "exclusive" } else { "shared" },
            dir
        );
        Ok(Self {
            file,
            dir: dir.to_path_buf(),
        })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released lock on {:?}", self.dir);
    }
}
