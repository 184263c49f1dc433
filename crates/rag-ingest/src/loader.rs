//! Directory loader: one [`Document`] per matching text file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use rag_core::{Document, RagError, Result};

/// Read every file with the given extension under `docs_path`, in path order.
///
/// Fails with `NotFound` if the directory is missing or holds no matching
/// files, and with `LoadFailed` if a matching file is not valid UTF-8.
pub fn load_documents(docs_path: &Path, extension: &str, recursive: bool) -> Result<Vec<Document>> {
    info!("Loading documents from {:?}", docs_path);

    if !docs_path.exists() {
        return Err(RagError::not_found(format!(
            "Directory {} does not exist.",
            docs_path.display()
        )));
    }
    if !docs_path.is_dir() {
        return Err(RagError::not_found(format!(
            "{} is not a directory.",
            docs_path.display()
        )));
    }

    let extension = extension.trim_start_matches('.');
    let mut files = collect_files(docs_path, extension, recursive)?;
    files.sort();

    if files.is_empty() {
        return Err(RagError::not_found(format!(
            "No .{} files found in {}.",
            extension,
            docs_path.display()
        )));
    }

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let bytes = fs::read(&path).map_err(|e| RagError::LoadFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| RagError::LoadFailed {
            path: path.clone(),
            reason: format!("not valid UTF-8: {}", e),
        })?;

        debug!("Loaded {:?} ({} bytes)", path, text.len());
        documents.push(Document::new(path.display().to_string(), text));
    }

    info!("Loaded {} documents", documents.len());
    Ok(documents)
}

/// Matching files under `dir`. Symlinked directories are not descended into,
/// so a link cycle cannot yield the same file twice.
fn collect_files(dir: &Path, extension: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(io::Error::from)?;

        // A symlink to a file still counts; a symlink to a directory does not.
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file && has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_one_document_per_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs = load_documents(dir.path(), "txt", false).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].source().ends_with("a.txt"));
        assert_eq!(docs[0].text, "first");
        assert!(docs[1].source().ends_with("b.txt"));
    }

    #[test]
    fn test_recursive_flag() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("top.txt"), "top").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.txt"), "deep").unwrap();

        assert_eq!(load_documents(dir.path(), "txt", false).unwrap().len(), 1);
        assert_eq!(load_documents(dir.path(), ".txt", true).unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_loads_each_file_once() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "only").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let docs = load_documents(dir.path(), "txt", true).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "only");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_loaded() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("linked.txt"), "linked").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("linked.txt"),
            dir.path().join("linked.txt"),
        )
        .unwrap();

        let docs = load_documents(dir.path(), "txt", false).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "linked");
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = load_documents(&dir.path().join("nope"), "txt", false).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_no_matching_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), "x").unwrap();

        let err = load_documents(dir.path(), "txt", false).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(err.to_string().contains("No .txt files"));
    }

    #[test]
    fn test_invalid_utf8() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let err = load_documents(dir.path(), "txt", false).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_FAILED");
    }
}
