//! Fixed-size sliding window chunker.
//!
//! Windows are measured in Unicode scalar values so a code point is never
//! split. Consecutive windows share `chunk_overlap` characters.

use rag_core::{ChunkConfig, ChunkData, Chunker, Result};

/// Sliding window chunker.
///
/// For text of length `L`, window `C` and overlap `O`, produces one window when
/// `L <= C` and `ceil((L - O) / (C - O))` windows otherwise. The last window
/// always ends at the end of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowChunker;

impl WindowChunker {
    /// Create a new window chunker.
    pub fn new() -> Self {
        Self
    }

    /// Number of windows produced for `len` characters.
    pub fn expected_windows(len: usize, config: &ChunkConfig) -> usize {
        if len == 0 {
            return 0;
        }
        if len <= config.chunk_size {
            return 1;
        }
        let step = config.chunk_size - config.chunk_overlap;
        (len - config.chunk_overlap).div_ceil(step)
    }
}

impl Chunker for WindowChunker {
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>> {
        config.validate()?;

        if content.is_empty() {
            return Ok(Vec::new());
        }

        // Byte offset of every char boundary, plus the end of the string.
        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = config.chunk_size - config.chunk_overlap;

        let mut chunks = Vec::with_capacity(Self::expected_windows(total_chars, config));
        let mut start = 0;

        loop {
            let end = (start + config.chunk_size).min(total_chars);
            chunks.push(ChunkData {
                content: content[boundaries[start]..boundaries[end]].to_string(),
                start_char: start,
            });

            if end == total_chars {
                break;
            }
            start += step;
        }

        Ok(chunks)
    }
}
