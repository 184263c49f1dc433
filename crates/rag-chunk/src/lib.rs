//! rag-chunk - Chunking for the ingestion pipeline
//!
//! Splits documents into fixed-size overlapping character windows and
//! normalizes chunk text to NFC before it is embedded.
//!
//! # Example
//!
//! ```rust
//! use rag_chunk::{ChunkConfig, Chunker, WindowChunker};
//!
//! let config = ChunkConfig { chunk_size: 4, chunk_overlap: 1 };
//! let chunks = WindowChunker::new().chunk("abcdefghij", &config).unwrap();
//! assert_eq!(chunks.len(), 3);
//! ```

mod normalize;
mod window;

pub use normalize::{normalize_in_place, normalize_nfc};
pub use window::WindowChunker;

// Re-export types for convenience
pub use rag_core::{ChunkConfig, ChunkData, Chunker};
