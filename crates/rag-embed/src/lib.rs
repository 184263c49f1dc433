//! rag-embed - Offline embedding
//!
//! Provides [`HashEmbedder`], a deterministic embedder that needs no model
//! service. Service-backed embedding lives in `rag-ollama`.

mod hashing;

pub use hashing::{HashEmbedder, DEFAULT_DIMENSION};

// Re-export the Embedder trait for convenience
pub use rag_core::Embedder;
