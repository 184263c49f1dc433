//! rag-query - Retrieval
//!
//! Wraps the persisted vector index with a search policy: plain top-k, or
//! top-k with a minimum similarity score.
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::{Retriever, RetrieverConfig};
//! use std::sync::Arc;
//!
//! let retriever = Retriever::open(&persist_dir, Arc::new(embedder), RetrieverConfig::default())?;
//! let results = retriever.retrieve("How much did Microsoft pay for GitHub?").await?;
//! ```

mod retriever;

pub use retriever::Retriever;

/// Search policy settings, shared with the `[retrieval]` config section.
pub use rag_core::RetrievalConfig as RetrieverConfig;

// Re-export for convenience
pub use rag_core::{SearchResult, SearchType};
