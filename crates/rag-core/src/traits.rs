//! Core traits defining the seams between components.
//!
//! The embedding function, the chat model and the vector index are external
//! collaborators; every component receives them explicitly.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, Chunk, IndexStats, SearchResult};

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension, when known without calling the model.
    fn dimension(&self) -> Option<usize>;

    /// Model identifier, recorded in the index at build time.
    fn model_name(&self) -> &str;
}

/// Chat completion trait. Text in, text out; no streaming.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send an ordered list of messages and return the reply content.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model identifier.
    fn model_name(&self) -> &str;
}

/// Persisted vector index trait.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store chunks with their embeddings (1:1, same order).
    async fn add(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Return up to `k` chunks by descending cosine similarity.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Index statistics.
    async fn stats(&self) -> Result<IndexStats>;
}

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Window size in characters.
    pub chunk_size: usize,

    /// Characters repeated between consecutive windows.
    pub chunk_overlap: usize,
}

impl ChunkConfig {
    /// Check that the window advances.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(crate::RagError::config("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(crate::RagError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 5,
        }
    }
}

/// Chunking strategy trait.
pub trait Chunker: Send + Sync {
    /// Split text into windows.
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>>;
}

/// Raw chunk data before it is tied to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    /// Window text.
    pub content: String,

    /// Char offset of the window start.
    pub start_char: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_config_validate() {
        assert!(ChunkConfig::default().validate().is_ok());
        assert!(ChunkConfig {
            chunk_size: 10,
            chunk_overlap: 10
        }
        .validate()
        .is_err());
        assert!(ChunkConfig {
            chunk_size: 0,
            chunk_overlap: 0
        }
        .validate()
        .is_err());
    }
}
