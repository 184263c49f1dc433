//! rag-ollama - Ollama model service client
//!
//! Implements [`rag_core::Embedder`] and [`rag_core::ChatModel`] over the
//! Ollama HTTP API. Connection errors, timeouts, 429 and 5xx replies are
//! retried with exponential backoff before surfacing as
//! [`rag_core::RagError::Dependency`].

mod chat;
mod client;
mod embed;
pub mod retry;

#[cfg(test)]
mod stub;

pub use chat::OllamaChat;
pub use client::OllamaClient;
pub use embed::OllamaEmbedder;
pub use retry::RetryPolicy;
