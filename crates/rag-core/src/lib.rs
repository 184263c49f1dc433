//! rag-core - Core types and traits for the RAG pipeline
//!
//! This crate provides the domain types, collaborator traits, configuration
//! and error handling shared by every other rag-demo crate.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{RagError, Result};
pub use traits::*;
pub use types::*;
