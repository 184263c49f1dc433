//! rag-store - Persisted vector index on SQLite
//!
//! Stores chunks and their embeddings in `<persist_directory>/index.sqlite`
//! and answers nearest-neighbour queries by exhaustive cosine similarity.
//! An advisory lock on the persist directory keeps builders and readers
//! from overlapping.

mod lock;
mod schema;
mod sqlite;

pub use lock::LOCK_FILE;
pub use sqlite::{cosine_similarity, SqliteVectorIndex, INDEX_FILE};

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
