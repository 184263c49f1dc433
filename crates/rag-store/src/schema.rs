//! Database schema definitions.

/// Main schema SQL for initializing the index database.
pub const SCHEMA: &str = r#"
-- Index-wide settings: distance metric, dimension, model, fingerprint
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Chunks with their embeddings; seq preserves insertion order
CREATE TABLE IF NOT EXISTS chunks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    start_char INTEGER NOT NULL,
    content TEXT NOT NULL,
    content_hash BLOB NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// Keys of the `index_meta` table.
pub mod meta {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const DISTANCE_METRIC: &str = "distance_metric";
    pub const DIMENSION: &str = "dimension";
    pub const EMBEDDING_MODEL: &str = "embedding_model";
    pub const CORPUS_FINGERPRINT: &str = "corpus_fingerprint";
    pub const CREATED_AT: &str = "created_at";
}

/// The only supported metric.
pub const DISTANCE_METRIC: &str = "cosine";
