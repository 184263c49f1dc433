//! rag-ingest - Ingestion pipeline
//!
//! Loads text files, splits them into overlapping windows, normalizes the
//! windows to NFC, embeds them in batches and persists the vector index.
//! A second run against the same persist directory reuses the index.

mod loader;
mod pipeline;

pub use loader::load_documents;
pub use pipeline::{corpus_fingerprint, IngestReport, IngestionPipeline};
