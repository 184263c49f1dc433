//! Load, chunk, embed and persist, end to end.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use rag_chunk::{normalize_in_place, ChunkConfig, Chunker, WindowChunker};
use rag_core::{Chunk, Document, Embedder, IngestionConfig, RagError, Result, VectorStore};
use rag_store::SqliteVectorIndex;

use crate::loader;

/// What an ingestion run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents loaded from the docs directory.
    pub documents: usize,

    /// Chunks in the resulting index.
    pub chunks: usize,

    /// An existing index was returned instead of building one.
    pub reused: bool,

    /// The reused index was built from different documents or chunk settings.
    pub stale: bool,

    /// Wall time of the run.
    pub elapsed_ms: u64,
}

/// Staged ingestion: `load_documents`, then `split_documents`, then
/// `create_vector_store`. Each stage requires the previous one.
pub struct IngestionPipeline {
    config: IngestionConfig,
    embedder: Arc<dyn Embedder>,
    chunker: WindowChunker,
    documents: Option<Vec<Document>>,
    chunks: Option<Vec<Chunk>>,
}

impl IngestionPipeline {
    /// Create a pipeline. Chunk settings are validated here, before any I/O.
    pub fn new(config: IngestionConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.chunk_config().validate()?;
        if config.batch_size == 0 {
            return Err(RagError::config("batch_size must be at least 1"));
        }

        Ok(Self {
            config,
            embedder,
            chunker: WindowChunker::new(),
            documents: None,
            chunks: None,
        })
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn documents(&self) -> Option<&[Document]> {
        self.documents.as_deref()
    }

    pub fn chunks(&self) -> Option<&[Chunk]> {
        self.chunks.as_deref()
    }

    /// Read the docs directory.
    pub fn load_documents(&mut self) -> Result<&[Document]> {
        let documents = loader::load_documents(
            &self.config.docs_path,
            &self.config.extension,
            self.config.recursive,
        )?;
        self.chunks = None;
        let documents: &[Document] = self.documents.insert(documents);
        Ok(documents)
    }

    /// Split loaded documents into overlapping windows, in document order.
    pub fn split_documents(&mut self) -> Result<&[Chunk]> {
        let documents = self.documents.as_deref().ok_or_else(|| {
            RagError::precondition(
                "Documents not loaded. Call load_documents() before split_documents().",
            )
        })?;

        info!("Splitting {} documents into chunks", documents.len());
        let chunk_config = self.config.chunk_config();

        let mut chunks = Vec::new();
        for doc in documents {
            let windows = self.chunker.chunk(&doc.text, &chunk_config)?;
            debug!("{}: {} chunks", doc.source(), windows.len());
            for (i, window) in windows.into_iter().enumerate() {
                chunks.push(Chunk::new(
                    doc.source(),
                    i as u32,
                    window.start_char,
                    window.content,
                ));
            }
        }

        info!("Created {} chunks", chunks.len());
        let chunks: &[Chunk] = self.chunks.insert(chunks);
        Ok(chunks)
    }

    /// Return the persisted index, building it first if there is none.
    ///
    /// An existing index is opened unchanged: nothing is embedded and
    /// nothing is merged. A fresh build needs chunks from `split_documents`.
    /// The returned handle is read-only.
    pub async fn create_vector_store(&mut self) -> Result<(SqliteVectorIndex, IngestReport)> {
        let start = Instant::now();
        let dir = self.config.persist_directory.clone();

        if SqliteVectorIndex::exists(&dir) {
            info!(
                "Vector index already exists in {:?}, not processing documents",
                dir
            );
            let index = SqliteVectorIndex::open(&dir)?;
            let stale = self.check_stale(&index)?;
            let report = IngestReport {
                documents: self.documents.as_ref().map_or(0, Vec::len),
                chunks: index.count()? as usize,
                reused: true,
                stale,
                elapsed_ms: start.elapsed().as_millis() as u64,
            };
            return Ok((index, report));
        }

        let pending = match self.chunks.as_mut() {
            Some(chunks) if !chunks.is_empty() => chunks,
            _ => {
                return Err(RagError::precondition(
                    "No chunks available to index. Call split_documents() first.",
                ))
            }
        };

        let mut rewritten = 0;
        for chunk in pending.iter_mut() {
            if normalize_in_place(&mut chunk.text) {
                rewritten += 1;
            }
        }
        if rewritten > 0 {
            debug!("Normalized {} chunks to NFC", rewritten);
        }
        let pending: &[Chunk] = pending;

        info!(
            "Embedding {} chunks with {} into {:?}",
            pending.len(),
            self.embedder.model_name(),
            dir
        );
        let builder = SqliteVectorIndex::create(&dir, self.embedder.model_name())?;

        let batches = pending.len().div_ceil(self.config.batch_size);
        for (i, batch) in pending.chunks(self.config.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_documents(&texts).await?;
            builder.add(batch, &embeddings).await?;
            debug!("Embedded batch {}/{} ({} chunks)", i + 1, batches, batch.len());
        }

        if let Some(documents) = self.documents.as_deref() {
            builder.set_corpus_fingerprint(&corpus_fingerprint(
                documents,
                &self.config.chunk_config(),
            ))?;
        }
        builder.finish()?;

        let index = SqliteVectorIndex::open(&dir)?;
        let report = IngestReport {
            documents: self.documents.as_ref().map_or(0, Vec::len),
            chunks: pending.len(),
            reused: false,
            stale: false,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Vector index created in {:?} ({} chunks, {}ms)",
            dir, report.chunks, report.elapsed_ms
        );
        Ok((index, report))
    }

    /// Load, split and index. Idempotent: a second run reuses the index.
    pub async fn run(&mut self) -> Result<(SqliteVectorIndex, IngestReport)> {
        self.load_documents()?;
        self.split_documents()?;
        self.create_vector_store().await
    }

    /// Discard any persisted index and build a new one.
    ///
    /// Documents are loaded and split before the old index is removed, so a
    /// bad docs directory leaves the existing index in place.
    pub async fn rebuild(&mut self) -> Result<(SqliteVectorIndex, IngestReport)> {
        self.load_documents()?;
        self.split_documents()?;
        if SqliteVectorIndex::destroy(&self.config.persist_directory)? {
            info!(
                "Removed existing vector index in {:?}",
                self.config.persist_directory
            );
        }
        self.create_vector_store().await
    }

    fn check_stale(&self, index: &SqliteVectorIndex) -> Result<bool> {
        if let Some(model) = index.embedding_model()? {
            if model != self.embedder.model_name() {
                warn!(
                    "Index was built with embedding model {:?} but {:?} is configured",
                    model,
                    self.embedder.model_name()
                );
            }
        }

        let (Some(documents), Some(stored)) =
            (self.documents.as_deref(), index.corpus_fingerprint()?)
        else {
            return Ok(false);
        };

        let current = corpus_fingerprint(documents, &self.config.chunk_config());
        if current != stored {
            warn!(
                "Documents in {:?} changed since the index was built; rebuild to pick them up",
                self.config.docs_path
            );
            return Ok(true);
        }
        Ok(false)
    }
}

/// Blake3 digest over chunk settings and every document's source and text.
pub fn corpus_fingerprint(documents: &[Document], chunk_config: &ChunkConfig) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(chunk_config.chunk_size as u64).to_le_bytes());
    hasher.update(&(chunk_config.chunk_overlap as u64).to_le_bytes());
    for doc in documents {
        hasher.update(doc.source().as_bytes());
        hasher.update(&[0]);
        hasher.update(doc.text.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}
