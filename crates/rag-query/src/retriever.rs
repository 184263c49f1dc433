//! Search policy over the vector index.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use rag_core::{
    Embedder, IndexStats, RagError, Result, RetrievalConfig, SearchResult, SearchType,
    VectorStore,
};
use rag_store::SqliteVectorIndex;

/// Turns a question into ranked chunks.
///
/// Results are ordered by descending cosine similarity with 1-based ranks.
/// In `similarity_score_threshold` mode chunks scoring below the threshold
/// are dropped, so fewer than `k` (or zero) results is normal.
pub struct Retriever {
    /// Vector index, read-only from here.
    store: Arc<dyn VectorStore>,

    /// Must be the model the index was built with.
    embedder: Arc<dyn Embedder>,

    config: RetrievalConfig,
}

impl Retriever {
    /// Create a retriever over an open index. The config is validated first.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            embedder,
            config,
        })
    }

    /// Open the index persisted in `persist_directory` read-only.
    ///
    /// Configuration errors are reported before the directory is touched;
    /// a directory without a built index is a precondition failure.
    pub fn open(
        persist_directory: &Path,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        let index = SqliteVectorIndex::open(persist_directory)?;
        Self::new(Arc::new(index), embedder, config)
    }

    /// Same index and embedder under a different search policy.
    pub fn with_config(&self, config: RetrievalConfig) -> Result<Self> {
        Self::new(Arc::clone(&self.store), Arc::clone(&self.embedder), config)
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The query actually searched: blank input falls back to the configured
    /// default query, or is rejected when none is configured.
    pub fn resolve_query<'a>(&'a self, query: &'a str) -> Result<&'a str> {
        if !query.trim().is_empty() {
            return Ok(query);
        }
        match self.config.default_query.as_deref() {
            Some(default) if !default.trim().is_empty() => {
                debug!("Empty query, using configured default {:?}", default);
                Ok(default)
            }
            _ => Err(RagError::invalid_argument(
                "Query must not be empty (no default_query configured)",
            )),
        }
    }

    /// Retrieve chunks for `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        let query = self.resolve_query(query)?;

        info!("Retrieving for: {:?}", query);

        let embedding = self.embedder.embed_query(query).await?;
        let mut results = self.store.search(&embedding, self.config.k).await?;
        let found = results.len();

        if self.config.search_type == SearchType::SimilarityScoreThreshold {
            if let Some(threshold) = self.config.score_threshold {
                results.retain(|r| r.score >= threshold);
                debug!(
                    "Threshold {} kept {} of {} results",
                    threshold,
                    results.len(),
                    found
                );
            }
        }

        info!(
            "Retrieved {} chunks in {}ms",
            results.len(),
            start.elapsed().as_millis()
        );
        Ok(results)
    }

    /// Statistics of the underlying index.
    pub async fn stats(&self) -> Result<IndexStats> {
        self.store.stats().await
    }
}
