//! Configuration types for the RAG pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::traits::ChunkConfig;
use crate::types::SearchType;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Loading, chunking and persistence.
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat model configuration.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Model service connection settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Search policy.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Prompts and conversation settings.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Directory holding the source text files.
    #[serde(default = "default_docs_path")]
    pub docs_path: PathBuf,

    /// Directory holding the persisted vector index.
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,

    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters repeated between consecutive windows.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Descend into subdirectories of `docs_path`.
    #[serde(default)]
    pub recursive: bool,

    /// File extension matched by the loader.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Chunks per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            docs_path: default_docs_path(),
            persist_directory: default_persist_directory(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            recursive: false,
            extension: default_extension(),
            batch_size: default_batch_size(),
        }
    }
}

impl IngestionConfig {
    /// Chunker settings.
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

/// Which embedder backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Ollama `/api/embed`.
    Ollama,

    /// Offline feature-hashing embedder.
    Hash,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,

    /// Model identifier passed to the service.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector size of the hash embedder.
    #[serde(default = "default_hash_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_hash_dimension(),
        }
    }
}

/// Chat model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
        }
    }
}

/// Model service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Ollama base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub search_type: SearchType,

    /// Maximum number of chunks returned.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Minimum similarity in threshold mode, in (0, 1].
    #[serde(default = "default_score_threshold")]
    pub score_threshold: Option<f32>,

    /// Query used when the caller passes an empty one. Absent means empty
    /// queries are rejected.
    #[serde(default)]
    pub default_query: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_type: SearchType::Similarity,
            k: default_k(),
            score_threshold: default_score_threshold(),
            default_query: None,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(RagError::config("k must be at least 1"));
        }
        if self.search_type == SearchType::SimilarityScoreThreshold {
            match self.score_threshold {
                Some(t) if t > 0.0 && t <= 1.0 => {}
                Some(t) => {
                    return Err(RagError::config(format!(
                        "score_threshold must be in (0, 1], got {}",
                        t
                    )))
                }
                None => {
                    return Err(RagError::config(
                        "score_threshold must be set for similarity_score_threshold search",
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Prompts and conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// System instruction of the plain answer generator.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// System instruction of the history-aware answer step.
    #[serde(default = "default_history_system_prompt")]
    pub history_system_prompt: String,

    /// System instruction of the question-rewriting step.
    #[serde(default = "default_rewrite_prompt")]
    pub rewrite_prompt: String,

    /// Turns kept in a session's history (human and assistant count separately,
    /// at least 2).
    #[serde(default = "default_history_max_turns")]
    pub history_max_turns: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history_system_prompt: default_history_system_prompt(),
            rewrite_prompt: default_rewrite_prompt(),
            history_max_turns: default_history_max_turns(),
        }
    }
}

// Default value functions

fn default_docs_path() -> PathBuf {
    PathBuf::from("docs")
}

fn default_persist_directory() -> PathBuf {
    PathBuf::from("db").join("index")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    5
}

fn default_extension() -> String {
    "txt".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Ollama
}

fn default_embedding_model() -> String {
    "llama2".to_string()
}

fn default_hash_dimension() -> usize {
    512
}

fn default_chat_model() -> String {
    "glm-4.6:cloud".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_k() -> usize {
    5
}

fn default_score_threshold() -> Option<f32> {
    Some(0.5)
}

fn default_system_prompt() -> String {
    "You are an informational assistant. Use the given text to answer the query asked."
        .to_string()
}

fn default_history_system_prompt() -> String {
    "You are an informational assistant.".to_string()
}

fn default_rewrite_prompt() -> String {
    "Given the chat history, rewrite the new question to be standalone and searchable \
     and just return the rewritten question."
        .to_string()
}

fn default_history_max_turns() -> usize {
    20
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag-demo").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        let local_config = PathBuf::from("rag-demo.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Check cross-field invariants before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        self.ingestion.chunk_config().validate()?;
        if self.ingestion.batch_size == 0 {
            return Err(RagError::config("batch_size must be at least 1"));
        }
        if self.embedding.provider == EmbeddingProvider::Hash && self.embedding.dimension == 0 {
            return Err(RagError::config("embedding dimension must be at least 1"));
        }
        if self.service.request_timeout_secs == 0 {
            return Err(RagError::config("request_timeout_secs must be at least 1"));
        }
        self.retrieval.validate()?;
        if self.generation.history_max_turns == 0 {
            return Err(RagError::config("history_max_turns must be at least 1"));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::internal(format!("Failed to render config: {}", e)))
    }
}
