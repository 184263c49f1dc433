//! Core domain types for the RAG pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::RagError;

/// Metadata carried by a loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the file the text was read from.
    pub source: String,
}

/// A text file read by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Full file contents.
    pub text: String,

    /// Source metadata.
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a new document.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: DocumentMetadata {
                source: source.into(),
            },
        }
    }

    /// Source path of this document.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// Length in Unicode scalar values.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Metadata carried by a chunk, inherited from its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source path of the parent document.
    pub source: String,

    /// Position of this chunk within its document (0-based).
    pub chunk_index: u32,

    /// Char offset of the window start within the document.
    pub start_char: usize,
}

/// A bounded window of a document's text; the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Chunk text (NFC-normalized once indexed).
    pub text: String,

    /// Inherited source metadata.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(source: &str, chunk_index: u32, start_char: usize, text: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index,
                start_char,
            },
        }
    }

    /// Source path of the parent document.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// Blake3 hash of the chunk text.
    pub fn content_hash(&self) -> [u8; 32] {
        *blake3::hash(self.text.as_bytes()).as_bytes()
    }
}

/// A ranked retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Cosine similarity to the query (1 - cosine distance, higher is better).
    pub score: f32,

    /// The matched chunk.
    pub chunk: Chunk,
}

/// Statistics about a persisted vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of indexed chunks.
    pub chunks: u64,

    /// Number of distinct source documents.
    pub sources: u64,

    /// Embedding dimension, once the first vector is stored.
    pub dimension: Option<usize>,

    /// Embedding model recorded at build time.
    pub embedding_model: Option<String>,

    /// Similarity metric (always "cosine").
    pub distance_metric: String,

    /// Database size in bytes.
    pub storage_bytes: u64,
}

/// Search policy applied by the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Plain top-k nearest neighbours.
    Similarity,

    /// Top-k, then drop anything scoring below the threshold.
    SimilarityScoreThreshold,
}

impl Default for SearchType {
    fn default() -> Self {
        Self::Similarity
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Similarity => "similarity",
            Self::SimilarityScoreThreshold => "similarity_score_threshold",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SearchType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "similarity" => Ok(Self::Similarity),
            "similarity_score_threshold" => Ok(Self::SimilarityScoreThreshold),
            other => Err(RagError::config(format!(
                "unknown search_type '{}', expected 'similarity' or 'similarity_score_threshold'",
                other
            ))),
        }
    }
}

/// Role of a message sent to the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Human,
    Assistant,
}

/// One turn of a session's conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub content: String,
}

impl ConversationTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
        }
    }

    /// The chat message replaying this turn.
    pub fn to_message(&self) -> ChatMessage {
        match self.speaker {
            Speaker::Human => ChatMessage::user(self.content.clone()),
            Speaker::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_parse() {
        assert_eq!(
            "similarity".parse::<SearchType>().unwrap(),
            SearchType::Similarity
        );
        assert_eq!(
            "similarity_score_threshold".parse::<SearchType>().unwrap(),
            SearchType::SimilarityScoreThreshold
        );
        assert!("mmr".parse::<SearchType>().is_err());
    }

    #[test]
    fn test_search_type_display_roundtrips() {
        for ty in [SearchType::Similarity, SearchType::SimilarityScoreThreshold] {
            assert_eq!(ty.to_string().parse::<SearchType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::system("be brief");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }

    #[test]
    fn test_turn_to_message() {
        assert_eq!(ConversationTurn::human("hi").to_message().role, Role::User);
        assert_eq!(
            ConversationTurn::assistant("hello").to_message().role,
            Role::Assistant
        );
    }

    #[test]
    fn test_chunk_inherits_source() {
        let chunk = Chunk::new("docs/github.txt", 2, 1990, "Microsoft acquired GitHub");
        assert_eq!(chunk.source(), "docs/github.txt");
        assert_eq!(chunk.metadata.chunk_index, 2);
        assert_eq!(chunk.content_hash(), *blake3::hash(b"Microsoft acquired GitHub").as_bytes());
    }

    #[test]
    fn test_document_char_len_counts_scalars() {
        let doc = Document::new("a.txt", "café");
        assert_eq!(doc.char_len(), 4);
        assert_eq!(doc.source(), "a.txt");
    }
}
