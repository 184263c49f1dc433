//! Feature-hashing embedder.
//!
//! Maps each content word to a signed bucket of a fixed-size vector using
//! blake3, then L2-normalizes. Texts sharing vocabulary land close together
//! under cosine similarity, which is enough to run the pipeline offline.

use async_trait::async_trait;
use tracing::debug;

use rag_core::{Embedder, RagError, Result};

/// Default vector size.
pub const DEFAULT_DIMENSION: usize = 512;

/// Words too common to carry meaning.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "did", "do", "does", "for", "from",
    "had", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "of", "on", "or",
    "that", "the", "their", "then", "there", "these", "this", "to", "was", "were", "what",
    "when", "where", "which", "who", "why", "will", "with",
];

/// Offline embedder based on the hashing trick.
pub struct HashEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashEmbedder {
    /// Create a hash embedder with the default dimension.
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// Create a hash embedder with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            model_name: format!("hash-{}", dimension),
        }
    }

    /// Lowercased content words of `text`.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .filter(|t| !STOP_WORDS.contains(&t.as_str()))
            .collect()
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(RagError::config("hash embedder dimension must be at least 1"));
        }

        let mut embedding = vec![0.0f32; self.dimension];
        for token in Self::tokenize(text) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// L2 normalize a vector in place. Zero vectors stay zero.
fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!("Hash-embedding {} texts", texts.len());
        texts.iter().map(|text| self.embed_one(text)).collect()
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_tokenize_drops_stop_words() {
        assert_eq!(
            HashEmbedder::tokenize("How much did Microsoft pay for GitHub?"),
            vec!["much", "microsoft", "pay", "github"]
        );
    }

    #[tokio::test]
    async fn test_hash_embedder_dimension_and_norm() {
        let embedder = HashEmbedder::new();
        assert_eq!(embedder.dimension(), Some(512));
        assert_eq!(embedder.model_name(), "hash-512");

        let embeddings = embedder
            .embed_documents(&["Hello world", "Rust is great"])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 512);

        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_deterministic_embeddings() {
        let embedder = HashEmbedder::new();
        let e1 = embedder.embed_query("consistent input").await.unwrap();
        let e2 = embedder.embed_query("consistent input").await.unwrap();
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new();
        let query = embedder
            .embed_query("How much did Microsoft pay for GitHub?")
            .await
            .unwrap();
        let related = embedder
            .embed_query("Microsoft acquired GitHub for $7.5 billion in 2018.")
            .await
            .unwrap();
        let unrelated = embedder
            .embed_query("SpaceX launched the Falcon Heavy rocket from Florida.")
            .await
            .unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
        assert!(cosine(&query, &related) > 0.3);
    }

    #[tokio::test]
    async fn test_stop_words_only_gives_zero_vector() {
        let embedder = HashEmbedder::with_dimension(16);
        let embedding = embedder.embed_query("what is the").await.unwrap();
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_zero_dimension_rejected() {
        let embedder = HashEmbedder::with_dimension(0);
        assert!(embedder.embed_query("anything").await.is_err());
    }
}
