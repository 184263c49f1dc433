//! Embedding through Ollama's `/api/embed`.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rag_core::{Embedder, RagError, Result};

use crate::client::OllamaClient;

const SERVICE: &str = "ollama embed";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an Ollama model.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: OnceLock<usize>,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            dimension: OnceLock::new(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts with {}", texts.len(), self.model);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbedResponse = self
            .client
            .post_json(SERVICE, "/api/embed", &request)
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::dependency(
                SERVICE,
                format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    response.embeddings.len()
                ),
            ));
        }

        let dim = response.embeddings[0].len();
        if dim == 0 || response.embeddings.iter().any(|e| e.len() != dim) {
            return Err(RagError::dependency(
                SERVICE,
                "Embeddings have inconsistent or zero dimension",
            ));
        }
        let known = *self.dimension.get_or_init(|| dim);
        if known != dim {
            return Err(RagError::dependency(
                SERVICE,
                format!("Dimension changed from {} to {}", known, dim),
            ));
        }

        Ok(response.embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text])
            .await?
            .pop()
            .ok_or_else(|| RagError::dependency(SERVICE, "No embedding returned"))
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
