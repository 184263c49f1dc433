//! Chat completion through Ollama's `/api/chat`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rag_core::{ChatMessage, ChatModel, Result};

use crate::client::OllamaClient;

const SERVICE: &str = "ollama chat";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Chat model served by Ollama. Replies are collected whole.
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
}

impl OllamaChat {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Chat request with {} messages to {}", messages.len(), self.model);
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let response: ChatResponse = self
            .client
            .post_json(SERVICE, "/api/chat", &request)
            .await?;
        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
