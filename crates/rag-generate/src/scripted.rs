//! In-process chat model with scripted replies.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use rag_core::{ChatMessage, ChatModel, RagError, Result, Role};

use crate::prompt::{ANSWER_INSTRUCTION, INSUFFICIENT_INFORMATION, NEW_QUESTION_PREFIX};

/// Computes a reply from the request when no scripted reply is queued.
pub type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Deterministic [`ChatModel`]: replays queued replies in order, then falls
/// back to a responder if one is set. Every request is recorded.
pub struct ScriptedChatModel {
    name: String,
    replies: Mutex<VecDeque<String>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    /// Replay `replies` in order; further calls fail.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "scripted".to_string(),
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Offline stand-in for a real model.
    ///
    /// Grounding prompts are answered with the top-ranked document's text,
    /// or the insufficient-information reply when there is none. Rewrite
    /// requests are answered by prefixing the new question with the previous
    /// human question.
    pub fn extractive() -> Self {
        Self {
            name: "extractive".to_string(),
            ..Self::with_responder(|messages| Ok(extractive_reply(messages)))
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests
            .lock()
            .map_err(|e| RagError::internal(e.to_string()))?
            .push(messages.to_vec());

        let queued = self
            .replies
            .lock()
            .map_err(|e| RagError::internal(e.to_string()))?
            .pop_front();

        match (queued, &self.responder) {
            (Some(reply), _) => {
                debug!("Scripted reply: {:?}", reply);
                Ok(reply)
            }
            (None, Some(responder)) => responder(messages),
            (None, None) => Err(RagError::dependency(
                self.name.as_str(),
                "No scripted reply left",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

fn extractive_reply(messages: &[ChatMessage]) -> String {
    let mut users = messages.iter().rev().filter(|m| m.role == Role::User);
    let Some(last) = users.next() else {
        return INSUFFICIENT_INFORMATION.to_string();
    };

    if let Some(question) = last.content.strip_prefix(NEW_QUESTION_PREFIX) {
        return match users.next() {
            Some(previous) => format!("{} {}", previous.content.trim(), question.trim()),
            None => question.trim().to_string(),
        };
    }

    top_document(&last.content)
        .map(str::to_string)
        .unwrap_or_else(|| INSUFFICIENT_INFORMATION.to_string())
}

/// Text of `[doc 1 | ...]` in a grounding prompt.
fn top_document(prompt: &str) -> Option<&str> {
    let tag = prompt.find("[doc 1 | ")?;
    let body = tag + prompt[tag..].find("] - ")? + "] - ".len();
    let rest = &prompt[body..];

    let end = [rest.find("\n[doc "), rest.rfind(ANSWER_INSTRUCTION)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}
