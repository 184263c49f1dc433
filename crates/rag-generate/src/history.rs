//! Conversation history and the history-aware generator.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use rag_core::{ChatModel, ConversationTurn, GenerationConfig, Result, Speaker};
use rag_query::Retriever;

use crate::answer::{answer_from, Answer};
use crate::prompt::build_rewrite_messages;

/// Turns of one session, oldest first, capped at `max_turns`.
///
/// Appending beyond the cap evicts from the front, and an answer left without
/// its question is evicted with it, so the window always starts on a human
/// turn. The cap is at least 2 so the latest exchange always fits. Turns are
/// never edited.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(2),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
            while self
                .turns
                .front()
                .is_some_and(|t| t.speaker == Speaker::Assistant)
            {
                self.turns.pop_front();
            }
        }
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> + '_ {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Answers follow-up questions by first rewriting them into standalone
/// queries using the session's history.
pub struct HistoryAwareGenerator {
    retriever: Retriever,
    chat: Arc<dyn ChatModel>,
    history: ConversationHistory,
    system_prompt: String,
    rewrite_prompt: String,
    last_rewritten: Option<String>,
}

impl HistoryAwareGenerator {
    pub fn new(retriever: Retriever, chat: Arc<dyn ChatModel>, config: &GenerationConfig) -> Self {
        Self {
            retriever,
            chat,
            history: ConversationHistory::new(config.history_max_turns),
            system_prompt: config.history_system_prompt.clone(),
            rewrite_prompt: config.rewrite_prompt.clone(),
            last_rewritten: None,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.last_rewritten = None;
    }

    /// Query searched by the most recent `ask`.
    pub fn last_rewritten_query(&self) -> Option<&str> {
        self.last_rewritten.as_deref()
    }

    /// Standalone form of `question`. With no history the question is
    /// returned as is and the model is not called.
    pub async fn rewrite_question(&self, question: &str) -> Result<String> {
        if self.history.is_empty() {
            return Ok(question.to_string());
        }

        let messages = build_rewrite_messages(&self.rewrite_prompt, self.history.turns(), question);
        let rewritten = self.chat.complete(&messages).await?;
        let rewritten = rewritten.trim();

        if rewritten.is_empty() {
            warn!("Rewrite returned nothing, searching the original question");
            return Ok(question.to_string());
        }
        debug!("Rewrote {:?} as {:?}", question, rewritten);
        Ok(rewritten.to_string())
    }

    /// Rewrite, retrieve, answer, then record the exchange.
    ///
    /// The (human, assistant) pair is appended even when nothing relevant
    /// was found. On error nothing is appended.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = self.retriever.resolve_query(question)?.to_string();
        let query = self.rewrite_question(&question).await?;
        info!("Asking question: {:?}", query);

        let sources = self.retriever.retrieve(&query).await?;
        let text = answer_from(self.chat.as_ref(), &self.system_prompt, &query, &sources).await?;

        self.history.push(ConversationTurn::human(question));
        self.history.push(ConversationTurn::assistant(text.clone()));
        self.last_rewritten = Some(query.clone());

        Ok(Answer {
            text,
            query,
            sources,
        })
    }
}
