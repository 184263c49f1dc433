//! rag-generate - Answer generation
//!
//! Builds grounding prompts from retrieved chunks and asks a chat model for
//! the answer. [`HistoryAwareGenerator`] first rewrites follow-up questions
//! into standalone queries using a bounded conversation history.
//!
//! When retrieval finds nothing the generators return
//! [`INSUFFICIENT_INFORMATION`] without calling the model.

mod answer;
mod history;
mod prompt;
mod scripted;

pub use answer::{Answer, AnswerGenerator};
pub use history::{ConversationHistory, HistoryAwareGenerator};
pub use prompt::{
    build_grounding_prompt, build_rewrite_messages, ANSWER_INSTRUCTION, INSUFFICIENT_INFORMATION,
    NEW_QUESTION_PREFIX,
};
pub use scripted::{Responder, ScriptedChatModel};
