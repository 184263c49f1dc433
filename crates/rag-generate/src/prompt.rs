//! Prompt construction.

use rag_core::{ChatMessage, ConversationTurn, SearchResult};

/// Reply required from the model when the documents do not answer the
/// question, and returned directly when nothing was retrieved.
pub const INSUFFICIENT_INFORMATION: &str = "I do not have enough information";

/// Closing instruction of every grounding prompt.
pub const ANSWER_INSTRUCTION: &str =
    "Provide a clear response. If you don't have enough information, respond \"I do not have enough information\".";

/// Prefix of the final human turn of a rewrite request.
pub const NEW_QUESTION_PREFIX: &str = "New Question: ";

/// The human turn sent for answering: the literal question, every retrieved
/// chunk tagged with its rank and source, then the closing instruction.
pub fn build_grounding_prompt(question: &str, results: &[SearchResult]) -> String {
    let documents: Vec<String> = results
        .iter()
        .map(|r| format!("[doc {} | {}] - {}", r.rank, r.chunk.source(), r.chunk.text))
        .collect();

    format!(
        "Based on the following documents, please answer this question: {}\n\nDocuments:\n{}\n\n{}",
        question,
        documents.join("\n"),
        ANSWER_INSTRUCTION
    )
}

/// Messages asking the model for a standalone, searchable version of
/// `question` given the prior turns.
pub fn build_rewrite_messages<'a>(
    rewrite_prompt: &str,
    history: impl IntoIterator<Item = &'a ConversationTurn>,
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(rewrite_prompt)];
    messages.extend(history.into_iter().map(ConversationTurn::to_message));
    messages.push(ChatMessage::user(format!("{}{}", NEW_QUESTION_PREFIX, question)));
    messages
}
