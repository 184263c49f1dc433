//! Grounded answer generation.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use rag_core::{ChatMessage, ChatModel, GenerationConfig, Result, SearchResult};
use rag_query::Retriever;

use crate::prompt::{build_grounding_prompt, INSUFFICIENT_INFORMATION};

/// A generated answer with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Reply text.
    pub text: String,

    /// The query that was searched (after default substitution or rewriting).
    pub query: String,

    /// Retrieved chunks, best first.
    pub sources: Vec<SearchResult>,
}

impl Answer {
    /// Whether nothing relevant was retrieved, or the model said so.
    pub fn is_insufficient(&self) -> bool {
        self.sources.is_empty() || self.text.trim() == INSUFFICIENT_INFORMATION
    }
}

/// Answers single questions with no conversation state. No caching: each
/// call retrieves and generates again.
pub struct AnswerGenerator {
    retriever: Retriever,
    chat: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl AnswerGenerator {
    pub fn new(retriever: Retriever, chat: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            retriever,
            chat,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn from_config(
        retriever: Retriever,
        chat: Arc<dyn ChatModel>,
        config: &GenerationConfig,
    ) -> Self {
        Self::new(retriever, chat, config.system_prompt.clone())
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve for `query`, then answer from the retrieved chunks.
    pub async fn generate_answer(&self, query: &str) -> Result<Answer> {
        let start = Instant::now();
        let query = self.retriever.resolve_query(query)?.to_string();
        info!("Answering question: {:?}", query);

        let sources = self.retriever.retrieve(&query).await?;
        let text = answer_from(self.chat.as_ref(), &self.system_prompt, &query, &sources).await?;

        info!("Answered in {}ms", start.elapsed().as_millis());
        Ok(Answer {
            text,
            query,
            sources,
        })
    }
}

/// One grounded chat call. With no sources the model is not called.
pub(crate) async fn answer_from(
    chat: &dyn ChatModel,
    system_prompt: &str,
    query: &str,
    sources: &[SearchResult],
) -> Result<String> {
    if sources.is_empty() {
        info!("No relevant context retrieved for {:?}", query);
        return Ok(INSUFFICIENT_INFORMATION.to_string());
    }

    let messages = [
        ChatMessage::system(system_prompt),
        ChatMessage::user(build_grounding_prompt(query, sources)),
    ];
    let reply = chat.complete(&messages).await?;
    Ok(reply.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedChatModel;
    use rag_core::{Chunk, RetrievalConfig, Role, SearchType, VectorStore};
    use rag_embed::HashEmbedder;
    use rag_store::SqliteVectorIndex;
    use tempfile::TempDir;

    async fn retriever(config: RetrievalConfig) -> (TempDir, Retriever) {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(HashEmbedder::new());

        let builder = SqliteVectorIndex::create(dir.path(), "hash-512").unwrap();
        let texts = [
            "Microsoft acquired GitHub for $7.5 billion in 2018.",
            "SpaceX launched the Falcon Heavy rocket from Florida.",
        ];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new("news.txt", i as u32, 0, *t))
            .collect();
        let embeddings = rag_core::Embedder::embed_documents(embedder.as_ref(), &texts)
            .await
            .unwrap();
        builder.add(&chunks, &embeddings).await.unwrap();
        builder.finish().unwrap();

        let retriever = Retriever::open(dir.path(), embedder, config).unwrap();
        (dir, retriever)
    }

    #[tokio::test]
    async fn test_prompt_sent_to_model() {
        let (_dir, retriever) = retriever(RetrievalConfig {
            k: 1,
            ..RetrievalConfig::default()
        })
        .await;
        let chat = Arc::new(ScriptedChatModel::new(["  Microsoft paid $7.5 billion.  "]));
        let generator = AnswerGenerator::new(retriever, chat.clone(), "Use the given text.");

        let answer = generator
            .generate_answer("How much did Microsoft pay for GitHub?")
            .await
            .unwrap();
        assert_eq!(answer.text, "Microsoft paid $7.5 billion.");
        assert_eq!(answer.sources.len(), 1);
        assert!(!answer.is_insufficient());

        let requests = chat.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0], ChatMessage::system("Use the given text."));
        assert_eq!(requests[0][1].role, Role::User);
        assert!(requests[0][1].content.contains("$7.5 billion"));
        assert!(requests[0][1]
            .content
            .contains("please answer this question: How much did Microsoft pay for GitHub?"));
    }

    #[tokio::test]
    async fn test_no_context_skips_model() {
        let (_dir, retriever) = retriever(RetrievalConfig {
            search_type: SearchType::SimilarityScoreThreshold,
            k: 5,
            score_threshold: Some(0.95),
            default_query: None,
        })
        .await;
        let chat = Arc::new(ScriptedChatModel::new(Vec::<String>::new()));
        let generator = AnswerGenerator::new(retriever, chat.clone(), "sys");

        let answer = generator
            .generate_answer("Who painted the Mona Lisa?")
            .await
            .unwrap();
        assert_eq!(answer.text, INSUFFICIENT_INFORMATION);
        assert!(answer.is_insufficient());
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_each_call_generates_again() {
        let (_dir, retriever) = retriever(RetrievalConfig::default()).await;
        let chat = Arc::new(ScriptedChatModel::new(["first", "second"]));
        let generator = AnswerGenerator::new(retriever, chat.clone(), "sys");

        let q = "How much did Microsoft pay for GitHub?";
        assert_eq!(generator.generate_answer(q).await.unwrap().text, "first");
        assert_eq!(generator.generate_answer(q).await.unwrap().text, "second");
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test]
    async fn test_chat_failure_propagates() {
        let (_dir, retriever) = retriever(RetrievalConfig::default()).await;
        let chat = Arc::new(ScriptedChatModel::new(Vec::<String>::new()));
        let generator = AnswerGenerator::new(retriever, chat, "sys");

        let err = generator
            .generate_answer("How much did Microsoft pay for GitHub?")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DEPENDENCY_FAILURE");
    }
}
