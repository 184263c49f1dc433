//! End-to-end scenarios: ingest a small corpus, retrieve, answer.

use std::fs;
use std::sync::Arc;

use rag_core::{Embedder, GenerationConfig, IngestionConfig, RetrievalConfig, SearchType};
use rag_embed::HashEmbedder;
use rag_generate::{
    AnswerGenerator, HistoryAwareGenerator, ScriptedChatModel, INSUFFICIENT_INFORMATION,
};
use rag_ingest::IngestionPipeline;
use rag_query::Retriever;
use tempfile::TempDir;

const CORPUS: &[(&str, &str)] = &[
    (
        "github.txt",
        "Microsoft acquired GitHub for $7.5 billion in 2018.",
    ),
    (
        "spacex.txt",
        "SpaceX launched the Falcon Heavy rocket from Florida.",
    ),
    (
        "bakery.txt",
        "The village bakery sells sourdough bread every morning.",
    ),
];

struct Fixture {
    dir: TempDir,
    embedder: Arc<dyn Embedder>,
}

impl Fixture {
    async fn ingest() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir(&docs).unwrap();
        for (name, text) in CORPUS {
            fs::write(docs.join(name), text).unwrap();
        }

        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
        let config = IngestionConfig {
            docs_path: docs,
            persist_directory: dir.path().join("db"),
            ..IngestionConfig::default()
        };
        let (index, report) = IngestionPipeline::new(config, embedder.clone())
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.chunks, 3);
        drop(index);

        Self { dir, embedder }
    }

    fn retriever(&self, config: RetrievalConfig) -> Retriever {
        Retriever::open(&self.dir.path().join("db"), self.embedder.clone(), config).unwrap()
    }
}

fn threshold(t: f32) -> RetrievalConfig {
    RetrievalConfig {
        search_type: SearchType::SimilarityScoreThreshold,
        k: 5,
        score_threshold: Some(t),
        default_query: None,
    }
}

#[tokio::test]
async fn test_answers_from_relevant_document() {
    let fixture = Fixture::ingest().await;
    let retriever = fixture.retriever(RetrievalConfig::default());

    let results = retriever
        .retrieve("How much did Microsoft pay for GitHub?")
        .await
        .unwrap();
    assert!(results[0].chunk.text.contains("$7.5 billion"));
    assert!(results[0].chunk.source().ends_with("github.txt"));

    let generator = AnswerGenerator::from_config(
        retriever,
        Arc::new(ScriptedChatModel::extractive()),
        &GenerationConfig::default(),
    );
    let answer = generator
        .generate_answer("How much did Microsoft pay for GitHub?")
        .await
        .unwrap();
    assert!(answer.text.contains("7.5 billion"));
    assert_ne!(answer.text, INSUFFICIENT_INFORMATION);
}

#[tokio::test]
async fn test_insufficient_context() {
    let fixture = Fixture::ingest().await;
    let retriever = fixture.retriever(threshold(0.95));

    let results = retriever
        .retrieve("Who painted the Mona Lisa?")
        .await
        .unwrap();
    assert!(results.is_empty());

    let chat = Arc::new(ScriptedChatModel::extractive());
    let generator =
        AnswerGenerator::from_config(retriever, chat.clone(), &GenerationConfig::default());
    let answer = generator
        .generate_answer("Who painted the Mona Lisa?")
        .await
        .unwrap();
    assert_eq!(answer.text, INSUFFICIENT_INFORMATION);
    assert_eq!(chat.call_count(), 0);
}

#[tokio::test]
async fn test_follow_up_needs_history() {
    let fixture = Fixture::ingest().await;

    // The bare follow-up shares no content words with the corpus.
    let bare = fixture
        .retriever(threshold(0.2))
        .retrieve("When did that happen?")
        .await
        .unwrap();
    assert!(bare.is_empty());

    let chat = Arc::new(ScriptedChatModel::extractive());
    let mut generator = HistoryAwareGenerator::new(
        fixture.retriever(threshold(0.2)),
        chat.clone(),
        &GenerationConfig::default(),
    );

    let first = generator
        .ask("How much did Microsoft pay for GitHub?")
        .await
        .unwrap();
    assert!(first.text.contains("7.5 billion"));

    let second = generator.ask("When did that happen?").await.unwrap();
    assert!(second.query.contains("Microsoft"));
    assert!(second.query.contains("GitHub"));
    assert!(second.sources[0].chunk.text.contains("2018"));
    assert!(second.text.contains("2018"));

    // answer, rewrite, answer
    assert_eq!(chat.call_count(), 3);
    assert_eq!(generator.history().len(), 4);
}

#[tokio::test]
async fn test_reingest_reuses_index() {
    let fixture = Fixture::ingest().await;
    let config = IngestionConfig {
        docs_path: fixture.dir.path().join("docs"),
        persist_directory: fixture.dir.path().join("db"),
        ..IngestionConfig::default()
    };

    let (index, report) = IngestionPipeline::new(config, fixture.embedder.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert!(report.reused);
    assert_eq!(index.count().unwrap(), 3);
}
