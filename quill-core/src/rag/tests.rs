use super::*;
use crate::config::EmbeddingConfig;
use crate::embedding::MockEmbeddingService;

fn constant_embedder(vector: Vec<f32>) -> Arc<dyn EmbeddingService> {
    let mut mock = MockEmbeddingService::new();
    mock.expect_dimension().return_const(vector.len());
    mock.expect_embed().returning(move |_| Ok(vector.clone()));
    mock.expect_ping().returning(|| Ok(()));
    Arc::new(mock)
}

fn failing_embedder(dimension: usize) -> Arc<dyn EmbeddingService> {
    let mut mock = MockEmbeddingService::new();
    mock.expect_dimension().return_const(dimension);
    mock.expect_embed()
        .returning(|_| Err(EmbeddingError::Api { status: 503, body: "overloaded".to_string() }));
    Arc::new(mock)
}

async fn initialized(embedder: Arc<dyn EmbeddingService>) -> RagService {
    let rag = RagService::new(Arc::new(MemoryVectorStore::new()), embedder);
    rag.initialize_collections().await.unwrap();
    rag
}

fn world_view(project_id: &str) -> WorldView {
    WorldView {
        id: format!("{project_id}-world"),
        project_id: project_id.to_string(),
        title: "Ashfall".to_string(),
        synopsis: "A port city lives under a restless volcano".to_string(),
        setting: "Pompeii, 79 AD".to_string(),
        key_rules: vec!["No magic".to_string()],
        ..WorldView::default()
    }
}

fn character(project_id: &str, name: &str) -> Character {
    Character {
        id: format!("{project_id}-{name}"),
        project_id: project_id.to_string(),
        name: name.to_string(),
        role: "supporting".to_string(),
        age: 30,
        ..Character::default()
    }
}

fn chapter(project_id: &str, index: u32) -> Chapter {
    Chapter {
        id: format!("{project_id}-ch{index}"),
        project_id: project_id.to_string(),
        index,
        title: format!("Part {index}"),
        raw_content: format!("Events of day {index}"),
        word_count: 4,
        ..Chapter::default()
    }
}

fn project(project_id: &str) -> NovelProject {
    NovelProject {
        id: project_id.to_string(),
        title: "Ashfall".to_string(),
        world_view: Some(world_view(project_id)),
        characters: vec![character(project_id, "livia"), character(project_id, "marcus")],
        outline: Some(Outline {
            id: format!("{project_id}-outline"),
            project_id: project_id.to_string(),
            chapters: vec![ChapterOutline {
                index: 1,
                title: "Omens".to_string(),
                ..ChapterOutline::default()
            }],
        }),
        chapters: vec![chapter(project_id, 1), chapter(project_id, 2)],
        ..NovelProject::default()
    }
}

fn ids(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.document.id.as_str()).collect()
}

#[tokio::test]
async fn test_unknown_context_type_is_rejected() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0, 0.0])).await;

    let err = rag
        .search_relevant_context("anything", "p1", "timeline", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::UnknownContextType(name) if name == "timeline"));
}

#[tokio::test]
async fn test_initialize_twice_fails() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0])).await;
    assert!(matches!(
        rag.initialize_collections().await,
        Err(RagError::Store(StoreError::CollectionExists(_)))
    ));
}

#[tokio::test]
async fn test_relevant_context_is_scoped_to_project() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0, 0.0])).await;
    rag.add_world_view(&world_view("p1")).await.unwrap();
    rag.add_world_view(&world_view("p2")).await.unwrap();

    let results = rag
        .search_relevant_context("volcano", "p2", "worldview", 5)
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["p2-world"]);
    assert_eq!(
        results[0].document.metadata.get("type"),
        Some(&MetadataValue::from("worldview"))
    );
}

#[tokio::test]
async fn test_falls_back_to_lexical_search_when_embedding_fails() {
    let rag = initialized(failing_embedder(3)).await;
    let collection = rag.collections().name(ContextType::WorldView).to_string();

    for project_id in ["p1", "p2"] {
        rag.store()
            .add_document(
                Document::new(format!("{project_id}-note"), &collection, "Volcano")
                    .with_embedding(vec![1.0, 0.0, 0.0])
                    .with_metadata("project_id", project_id),
            )
            .await
            .unwrap();
    }

    let results = rag.get_world_view_context("volcano", "p1").await.unwrap();
    assert_eq!(ids(&results), vec!["p1-note"]);
    assert_eq!(results[0].score, 1.0);
}

#[tokio::test]
async fn test_indexing_failure_names_the_entity() {
    let rag = initialized(failing_embedder(3)).await;

    let err = rag.add_character(&character("p1", "livia")).await.unwrap_err();
    match err {
        RagError::Indexing { kind, id, .. } => {
            assert_eq!(kind, ContextType::Character);
            assert_eq!(id, "p1-livia");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(rag.get_stats("p1").await.counts.values().all(|count| *count == 0));
}

#[tokio::test]
async fn test_previous_chapters_keeps_the_closest_in_reading_order() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0])).await;
    for index in [3, 1, 5, 2, 4] {
        rag.add_chapter(&chapter("p1", index)).await.unwrap();
    }

    let results = rag.get_previous_chapters(5, "p1", 2).await.unwrap();
    assert_eq!(ids(&results), vec!["p1-ch3", "p1-ch4"]);

    assert!(rag.get_previous_chapters(1, "p1", 2).await.unwrap().is_empty());
    assert!(rag.get_previous_chapters(5, "p1", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_long_chapter_is_excerpted_before_embedding() {
    let store = Arc::new(MemoryVectorStore::new());
    let config = RagConfig {
        chapter_excerpt_chars: 10,
        ..RagConfig::default()
    };
    let rag = RagService::new(store, constant_embedder(vec![1.0, 0.0])).with_config(config);
    rag.initialize_collections().await.unwrap();

    let mut long = chapter("p1", 1);
    long.summary = "Smoke rises".to_string();
    long.polished_content = "The mountain woke before dawn".to_string();
    rag.add_chapter(&long).await.unwrap();

    let stored = rag
        .store()
        .get_document_in("novel_chapter", "p1-ch1")
        .await
        .unwrap();
    assert_eq!(stored.content, "Title: Part 1\nSummary: Smoke rises\nExcerpt: The mounta");
    assert_eq!(stored.metadata.get("index"), Some(&MetadataValue::Integer(1)));
}

#[tokio::test]
async fn test_build_context_prompt_sections_in_order() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0, 0.0])).await;
    rag.update_project(&project("p1")).await.unwrap();
    rag.add_chapter(&chapter("p1", 3)).await.unwrap();

    let prompt = rag.build_context_prompt("p1", 3, "eruption").await;

    assert!(prompt.starts_with("Reference context:\n[World]\nTitle: Ashfall"));
    let world = prompt.find("[World]").unwrap();
    let characters = prompt.find("[Characters]").unwrap();
    let previously = prompt.find("[Previously]").unwrap();
    assert!(world < characters && characters < previously);

    let first = prompt.find("Chapter 1: Events of day 1").unwrap();
    let second = prompt.find("Chapter 2: Events of day 2").unwrap();
    assert!(first < second);
    assert!(!prompt.contains("Events of day 3"));
    assert!(prompt.ends_with('\n'));
}

#[tokio::test]
async fn test_build_context_prompt_is_empty_without_documents() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0, 0.0])).await;
    rag.update_project(&project("p2")).await.unwrap();

    assert_eq!(rag.build_context_prompt("p1", 3, "eruption").await, "");
}

#[tokio::test]
async fn test_build_context_prompt_skips_failed_sections() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0, 0.0])).await;
    rag.update_project(&project("p1")).await.unwrap();
    rag.store().delete_collection("novel_worldview").await.unwrap();

    let prompt = rag.build_context_prompt("p1", 2, "eruption").await;
    assert!(!prompt.contains("[World]"));
    assert!(prompt.starts_with("Reference context:\n[Characters]\n"));
    assert!(prompt.contains("Chapter 1: Events of day 1"));
}

#[tokio::test]
async fn test_update_project_indexes_every_entity() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0])).await;
    rag.update_project(&project("p1")).await.unwrap();
    rag.add_context_note("p1", "note-1", "Livia fears the sea").await.unwrap();

    let stats = rag.get_stats("p1").await;
    assert!(stats.is_complete());
    assert_eq!(stats.count(ContextType::WorldView), Some(1));
    assert_eq!(stats.count(ContextType::Character), Some(2));
    assert_eq!(stats.count(ContextType::Outline), Some(1));
    assert_eq!(stats.count(ContextType::Chapter), Some(2));
    assert_eq!(stats.count(ContextType::Context), Some(1));
    assert_eq!(stats.total(), 7);
}

#[tokio::test]
async fn test_delete_project_leaves_other_projects_alone() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0])).await;
    rag.update_project(&project("p1")).await.unwrap();
    rag.update_project(&project("p2")).await.unwrap();

    let removed = rag.delete_project("p1").await.unwrap();
    assert_eq!(removed, 6);

    let stats = rag.get_stats("p1").await;
    assert_eq!(stats.counts.len(), ContextType::ALL.len());
    assert!(stats.counts.values().all(|count| *count == 0));

    assert_eq!(rag.get_stats("p2").await.total(), 6);
    assert_eq!(rag.delete_project("p1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_project_reports_failed_collections_after_sweeping_the_rest() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0])).await;
    rag.update_project(&project("p1")).await.unwrap();
    rag.store().delete_collection("novel_outline").await.unwrap();

    let err = rag.delete_project("p1").await.unwrap_err();
    match &err {
        RagError::Sweep { project_id, failures } => {
            assert_eq!(project_id, "p1");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].collection, "novel_outline");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("novel_outline"));

    let stats = rag.get_stats("p1").await;
    assert!(!stats.is_complete());
    assert_eq!(stats.count(ContextType::Outline), None);
    assert_eq!(stats.count(ContextType::WorldView), Some(0));
    assert_eq!(stats.count(ContextType::Chapter), Some(0));
}

#[tokio::test]
async fn test_from_config_with_local_provider() {
    let config = Config::default();
    let rag = RagService::from_config(&config).await.unwrap();

    assert_eq!(rag.embedder().dimension(), 768);
    assert_eq!(
        rag.store().list_collections().await.unwrap(),
        vec![
            "novel_chapter",
            "novel_character",
            "novel_context",
            "novel_outline",
            "novel_worldview"
        ]
    );

    rag.close().await.unwrap();
    assert!(rag.store().list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_from_config_rejects_unknown_provider() {
    let config = Config {
        embedding: EmbeddingConfig {
            provider: "bert-on-a-toaster".to_string(),
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    };

    let result = RagService::from_config(&config).await;
    assert!(matches!(
        result,
        Err(RagError::Embedding(EmbeddingError::UnknownProvider(name))) if name == "bert-on-a-toaster"
    ));
}

/// Embedder that never answers within a test's patience.
struct StalledEmbedder;

#[async_trait::async_trait]
impl EmbeddingService for StalledEmbedder {
    async fn embed(&self, _text: &str) -> crate::embedding::Result<Vec<f32>> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(vec![1.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> crate::embedding::Result<Vec<Vec<f32>>> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(vec![vec![1.0, 0.0]; texts.len()])
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn ping(&self) -> crate::embedding::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_abandoned_add_never_writes() {
    let rag = initialized(Arc::new(StalledEmbedder)).await;

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(10),
        rag.add_character(&character("p1", "livia")),
    )
    .await;
    assert!(outcome.is_err());

    let stats = rag.get_stats("p1").await;
    assert_eq!(stats.count(ContextType::Character), Some(0));

    let lookup = tokio::time::timeout(
        std::time::Duration::from_millis(10),
        rag.get_world_view_context("volcano", "p1"),
    )
    .await;
    assert!(lookup.is_err());
}

#[tokio::test]
async fn test_lexical_fallback_finds_words_in_prose() {
    let rag = initialized(failing_embedder(3)).await;
    let collection = rag.collections().name(ContextType::WorldView).to_string();

    rag.store()
        .add_document(
            Document::new(
                "p1-world",
                &collection,
                "A port city lives its last summer under a restless volcano",
            )
            .with_metadata("project_id", "p1"),
        )
        .await
        .unwrap();

    let results = rag.get_world_view_context("volcano", "p1").await.unwrap();
    assert_eq!(ids(&results), vec!["p1-world"]);
    assert!(results[0].score < 0.7);

    assert!(rag
        .get_world_view_context("glacier", "p1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_update_project_skips_entities_without_text() {
    let rag = initialized(constant_embedder(vec![1.0, 0.0])).await;

    let mut blank = chapter("p1", 1);
    blank.raw_content = "   ".to_string();
    let mut project = project("p1");
    project.chapters = vec![blank, chapter("p1", 2)];
    if let Some(outline) = project.outline.as_mut() {
        outline.chapters.clear();
    }

    rag.update_project(&project).await.unwrap();

    let stats = rag.get_stats("p1").await;
    assert_eq!(stats.count(ContextType::Chapter), Some(1));
    assert_eq!(stats.count(ContextType::Outline), Some(0));
    assert_eq!(stats.count(ContextType::Character), Some(2));
}
