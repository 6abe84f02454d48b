//! Example: Indexing a small novel and assembling generation context
//!
//! Demonstrates the complete flow with the offline local provider:
//! 1. Build the service from configuration (falls back to defaults)
//! 2. Index world view, cast and chapters of a project
//! 3. Assemble the context block for the next chapter
//! 4. Delete the project and check nothing is left

use quill_core::rag::{Chapter, Character, NovelProject, RagService, WorldView};
use quill_core::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quill_core=debug".parse()?),
        )
        .init();

    let config = Config::load_or_default()?;
    println!(
        "Embedding provider: {} ({})\n",
        config.embedding.provider, config.embedding.model
    );

    let rag = RagService::from_config(&config).await?;

    let project = NovelProject {
        id: "ashfall".to_string(),
        title: "Ashfall".to_string(),
        genre: "historical".to_string(),
        world_view: Some(WorldView {
            id: "ashfall-world".to_string(),
            project_id: "ashfall".to_string(),
            title: "Ashfall".to_string(),
            synopsis: "A port city lives its last summer under a restless volcano".to_string(),
            setting: "Pompeii, 79 AD".to_string(),
            key_rules: vec!["No magic".to_string(), "Omens are never wrong".to_string()],
            themes: vec!["fate".to_string(), "family".to_string()],
            ..WorldView::default()
        }),
        characters: vec![Character {
            id: "livia".to_string(),
            project_id: "ashfall".to_string(),
            name: "Livia".to_string(),
            role: "protagonist".to_string(),
            age: 27,
            motivation: "Get her brother out of the city".to_string(),
            ..Character::default()
        }],
        chapters: vec![
            Chapter {
                id: "ashfall-1".to_string(),
                project_id: "ashfall".to_string(),
                index: 1,
                title: "Omens".to_string(),
                raw_content: "The birds left Pompeii at noon.".to_string(),
                ..Chapter::default()
            },
            Chapter {
                id: "ashfall-2".to_string(),
                project_id: "ashfall".to_string(),
                index: 2,
                title: "Tremor".to_string(),
                raw_content: "The fountains ran dry overnight.".to_string(),
                ..Chapter::default()
            },
        ],
        ..NovelProject::default()
    };
    rag.update_project(&project).await?;

    let prompt = rag.build_context_prompt("ashfall", 3, "").await;
    println!("{prompt}");

    let stats = rag.get_stats("ashfall").await;
    for (kind, count) in &stats.counts {
        println!("{kind:>10}: {count}");
    }

    let removed = rag.delete_project("ashfall").await?;
    println!("\nRemoved {removed} documents");

    rag.close().await?;
    Ok(())
}
