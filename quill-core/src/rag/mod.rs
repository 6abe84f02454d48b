//! Retrieval Augmented Generation (RAG) for fiction projects.
//!
//! This module stores the semantic pieces of a novel (world view, character
//! sheets, chapter text, outline and free-form notes) as embedded documents
//! and retrieves them as grounding context for text generation.
//!
//! # Architecture
//!
//! - [`VectorStore`]: named collections of [`Document`]s with lexical and
//!   cosine-similarity search; [`MemoryVectorStore`] is the brute-force backend
//! - [`Filter`]: AND-combined metadata predicates applied before ranking
//! - [`CollectionRegistry`]: immutable map from [`ContextType`] to collection
//! - [`RagService`]: the façade mapping project entities onto the store
//!
//! # How It Works
//!
//! 1. **Indexing**: an entity is rendered to labelled text, embedded, and
//!    upserted under its id with `{type, project_id, ...}` metadata.
//! 2. **Retrieval**: the query is embedded and matched against one collection,
//!    filtered to a single project. If embedding fails the service falls back
//!    to lexical search instead of failing the lookup.
//! 3. **Assembly**: [`RagService::build_context_prompt`] joins world view,
//!    character and previous-chapter hits into one prompt section.

mod collections;
mod entities;
mod filter;
mod memory;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use collections::{CollectionRegistry, ContextType};
pub use entities::{Chapter, ChapterOutline, Character, NovelProject, Outline, WorldView};
pub use filter::{Filter, Predicate};
pub use memory::MemoryVectorStore;
pub use store::{cosine_similarity, StoreError, VectorStore};
pub use types::{Document, Metadata, MetadataValue, SearchOptions, SearchResult};

use crate::config::{Config, RagConfig};
use crate::embedding::{create_embedding_service, EmbeddingError, EmbeddingService};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Failed to embed {kind} {id}: {source}")]
    Indexing {
        kind: ContextType,
        id: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown context type: {0}")]
    UnknownContextType(String),

    /// Some collections could not be swept; the others were.
    #[error("Sweep of project {project_id} failed in {}", describe_failures(.failures))]
    Sweep {
        project_id: String,
        failures: Vec<CollectionFailure>,
    },
}

pub type Result<T> = std::result::Result<T, RagError>;

/// A store error tied to the collection it happened in.
#[derive(Debug, Error)]
#[error("{collection}: {source}")]
pub struct CollectionFailure {
    pub collection: String,
    #[source]
    pub source: StoreError,
}

fn describe_failures(failures: &[CollectionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-collection document counts for one project.
///
/// A collection whose scan failed has no entry in `counts` and is listed in
/// `failures` instead, so "nothing stored" and "could not look" stay distinct.
#[derive(Debug, Default)]
pub struct ProjectStats {
    pub counts: BTreeMap<ContextType, usize>,
    pub failures: Vec<CollectionFailure>,
}

impl ProjectStats {
    pub fn count(&self, kind: ContextType) -> Option<usize> {
        self.counts.get(&kind).copied()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Domain façade over an embedding service and a vector store.
///
/// Every document written through the service carries `type` and
/// `project_id` metadata, and every lookup is filtered to one project.
///
/// # Thread Safety
///
/// `RagService` is `Clone`; clones share the same store and embedder.
///
/// # Example
///
/// ```no_run
/// # use quill_core::{Config, rag::{RagService, WorldView}};
/// # async fn example() -> quill_core::rag::Result<()> {
/// let rag = RagService::from_config(&Config::default()).await?;
///
/// rag.add_world_view(&WorldView {
///     id: "wv-1".into(),
///     project_id: "p1".into(),
///     title: "Ashfall".into(),
///     ..Default::default()
/// }).await?;
///
/// let context = rag.build_context_prompt("p1", 1, "the volcano").await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RagService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingService>,
    collections: CollectionRegistry,
    config: RagConfig,
}

impl RagService {
    /// Creates a service with default tuning and `novel_*` collection names.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self {
            store,
            embedder,
            collections: CollectionRegistry::default(),
            config: RagConfig::default(),
        }
    }

    /// Replaces the tuning knobs and derives collection names from
    /// `config.collection_prefix`.
    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.collections = CollectionRegistry::from_prefix(&config.collection_prefix);
        self.config = config;
        self
    }

    pub fn with_collections(mut self, collections: CollectionRegistry) -> Self {
        self.collections = collections;
        self
    }

    /// Builds the configured embedding provider and an in-memory store,
    /// creates every collection and checks both backends are alive.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedding_service(&config.embedding)?;
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());

        let service = Self::new(store, embedder).with_config(config.rag.clone());
        service.initialize_collections().await?;
        service.ping().await?;

        info!(
            provider = %config.embedding.provider,
            dimension = service.embedder.dimension(),
            "RAG service ready"
        );
        Ok(service)
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingService> {
        &self.embedder
    }

    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Creates every registered collection with the embedder's dimension.
    ///
    /// Stops at the first failure; collections created before it remain.
    pub async fn initialize_collections(&self) -> Result<()> {
        let dimension = self.embedder.dimension();
        for (_, name) in self.collections.iter() {
            self.store.create_collection(name, dimension).await?;
        }

        info!(dimension, "Initialized RAG collections");
        Ok(())
    }

    pub async fn add_world_view(&self, world_view: &WorldView) -> Result<()> {
        let metadata = [
            ("project_id", MetadataValue::from(&world_view.project_id)),
            ("title", MetadataValue::from(&world_view.title)),
        ];
        self.index(ContextType::WorldView, &world_view.id, world_view.render(), metadata)
            .await
    }

    pub async fn add_character(&self, character: &Character) -> Result<()> {
        let metadata = [
            ("project_id", MetadataValue::from(&character.project_id)),
            ("name", MetadataValue::from(&character.name)),
            ("role", MetadataValue::from(&character.role)),
        ];
        self.index(ContextType::Character, &character.id, character.render(), metadata)
            .await
    }

    /// Indexes a chapter. Bodies over `chapter_excerpt_chars` characters are
    /// embedded as title, summary and an excerpt.
    pub async fn add_chapter(&self, chapter: &Chapter) -> Result<()> {
        let content = chapter.render(self.config.chapter_excerpt_chars);
        let metadata = [
            ("project_id", MetadataValue::from(&chapter.project_id)),
            ("index", MetadataValue::from(chapter.index)),
            ("title", MetadataValue::from(&chapter.title)),
            ("word_count", MetadataValue::from(chapter.word_count)),
        ];
        self.index(ContextType::Chapter, &chapter.id, content, metadata)
            .await
    }

    pub async fn add_outline(&self, outline: &Outline) -> Result<()> {
        let chapters = i64::try_from(outline.chapters.len()).unwrap_or(i64::MAX);
        let metadata = [
            ("project_id", MetadataValue::from(&outline.project_id)),
            ("chapters", MetadataValue::from(chapters)),
        ];
        self.index(ContextType::Outline, &outline.id, outline.render(), metadata)
            .await
    }

    /// Indexes a free-form note into the `context` collection.
    pub async fn add_context_note(&self, project_id: &str, id: &str, text: &str) -> Result<()> {
        let metadata = [("project_id", MetadataValue::from(project_id))];
        self.index(ContextType::Context, id, text.to_string(), metadata)
            .await
    }

    async fn index<const N: usize>(
        &self,
        kind: ContextType,
        id: &str,
        content: String,
        metadata: [(&str, MetadataValue); N],
    ) -> Result<()> {
        let embedding = self
            .embedder
            .embed(&content)
            .await
            .map_err(|source| RagError::Indexing {
                kind,
                id: id.to_string(),
                source,
            })?;

        let mut document = Document::new(id, self.collections.name(kind), content)
            .with_embedding(embedding)
            .with_metadata("type", kind.as_str());
        for (key, value) in metadata {
            document = document.with_metadata(key, value);
        }

        self.store.add_document(document).await?;
        debug!(kind = %kind, id, "Indexed document");
        Ok(())
    }

    /// Searches one logical collection of a project by relevance to `query`.
    ///
    /// # Errors
    ///
    /// [`RagError::UnknownContextType`] if `context_type` is not one of
    /// `worldview`, `character`, `chapter`, `outline` or `context`.
    pub async fn search_relevant_context(
        &self,
        query: &str,
        project_id: &str,
        context_type: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let kind: ContextType = context_type.parse()?;
        let options = self
            .project_options(kind, project_id)
            .with_top_k(top_k)
            .with_threshold(self.config.relevance_threshold);
        self.retrieve(query, &options).await
    }

    pub async fn get_character_context(
        &self,
        character_name: &str,
        project_id: &str,
    ) -> Result<Vec<SearchResult>> {
        let query = format!("Character {character_name} personality background relationships");
        let options = self
            .project_options(ContextType::Character, project_id)
            .with_top_k(5)
            .with_threshold(self.config.character_threshold);
        self.retrieve(&query, &options).await
    }

    pub async fn get_world_view_context(
        &self,
        query: &str,
        project_id: &str,
    ) -> Result<Vec<SearchResult>> {
        let options = self
            .project_options(ContextType::WorldView, project_id)
            .with_top_k(3)
            .with_threshold(self.config.relevance_threshold);
        self.retrieve(query, &options).await
    }

    /// The `count` chapters closest before `current_index`, oldest first.
    pub async fn get_previous_chapters(
        &self,
        current_index: u32,
        project_id: &str,
        count: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut options = self
            .project_options(ContextType::Chapter, project_id)
            .with_top_k(self.config.scan_limit);
        options.filter = options.filter.lt("index", current_index);

        let mut chapters = self.store.search("", &options).await?;
        chapters.sort_by_key(|result| std::cmp::Reverse(chapter_index(result)));
        chapters.truncate(count);
        chapters.reverse();
        Ok(chapters)
    }

    /// Assembles world view, character and previous-chapter context into one
    /// labelled block.
    ///
    /// Each section is best effort: a failed lookup is logged and skipped.
    /// Returns an empty string when no section found anything.
    pub async fn build_context_prompt(
        &self,
        project_id: &str,
        chapter_index: u32,
        query: &str,
    ) -> String {
        let mut sections: Vec<String> = Vec::new();

        let world = self.get_world_view_context(query, project_id).await;
        if let Some(hits) = section_hits(world, ContextType::WorldView, project_id) {
            sections.push(render_section("[World]", hits.iter().map(|r| r.document.content.clone())));
        }

        let characters = self
            .search_relevant_context(query, project_id, ContextType::Character.as_str(), 3)
            .await;
        if let Some(hits) = section_hits(characters, ContextType::Character, project_id) {
            sections.push(render_section(
                "[Characters]",
                hits.iter().map(|r| r.document.content.clone()),
            ));
        }

        let chapters = self.get_previous_chapters(chapter_index, project_id, 2).await;
        if let Some(hits) = section_hits(chapters, ContextType::Chapter, project_id) {
            sections.push(render_section(
                "[Previously]",
                hits.iter().map(|r| {
                    let index = r
                        .document
                        .metadata
                        .get("index")
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    format!("Chapter {index}: {}", r.document.content)
                }),
            ));
        }

        if sections.is_empty() {
            return String::new();
        }
        format!("Reference context:\n{}\n", sections.join("\n\n"))
    }

    /// Re-indexes every entity of a project. Stops at the first failure.
    ///
    /// Chapters without text and outlines without chapters have nothing to
    /// embed and are skipped.
    pub async fn update_project(&self, project: &NovelProject) -> Result<()> {
        if let Some(world_view) = &project.world_view {
            self.add_world_view(world_view).await?;
        }
        for character in &project.characters {
            self.add_character(character).await?;
        }
        if let Some(outline) = &project.outline {
            if outline.chapters.is_empty() {
                debug!(project_id = %project.id, id = %outline.id, "Skipping empty outline");
            } else {
                self.add_outline(outline).await?;
            }
        }
        for chapter in &project.chapters {
            if chapter.body().trim().is_empty() {
                debug!(project_id = %project.id, id = %chapter.id, "Skipping chapter without text");
                continue;
            }
            self.add_chapter(chapter).await?;
        }

        info!(
            project_id = %project.id,
            characters = project.characters.len(),
            chapters = project.chapters.len(),
            "Re-indexed project"
        );
        Ok(())
    }

    /// Deletes every document of a project from all collections.
    ///
    /// A failing collection does not stop the sweep; failures are collected
    /// and returned together as [`RagError::Sweep`] once every collection has
    /// been tried. Returns the number of documents removed.
    pub async fn delete_project(&self, project_id: &str) -> Result<usize> {
        let mut removed = 0;
        let mut failures = Vec::new();

        for (kind, collection) in self.collections.iter() {
            match self.sweep_collection(kind, collection, project_id).await {
                Ok(count) => removed += count,
                Err(source) => {
                    warn!(collection, project_id, error = %source, "Failed to sweep collection");
                    failures.push(CollectionFailure {
                        collection: collection.to_string(),
                        source,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(RagError::Sweep {
                project_id: project_id.to_string(),
                failures,
            });
        }

        info!(project_id, removed, "Deleted project documents");
        Ok(removed)
    }

    async fn sweep_collection(
        &self,
        kind: ContextType,
        collection: &str,
        project_id: &str,
    ) -> std::result::Result<usize, StoreError> {
        let ids: Vec<String> = self
            .scan_project(kind, project_id)
            .await?
            .into_iter()
            .map(|result| result.document.id)
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }
        self.store.batch_delete(collection, &ids).await
    }

    /// Counts a project's documents per collection with a bounded scan.
    pub async fn get_stats(&self, project_id: &str) -> ProjectStats {
        let mut stats = ProjectStats::default();

        for (kind, collection) in self.collections.iter() {
            match self.scan_project(kind, project_id).await {
                Ok(results) => {
                    stats.counts.insert(kind, results.len());
                }
                Err(source) => {
                    warn!(collection, project_id, error = %source, "Failed to count collection");
                    stats.failures.push(CollectionFailure {
                        collection: collection.to_string(),
                        source,
                    });
                }
            }
        }
        stats
    }

    /// Checks both the embedding service and the store.
    pub async fn ping(&self) -> Result<()> {
        self.embedder.ping().await?;
        self.store.ping().await?;
        Ok(())
    }

    /// Releases the store's state.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;
        Ok(())
    }

    fn project_options(&self, kind: ContextType, project_id: &str) -> SearchOptions {
        SearchOptions::new(self.collections.name(kind))
            .with_filter(Filter::new().eq("project_id", project_id))
    }

    /// Lists a project's documents in one collection, up to `scan_limit`.
    async fn scan_project(
        &self,
        kind: ContextType,
        project_id: &str,
    ) -> std::result::Result<Vec<SearchResult>, StoreError> {
        let options = self
            .project_options(kind, project_id)
            .with_top_k(self.config.scan_limit);
        let results = self.store.search("", &options).await?;

        // Without a project_id index the scan is capped; more documents than
        // this are silently left out.
        if results.len() == self.config.scan_limit {
            warn!(
                collection = %options.collection,
                project_id,
                limit = self.config.scan_limit,
                "Project scan hit its limit"
            );
        }
        Ok(results)
    }

    /// Vector search, degrading to lexical search when embedding fails.
    ///
    /// Lexical scores are occurrences per word, not cosine similarities, so
    /// the fallback keeps every document that contains the query instead of
    /// applying `options.threshold`.
    async fn retrieve(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(self.store.search("", options).await?);
        }

        match self.embedder.embed(query).await {
            Ok(embedding) => Ok(self.store.similarity_search(&embedding, options).await?),
            Err(error) => {
                warn!(
                    collection = %options.collection,
                    error = %error,
                    "Embedding query failed, falling back to lexical search"
                );
                let lexical = options.clone().with_threshold(0.0);
                Ok(self.store.search(query, &lexical).await?)
            }
        }
    }
}

fn chapter_index(result: &SearchResult) -> i64 {
    result
        .document
        .metadata
        .get("index")
        .and_then(MetadataValue::as_i64)
        .unwrap_or(i64::MIN)
}

fn section_hits(
    lookup: Result<Vec<SearchResult>>,
    kind: ContextType,
    project_id: &str,
) -> Option<Vec<SearchResult>> {
    match lookup {
        Ok(hits) if !hits.is_empty() => Some(hits),
        Ok(_) => None,
        Err(error) => {
            warn!(kind = %kind, project_id, error = %error, "Skipping context section");
            None
        }
    }
}

fn render_section(label: &str, entries: impl Iterator<Item = String>) -> String {
    let mut section = label.to_string();
    for entry in entries {
        section.push('\n');
        section.push_str(&entry);
    }
    section
}
