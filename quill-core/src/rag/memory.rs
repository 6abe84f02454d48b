//! In-memory vector storage and search.
//!
//! This module provides a simple but correct vector database implementation
//! using in-memory storage and brute-force cosine similarity.

use super::store::{cosine_similarity, Result, StoreError, VectorStore};
use super::types::{Document, SearchOptions, SearchResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A named, fixed-dimension bucket of documents.
///
/// Documents are kept without their vectors; each vector lives in `index`
/// under the document id, so a lexical-only document has no index entry.
#[derive(Debug)]
struct Collection {
    dimension: usize,
    documents: HashMap<String, Document>,
    index: HashMap<String, Vec<f32>>,
}

impl Collection {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            documents: HashMap::new(),
            index: HashMap::new(),
        }
    }

    fn validate(&self, name: &str, document: &Document) -> Result<()> {
        if document.id.is_empty() {
            return Err(StoreError::EmptyId(name.to_string()));
        }
        if document.has_embedding() && document.embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                collection: name.to_string(),
                id: document.id.clone(),
                expected: self.dimension,
                actual: document.embedding.len(),
            });
        }
        Ok(())
    }

    /// Writes an already validated document, keeping the stored `created_at`.
    fn upsert(&mut self, mut document: Document, now: chrono::DateTime<Utc>) {
        let created_at = self
            .documents
            .get(&document.id)
            .and_then(|existing| existing.created_at)
            .or(document.created_at)
            .unwrap_or(now);
        document.created_at = Some(created_at);
        document.updated_at = Some(now);

        let embedding = std::mem::take(&mut document.embedding);
        if embedding.is_empty() {
            self.index.remove(&document.id);
        } else {
            self.index.insert(document.id.clone(), embedding);
        }
        self.documents.insert(document.id.clone(), document);
    }

    fn remove(&mut self, id: &str) -> bool {
        self.index.remove(id);
        self.documents.remove(id).is_some()
    }

    /// Clones a stored document, re-attaching its vector when asked to.
    fn materialize(&self, id: &str, include_embedding: bool) -> Option<Document> {
        let mut document = self.documents.get(id)?.clone();
        if include_embedding {
            if let Some(embedding) = self.index.get(id) {
                document.embedding = embedding.clone();
            }
        }
        Some(document)
    }

    /// Sorts scored ids (score descending, id ascending), truncates and
    /// turns them into results.
    fn rank(&self, mut scored: Vec<(&str, f32)>, options: &SearchOptions) -> Vec<SearchResult> {
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scored.truncate(options.top_k);

        scored
            .into_iter()
            .filter_map(|(id, score)| {
                self.materialize(id, options.include_embedding)
                    .map(|document| SearchResult::new(document, score))
            })
            .collect()
    }
}

/// An in-memory vector store for document embeddings.
///
/// One reader/writer lock guards every collection: writes (collection and
/// document mutations) take it exclusively, reads share it. The lock is never
/// held across an `.await` point.
///
/// # Characteristics
///
/// - **Simple**: No external dependencies or setup required
/// - **Exact**: O(n * d) linear scan per search
/// - **Thread-safe**: `Clone` shares the same underlying state
/// - **Ephemeral**: Data is lost when the process ends
///
/// # Example
///
/// ```no_run
/// # use quill_core::rag::{Document, MemoryVectorStore, SearchOptions, VectorStore};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryVectorStore::new();
/// store.create_collection("animals", 3).await?;
///
/// store.add_document(
///     Document::new("1", "animals", "cats").with_embedding(vec![1.0, 0.0, 0.0]),
/// ).await?;
///
/// let results = store
///     .similarity_search(&[1.0, 0.0, 0.0], &SearchOptions::new("animals"))
///     .await?;
/// assert_eq!(results[0].document.id, "1");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    collections: Arc<RwLock<BTreeMap<String, Collection>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn write_documents(&self, documents: Vec<Document>, op: &str) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;

        for document in &documents {
            let collection = collections
                .get(&document.collection)
                .ok_or_else(|| StoreError::CollectionNotFound(document.collection.clone()))?;
            collection.validate(&document.collection, document)?;
        }

        let now = Utc::now();
        let count = documents.len();
        for document in documents {
            if let Some(collection) = collections.get_mut(&document.collection) {
                collection.upsert(document, now);
            }
        }

        debug!(op, count, "Wrote documents");
        Ok(())
    }
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if (-1.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(StoreError::InvalidThreshold(threshold))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(StoreError::InvalidDimension(name.to_string()));
        }

        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        collections.insert(name.to_string(), Collection::new(dimension));

        info!(collection = name, dimension, "Created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let removed = self.collections.write().await.remove(name);
        if let Some(collection) = removed {
            info!(
                collection = name,
                documents = collection.documents.len(),
                "Deleted collection"
            );
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn add_document(&self, document: Document) -> Result<()> {
        self.write_documents(vec![document], "add").await
    }

    async fn batch_add(&self, documents: Vec<Document>) -> Result<()> {
        self.write_documents(documents, "batch_add").await
    }

    async fn update_document(&self, document: Document) -> Result<()> {
        self.write_documents(vec![document], "update").await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        self.batch_delete(collection, &[id.to_string()]).await?;
        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let removed = ids.iter().filter(|id| target.remove(id)).count();
        debug!(collection, requested = ids.len(), removed, "Deleted documents");
        Ok(removed)
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        let collections = self.collections.read().await;
        collections
            .values()
            .find_map(|collection| collection.materialize(id, true))
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))
    }

    async fn get_document_in(&self, collection: &str, id: &str) -> Result<Document> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        target
            .materialize(id, true)
            .ok_or_else(|| StoreError::DocumentNotFoundIn {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        validate_threshold(options.threshold)?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(&options.collection)
            .ok_or_else(|| StoreError::CollectionNotFound(options.collection.clone()))?;

        let query = query.to_lowercase();
        let scored: Vec<(&str, f32)> = collection
            .documents
            .values()
            .filter(|doc| options.filter.matches(&doc.metadata))
            .filter_map(|doc| {
                let score = lexical_score(&query, &doc.content)?;
                (score >= options.threshold).then_some((doc.id.as_str(), score))
            })
            .collect();

        let results = collection.rank(scored, options);
        debug!(collection = %options.collection, results = results.len(), "Lexical search");
        Ok(results)
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        validate_threshold(options.threshold)?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(&options.collection)
            .ok_or_else(|| StoreError::CollectionNotFound(options.collection.clone()))?;

        if embedding.len() != collection.dimension {
            return Err(StoreError::QueryDimensionMismatch {
                collection: options.collection.clone(),
                expected: collection.dimension,
                actual: embedding.len(),
            });
        }

        let scored: Vec<(&str, f32)> = collection
            .index
            .iter()
            .filter(|(id, _)| {
                collection
                    .documents
                    .get(id.as_str())
                    .is_some_and(|doc| options.filter.matches(&doc.metadata))
            })
            .filter_map(|(id, vector)| {
                let score = cosine_similarity(embedding, vector);
                (score >= options.threshold).then_some((id.as_str(), score))
            })
            .collect();

        let results = collection.rank(scored, options);
        debug!(collection = %options.collection, results = results.len(), "Similarity search");
        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.documents.len())
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }

    async fn ping(&self) -> Result<()> {
        let _collections = self.collections.read().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.collections.write().await.clear();
        info!("Closed in-memory vector store");
        Ok(())
    }
}

/// Occurrences of `query` per whitespace-separated word of `content`.
///
/// `query` must already be lowercase. Returns `None` when the query does not
/// occur; an empty query matches everything with score 1.0.
fn lexical_score(query: &str, content: &str) -> Option<f32> {
    if query.is_empty() {
        return Some(1.0);
    }

    let occurrences = content.to_lowercase().matches(query).count();
    if occurrences == 0 {
        return None;
    }

    let words = content.split_whitespace().count();
    if words == 0 {
        return Some(0.0);
    }
    Some(occurrences as f32 / words as f32)
}
