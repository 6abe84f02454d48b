//! Vector store abstraction.
//!
//! This module provides the interface every storage backend implements. The
//! in-memory [`MemoryVectorStore`](super::MemoryVectorStore) is the reference
//! brute-force backend; an approximate nearest-neighbour backend can slot in
//! behind the same trait without changing callers, as long as it keeps the
//! ranking contract documented on [`VectorStore::similarity_search`].

use super::types::{Document, SearchOptions, SearchResult};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by vector store operations.
///
/// Validation failures are reported before anything is written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Collection {0} already exists")]
    CollectionExists(String),

    #[error("Collection {0} not found")]
    CollectionNotFound(String),

    #[error("Document {0} not found")]
    DocumentNotFound(String),

    #[error("Document {id} not found in collection {collection}")]
    DocumentNotFoundIn { collection: String, id: String },

    #[error("Collection {0} needs a positive dimension")]
    InvalidDimension(String),

    #[error(
        "Embedding dimension mismatch for document {id} in collection {collection}: \
         expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        collection: String,
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Query dimension mismatch for collection {collection}: expected {expected}, got {actual}")]
    QueryDimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Document in collection {0} has an empty id")]
    EmptyId(String),

    #[error("Search threshold {0} is outside [-1, 1]")]
    InvalidThreshold(f32),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified interface for vector database operations.
///
/// Collections must be created before use. Ids are unique within a collection;
/// writes are upserts by id. All deletes are scoped to one collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates a collection. Fails if the name is taken.
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// Drops a collection with all its documents. Missing names are a no-op.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Collection names in ascending order.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Inserts or overwrites one document in `document.collection`.
    async fn add_document(&self, document: Document) -> Result<()>;

    /// Inserts or overwrites several documents. Every document is validated
    /// before any is written.
    async fn batch_add(&self, documents: Vec<Document>) -> Result<()>;

    /// Explicit upsert: refreshes `updated_at` and re-indexes the embedding.
    async fn update_document(&self, document: Document) -> Result<()>;

    /// Removes one document. Removing an absent id is a no-op.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;

    /// Removes several documents, returning how many existed.
    async fn batch_delete(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Looks a document up across all collections, in name order; first match wins.
    async fn get_document(&self, id: &str) -> Result<Document>;

    /// Looks a document up in one collection.
    async fn get_document_in(&self, collection: &str, id: &str) -> Result<Document>;

    /// Lexical search for callers without an embedding step.
    ///
    /// Case-insensitive substring match scored by occurrences per word. An
    /// empty query lists every document that passes the filter.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>>;

    /// Cosine-similarity search.
    ///
    /// Keeps documents that pass `options.filter` and score at least
    /// `options.threshold`, sorted by descending score with ties broken by
    /// ascending id, truncated to `options.top_k`. Embeddings are stripped
    /// unless `options.include_embedding` is set.
    async fn similarity_search(
        &self,
        embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    async fn ping(&self) -> Result<()>;

    /// Releases all state held by the store.
    async fn close(&self) -> Result<()>;
}

/// Computes cosine similarity between two vectors.
///
/// Returns values from -1.0 (opposite) to 1.0 (identical), with 0.0 for
/// orthogonal vectors. Returns 0.0 for mismatched lengths or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}
