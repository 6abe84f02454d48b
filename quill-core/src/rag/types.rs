use super::filter::Filter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Scalar value stored in document metadata.
///
/// Integers and floats compare numerically with each other; any other mix of
/// variants is unordered and unequal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (MetadataValue::String(a), MetadataValue::String(b)) => Some(a.cmp(b)),
            (MetadataValue::Bool(a), MetadataValue::Bool(b)) => Some(a.cmp(b)),
            (MetadataValue::Integer(a), MetadataValue::Integer(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<&String> for MetadataValue {
    fn from(value: &String) -> Self {
        MetadataValue::String(value.clone())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Ordered metadata map. `project_id` is the key every façade query filters on.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A document stored in the vector store.
///
/// An empty `embedding` marks a lexical-only document; otherwise its length
/// must equal the owning collection's dimension. Timestamps are assigned by
/// the store: `created_at` on first insert, `updated_at` on every write.
///
/// # Example
///
/// ```no_run
/// # use quill_core::rag::Document;
/// let doc = Document::new("ch-1", "novel_chapter", "It was a dark and stormy night")
///     .with_embedding(vec![0.1, 0.2, 0.3])
///     .with_metadata("project_id", "p1")
///     .with_metadata("index", 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    pub collection: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        collection: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: Vec::new(),
            metadata: Metadata::new(),
            collection: collection.into(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}

/// Parameters shared by vector and lexical search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub collection: String,
    /// Maximum number of results; zero yields no results.
    pub top_k: usize,
    /// Minimum score, within `[-1, 1]`.
    pub threshold: f32,
    pub filter: Filter,
    pub include_embedding: bool,
}

impl SearchOptions {
    /// Ten results, no score cut, no filter, embeddings stripped.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            top_k: 10,
            threshold: -1.0,
            filter: Filter::default(),
            include_embedding: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_embeddings(mut self) -> Self {
        self.include_embedding = true;
        self
    }
}

/// A search hit, ordered by descending score.
///
/// For vector search `score` is the cosine similarity in `[-1, 1]`; for
/// lexical search it is the match density. `distance` is always `1 - score`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
    pub distance: f32,
}

impl SearchResult {
    pub fn new(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            distance: 1.0 - score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_compare_across_variants() {
        assert_eq!(MetadataValue::Integer(2), MetadataValue::Float(2.0));
        assert!(MetadataValue::Integer(1) < MetadataValue::Float(1.5));
        assert!(MetadataValue::Float(3.0) > MetadataValue::Integer(2));
    }

    #[test]
    fn test_mixed_types_are_unordered() {
        let text = MetadataValue::from("1");
        let number = MetadataValue::from(1);
        assert_ne!(text, number);
        assert_eq!(text.partial_cmp(&number), None);
        assert_eq!(MetadataValue::Bool(true).partial_cmp(&number), None);
    }

    #[test]
    fn test_untagged_metadata_serde() {
        let doc = Document::new("c1", "chapter", "text")
            .with_metadata("project_id", "p1")
            .with_metadata("index", 3)
            .with_metadata("draft", true);

        let json = serde_json::to_value(&doc.metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"draft": true, "index": 3, "project_id": "p1"})
        );

        let back: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(back.get("index"), Some(&MetadataValue::Integer(3)));
    }

    #[test]
    fn test_search_options_defaults() {
        let options = SearchOptions::new("novel_chapter");
        assert_eq!(options.top_k, 10);
        assert_eq!(options.threshold, -1.0);
        assert!(options.filter.is_empty());
        assert!(!options.include_embedding);
    }

    #[test]
    fn test_search_result_distance() {
        let result = SearchResult::new(Document::new("a", "c", "x"), 0.75);
        assert_eq!(result.distance, 0.25);
    }
}
