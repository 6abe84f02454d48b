//! Metadata predicates applied before ranking.
//!
//! A [`Filter`] is a conjunction of per-key [`Predicate`]s. A document whose
//! metadata lacks a filtered key never matches, and ordered comparisons
//! between incompatible value types (say a string against a number) are false.

use super::types::{Metadata, MetadataValue};
use std::collections::BTreeMap;

/// Condition on a single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(MetadataValue),
    Lt(MetadataValue),
    Gt(MetadataValue),
    In(Vec<MetadataValue>),
}

impl Predicate {
    pub fn matches(&self, actual: &MetadataValue) -> bool {
        match self {
            Predicate::Eq(expected) => actual == expected,
            Predicate::Lt(bound) => actual < bound,
            Predicate::Gt(bound) => actual > bound,
            Predicate::In(options) => options.iter().any(|option| actual == option),
        }
    }
}

/// AND-combined metadata filter. The empty filter matches every document.
///
/// ```no_run
/// # use quill_core::rag::Filter;
/// let filter = Filter::new().eq("project_id", "p1").lt("index", 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: BTreeMap<String, Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the predicate on `key`.
    pub fn with(mut self, key: impl Into<String>, predicate: Predicate) -> Self {
        self.conditions.insert(key.into(), predicate);
        self
    }

    pub fn eq(self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.with(key, Predicate::Eq(value.into()))
    }

    pub fn lt(self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.with(key, Predicate::Lt(value.into()))
    }

    pub fn gt(self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.with(key, Predicate::Gt(value.into()))
    }

    pub fn one_of<V: Into<MetadataValue>>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with(key, Predicate::In(values))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(key, predicate)| {
            metadata
                .get(key)
                .is_some_and(|actual| predicate.matches(actual))
        })
    }
}
