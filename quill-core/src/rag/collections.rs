//! Logical context types and their physical collection names.

use super::RagError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of project content a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextType {
    WorldView,
    Character,
    Chapter,
    Outline,
    Context,
}

impl ContextType {
    pub const ALL: [ContextType; 5] = [
        ContextType::WorldView,
        ContextType::Character,
        ContextType::Chapter,
        ContextType::Outline,
        ContextType::Context,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::WorldView => "worldview",
            ContextType::Character => "character",
            ContextType::Chapter => "chapter",
            ContextType::Outline => "outline",
            ContextType::Context => "context",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = RagError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ContextType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| RagError::UnknownContextType(name.to_string()))
    }
}

/// Immutable map from context type to physical collection name.
///
/// Built once and handed to [`RagService`](super::RagService); nothing in the
/// engine reads collection names from global state.
///
/// ```no_run
/// # use quill_core::rag::{CollectionRegistry, ContextType};
/// let registry = CollectionRegistry::from_prefix("novel");
/// assert_eq!(registry.name(ContextType::Chapter), "novel_chapter");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRegistry {
    names: BTreeMap<ContextType, String>,
}

impl CollectionRegistry {
    /// Names every collection `<prefix>_<type>`; an empty prefix leaves the
    /// bare type name.
    pub fn from_prefix(prefix: &str) -> Self {
        let names = ContextType::ALL
            .into_iter()
            .map(|kind| {
                let name = if prefix.is_empty() {
                    kind.as_str().to_string()
                } else {
                    format!("{prefix}_{}", kind.as_str())
                };
                (kind, name)
            })
            .collect();
        Self { names }
    }

    /// Overrides one physical name while building the registry.
    pub fn with_name(mut self, kind: ContextType, name: impl Into<String>) -> Self {
        self.names.insert(kind, name.into());
        self
    }

    pub fn name(&self, kind: ContextType) -> &str {
        // Every constructor fills all five entries.
        self.names.get(&kind).map(String::as_str).unwrap_or(kind.as_str())
    }

    /// `(type, collection)` pairs in [`ContextType::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (ContextType, &str)> {
        self.names.iter().map(|(kind, name)| (*kind, name.as_str()))
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::from_prefix("novel")
    }
}
