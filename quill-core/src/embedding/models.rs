/// Dimension assumed for a remote model missing from the table.
pub const DEFAULT_REMOTE_DIMENSION: usize = 1536;

/// A hosted embedding model and the vector size it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingModel {
    pub name: &'static str,
    pub dimension: usize,
}

const KNOWN_MODELS: &[EmbeddingModel] = &[
    EmbeddingModel {
        name: "text-embedding-ada-002",
        dimension: 1536,
    },
    EmbeddingModel {
        name: "text-embedding-3-small",
        dimension: 1536,
    },
    EmbeddingModel {
        name: "text-embedding-3-large",
        dimension: 3072,
    },
];

pub fn lookup_model(name: &str) -> Option<&'static EmbeddingModel> {
    KNOWN_MODELS.iter().find(|m| m.name == name)
}

/// Vector dimension for a hosted model, falling back to
/// [`DEFAULT_REMOTE_DIMENSION`] for names the table does not know.
pub fn dimension_for_model(name: &str) -> usize {
    lookup_model(name)
        .map(|m| m.dimension)
        .unwrap_or(DEFAULT_REMOTE_DIMENSION)
}
