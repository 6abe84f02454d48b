//! Text embedding providers.
//!
//! An [`EmbeddingService`] turns text into fixed-dimension vectors. Two
//! providers ship with the engine:
//!
//! - [`OpenAiEmbeddingService`]: one HTTP JSON request per call against an
//!   OpenAI-compatible `/embeddings` endpoint (also used for Azure).
//! - [`LocalEmbeddingService`]: a deterministic pseudo-embedding derived from a
//!   string hash. Embedding the same text twice yields bit-identical vectors,
//!   which makes it the provider of choice for tests and offline runs.
//!
//! Use [`create_embedding_service`] to build a provider from configuration; an
//! unknown provider name fails immediately.

mod local;
mod models;
mod openai;

pub use local::LocalEmbeddingService;
pub use models::{dimension_for_model, lookup_model, EmbeddingModel, DEFAULT_REMOTE_DIMENSION};
pub use openai::OpenAiEmbeddingService;

use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Cannot embed an empty batch")]
    EmptyBatch,

    #[error("Failed to embed batch item {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<EmbeddingError>,
    },

    #[error("Unsupported embedding provider: {0}")]
    UnknownProvider(String),

    #[error("Embedding configuration error: {0}")]
    Config(String),

    /// The provider answered with a non-2xx status.
    #[error("Embedding API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Embedding HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered 2xx but the body was not the expected JSON.
    #[error("Malformed embedding response ({source}): {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("No embeddings returned")]
    NoEmbeddings,

    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Converts text into vector embeddings.
///
/// Implementations must be cheap to share behind an `Arc`. Every call is a
/// future; dropping it abandons the work (remote providers abort the request).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds a single text. Fails on empty input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several texts. Fails as a whole if any item fails or if the
    /// number of returned vectors differs from the number of inputs.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the vectors this service produces.
    fn dimension(&self) -> usize;

    /// Liveness check that does not spend an embedding call.
    async fn ping(&self) -> Result<()>;
}

/// Known embedding backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Azure,
    Local,
}

impl FromStr for ProviderKind {
    type Err = EmbeddingError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "azure" => Ok(Self::Azure),
            "local" => Ok(Self::Local),
            _ => Err(EmbeddingError::UnknownProvider(name.to_string())),
        }
    }
}

/// Creates an embedding service from configuration.
///
/// - `openai` / `azure`: OpenAI-compatible HTTP client. Azure speaks the same
///   request format; it only needs its own base URL.
/// - `local`: deterministic provider whose dimension comes from a
///   `local-<dim>` model name (768 otherwise).
///
/// # Errors
///
/// Returns [`EmbeddingError::UnknownProvider`] for any other name, and
/// [`EmbeddingError::Config`] when a remote provider lacks a base URL or the
/// HTTP client cannot be built.
pub fn create_embedding_service(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>> {
    let kind: ProviderKind = config.provider.parse()?;
    info!(provider = %config.provider, model = %config.model, "Creating embedding service");

    match kind {
        ProviderKind::OpenAi | ProviderKind::Azure => {
            let service = OpenAiEmbeddingService::new(config)?;
            Ok(Arc::new(service))
        }
        ProviderKind::Local => {
            let dimension = LocalEmbeddingService::dimension_from_model(&config.model);
            Ok(Arc::new(LocalEmbeddingService::new(dimension)))
        }
    }
}
