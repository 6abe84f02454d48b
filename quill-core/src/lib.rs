//! quill-core - Retrieval engine for long-form fiction projects
//!
//! Provides the components that keep a novel's world, cast and chapters
//! retrievable as grounding context for text generation:
//! - Embedding providers (OpenAI-compatible HTTP, deterministic local)
//! - Vector storage with metadata filtering and similarity search
//! - A RAG façade mapping project entities onto collections
//! - Configuration management
//!
//! ## Primary API
//!
//! Most callers only need [`RagService`], built with
//! [`RagService::from_config`].

// Public modules
pub mod config;
pub mod embedding;
pub mod rag;

// Public exports
pub use config::{Config, ConfigError, EmbeddingConfig, RagConfig};
pub use embedding::{
    create_embedding_service, EmbeddingError, EmbeddingService, LocalEmbeddingService,
    OpenAiEmbeddingService,
};
pub use rag::{
    CollectionRegistry, ContextType, Document, Filter, MemoryVectorStore, ProjectStats, RagError,
    RagService, SearchOptions, SearchResult, StoreError, VectorStore,
};
