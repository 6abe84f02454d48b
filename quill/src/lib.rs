//! quill - Retrieval-augmented context for fiction writing tools
//!
//! This is the convenience wrapper crate that re-exports the `quill-core`
//! engine.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! quill = "0.1"
//! ```
//!
//! ```no_run
//! use quill::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let rag = RagService::from_config(&Config::load_or_default()?).await?;
//! let context = rag.build_context_prompt("p1", 3, "the eruption").await;
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use quill_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use quill_core::embedding::{create_embedding_service, EmbeddingService};
    pub use quill_core::rag::{
        Chapter, ChapterOutline, Character, CollectionRegistry, ContextType, Document, Filter,
        MemoryVectorStore, NovelProject, Outline, ProjectStats, RagError, RagService,
        SearchOptions, SearchResult, VectorStore, WorldView,
    };
    pub use quill_core::{Config, EmbeddingConfig, RagConfig};
}
