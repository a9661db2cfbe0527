//! Retrieval engine and conversational state machine for a Vietnamese
//! legal-procedure question-answering service.
//!
//! A turn flows router → vector search → consensus reranker → context
//! expansion → generator, with a multi-turn clarification state machine
//! taking over whenever routing or combined confidence is insufficient.
//! [`coordinator::RetrievalCoordinator`] is the single entry point; every
//! other module is one stage of its pipeline or a domain type it threads
//! through.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod clarification;
pub mod cli;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod core;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod question_index;
pub mod rerank;
pub mod router;
pub mod session_store;
pub mod vector;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    Chunk, ChunkMetadata, Collection, Document, DocumentId, DocumentMetadata, ExampleQuestion,
    QuestionKind, Session, SmartFilter,
};

// Re-export configuration
pub use config::Config;

// Re-export the coordinator and its response types
pub use coordinator::{ContextInfo, Response, RetrievalCoordinator, RoutingInfo, SelectedOption};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::{FastEmbedEmbedder, create_embedder};
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, EmbeddingOracle, cosine_similarity};

// Re-export vector index types
#[cfg(feature = "sqlite-vector-index")]
pub use vector::SqliteVectorIndex;
pub use vector::{Filter, InMemoryVectorIndex, SearchHit, VectorIndex};

// Re-export the question index
pub use question_index::{QuestionEntry, QuestionIndex};

// Re-export context expansion types
pub use context::{DocumentLoader, ExpandedContext, FilesystemDocumentLoader};
