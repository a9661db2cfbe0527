//! Core domain models for the retrieval engine.
//!
//! Pure data structures with no I/O: chunks, documents, collections,
//! curated questions, and sessions. Everything here is `Send + Sync` and
//! cheaply cloneable so the coordinator can pass owned copies across
//! `.await` points without holding locks.

pub mod chunk;
pub mod collection;
pub mod document;
pub mod question;
pub mod session;

pub use chunk::{Chunk, ChunkMetadata};
pub use collection::Collection;
pub use document::{Document, DocumentId, DocumentMetadata};
pub use question::{ExampleQuestion, QuestionKind, SmartFilter};
pub use session::{
    ClarificationCandidate, ClarificationStage, ClarificationState, HistoryEntry, RoutingMemory,
    Session,
};
