//! Curated example questions and the smart filters attached to them.

use crate::core::document::DocumentId;
use serde::{Deserialize, Serialize};

/// Whether a curated question is a document's canonical phrasing or one of
/// its paraphrases. Both are treated uniformly at retrieval time; the
/// distinction only matters for tie-breaking (see `question_index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    /// The document's one canonical question.
    Main,
    /// A paraphrase of the main question.
    Variant,
}

/// A compact record of metadata constraints attached to a curated question,
/// applied to vector search to raise precision.
///
/// An exact title, if present, supersedes every other field and is emitted
/// alone by the vector-search filter builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartFilter {
    /// Exact document title. Supersedes all other fields when present.
    pub exact_title: Option<String>,
    /// Procedure code.
    pub procedure_code: Option<String>,
    /// Executing agency.
    pub executing_agency: Option<String>,
    /// Coarse cost category: `true` for free, `false` for paid.
    pub cost_free: Option<bool>,
    /// Coarse processing-speed category (e.g. `"fast"`, `"standard"`).
    pub processing_speed: Option<String>,
    /// Coarse agency-level category (e.g. `"commune"`, `"district"`).
    pub agency_level: Option<String>,
}

impl SmartFilter {
    /// `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A curated question associated with exactly one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleQuestion {
    /// The question text, in Vietnamese.
    pub text: String,
    /// Main or variant.
    pub kind: QuestionKind,
    /// Owning document id.
    pub document_id: DocumentId,
    /// Owning collection id.
    pub collection_id: String,
    /// Optional metadata-narrowing filter.
    pub smart_filter: Option<SmartFilter>,
}

impl ExampleQuestion {
    /// Creates a new main question.
    #[must_use]
    pub fn main(
        text: impl Into<String>,
        document_id: DocumentId,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            kind: QuestionKind::Main,
            document_id,
            collection_id: collection_id.into(),
            smart_filter: None,
        }
    }

    /// Creates a new variant question.
    #[must_use]
    pub fn variant(
        text: impl Into<String>,
        document_id: DocumentId,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            kind: QuestionKind::Variant,
            document_id,
            collection_id: collection_id.into(),
            smart_filter: None,
        }
    }

    /// Attaches a smart filter, consuming and returning `self`.
    #[must_use]
    pub fn with_filter(mut self, filter: SmartFilter) -> Self {
        self.smart_filter = Some(filter);
        self
    }
}
