//! Document and document-id types.

use crate::core::chunk::Chunk;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a document, unique within a collection.
///
/// A newtype rather than a bare `String` so the core never needs to
/// re-derive ownership from a chunk's embedded metadata the way the source
/// system did when a chunk's owning document was ambiguous — every `Chunk`
/// the vector index returns carries a `DocumentId` directly (see the
/// `Chunk` invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Metadata describing a legal procedure, rendered by the context expander
/// as a labeled header block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Executing/issuing administrative agency.
    pub executing_agency: Option<String>,
    /// Who may apply (applicant category).
    pub applicant_type: Option<String>,
    /// Human-readable processing time (e.g. "05 ngày làm việc").
    pub processing_time: Option<String>,
    /// Human-readable fee description.
    pub fee: Option<String>,
    /// Legal basis citations.
    pub legal_basis: Option<String>,
    /// Procedure code, used by smart filters for exact narrowing.
    pub procedure_code: Option<String>,
    /// Free-form keywords.
    pub keywords: Vec<String>,
}

/// A single legal procedure: a title, its metadata, and its ordered content
/// chunks. Immutable during query serving — the core only ever reads
/// documents, never writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document id.
    pub id: DocumentId,
    /// Id of the owning collection.
    pub collection_id: String,
    /// Display title.
    pub title: String,
    /// Structured metadata rendered by the context expander.
    pub metadata: DocumentMetadata,
    /// Ordered content chunks.
    pub chunks: Vec<Chunk>,
    /// Filenames of attached forms, if any. Form-attachment detection
    /// itself is out of scope; this only records what ingestion attached.
    pub attached_forms: Vec<String>,
}

impl Document {
    /// Creates a new document with no chunks or attached forms yet.
    #[must_use]
    pub fn new(id: DocumentId, collection_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            collection_id: collection_id.into(),
            title: title.into(),
            metadata: DocumentMetadata::default(),
            chunks: Vec::new(),
            attached_forms: Vec::new(),
        }
    }

    /// Total character length across all chunk contents.
    #[must_use]
    pub fn total_content_len(&self) -> usize {
        self.chunks.iter().map(|c| c.content.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_display_and_conversions() {
        let id: DocumentId = "khai-sinh-001".into();
        assert_eq!(id.to_string(), "khai-sinh-001");
        assert_eq!(id.as_ref(), "khai-sinh-001");

        let id2 = DocumentId::from(String::from("khai-sinh-001"));
        assert_eq!(id, id2);
    }

    #[test]
    fn new_document_starts_empty() {
        let doc = Document::new("doc-1".into(), "ho-tich-cap-xa", "Đăng ký khai sinh");
        assert!(doc.chunks.is_empty());
        assert!(doc.attached_forms.is_empty());
        assert_eq!(doc.total_content_len(), 0);
    }
}
