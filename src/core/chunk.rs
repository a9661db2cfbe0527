//! Chunk: a semantically meaningful passage from one source document.

use crate::core::document::DocumentId;
use serde::{Deserialize, Serialize};

/// Metadata carried alongside a chunk's text, mirroring the fields the
/// context expander needs to render a document header and the fields a
/// smart filter narrows vector search against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Document title (denormalized from the owning document for cheap
    /// display without a join).
    pub title: Option<String>,
    /// Procedure code.
    pub procedure_code: Option<String>,
    /// Executing/issuing agency.
    pub executing_agency: Option<String>,
    /// Effective date, as a display string.
    pub effective_date: Option<String>,
    /// Processing time, as a display string.
    pub processing_time: Option<String>,
    /// Fee, as a display string.
    pub fee: Option<String>,
    /// Legal basis citation.
    pub legal_basis: Option<String>,
    /// Free-form keywords.
    pub keywords: Vec<String>,
    /// Section heading this chunk falls under, if the source document was
    /// sectioned.
    pub section_title: Option<String>,
}

/// A passage of a document's content, addressable independently for vector
/// search and rerank, but always traceable back to its owning document.
///
/// Invariant: every chunk returned by the vector index carries a
/// `document_id` and `index` so its full source document can be reloaded
/// on demand by the context expander.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable chunk id, unique within the vector index.
    pub id: String,
    /// Id of the document this chunk belongs to.
    pub document_id: DocumentId,
    /// Ordinal position of this chunk within its document.
    pub index: usize,
    /// Textual content.
    pub content: String,
    /// Structured metadata.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Creates a new chunk with default (empty) metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        document_id: DocumentId,
        index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id,
            index,
            content: content.into(),
            metadata: ChunkMetadata::default(),
        }
    }

    /// Attaches metadata, consuming and returning `self` for fluent
    /// construction.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// `true` if the chunk has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Character length of the content.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(id: &str, doc: &str, idx: usize) -> Chunk {
        Chunk::new(id, DocumentId::from(doc), idx, "nội dung mẫu")
    }

    #[test]
    fn new_chunk_has_empty_metadata() {
        let chunk = sample_chunk("c1", "d1", 0);
        assert_eq!(chunk.metadata, ChunkMetadata::default());
        assert!(!chunk.is_empty());
    }

    #[test]
    fn with_metadata_replaces_default() {
        let meta = ChunkMetadata {
            title: Some("Đăng ký khai sinh".to_string()),
            ..Default::default()
        };
        let chunk = sample_chunk("c1", "d1", 0).with_metadata(meta.clone());
        assert_eq!(chunk.metadata, meta);
    }

    #[test]
    fn len_counts_chars_not_bytes() {
        let chunk = Chunk::new("c1", DocumentId::from("d1"), 0, "đ");
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.content.len(), 2);
    }
}
