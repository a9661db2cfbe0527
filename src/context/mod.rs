//! Context expander: given the nucleus chunk, loads the entire originating
//! document and formats it for the generator.
//!
//! Grounded on `context_expander.py::expand_context_with_nucleus` /
//! `_load_full_document`: "1 chunk → whole document" rather than cropping to
//! neighboring chunks, because legal procedures are cross-referential
//! (definitions, exceptions, fee tables live outside the nucleus chunk's
//! immediate neighborhood).

pub mod filesystem;

pub use filesystem::FilesystemDocumentLoader;

use crate::core::{Chunk, Document};
use crate::error::ContextError;
use async_trait::async_trait;

/// Elision marker appended when the assembled block is truncated.
pub const TRUNCATION_MARKER: &str = "\n...[nội dung đã được rút gọn]...";

/// Loads a `Document` given its id, so the context expander can assemble
/// the full source rather than only the nucleus chunk's neighborhood.
///
/// Implementations are expected to be thin I/O adapters (filesystem, a
/// document store) — this is an external collaborator per the design's
/// component table, not part of the core's owned state.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Loads the full document owning `document_id`.
    ///
    /// # Errors
    ///
    /// Returns `ContextError` if the document cannot be found, read, or
    /// parsed.
    async fn load(&self, document_id: &crate::core::DocumentId) -> Result<Document, ContextError>;
}

/// The formatted block handed to the generator, plus diagnostics about
/// what was included.
#[derive(Debug, Clone)]
pub struct ExpandedContext {
    /// The full assembled text: metadata header, then ordered content
    /// sections with the nucleus chunk delimited in-place.
    pub text: String,
    /// Id of the document the context was expanded from.
    pub document_id: crate::core::DocumentId,
    /// `true` if content sections were truncated to fit the character
    /// budget. The metadata header is never truncated.
    pub truncated: bool,
}

const NUCLEUS_OPEN: &str = "\n>>> NUCLEUS START >>>\n";
const NUCLEUS_CLOSE: &str = "\n<<< NUCLEUS END <<<\n";

fn render_metadata_block(doc: &Document) -> String {
    let m = &doc.metadata;
    let mut lines = vec![format!("Tiêu đề: {}", doc.title)];
    if let Some(v) = &m.executing_agency {
        lines.push(format!("Cơ quan thực hiện: {v}"));
    }
    if let Some(v) = &m.applicant_type {
        lines.push(format!("Đối tượng áp dụng: {v}"));
    }
    if let Some(v) = &m.processing_time {
        lines.push(format!("Thời gian xử lý: {v}"));
    }
    if let Some(v) = &m.fee {
        lines.push(format!("Lệ phí: {v}"));
    }
    if let Some(v) = &m.legal_basis {
        lines.push(format!("Căn cứ pháp lý: {v}"));
    }
    lines.join("\n")
}

fn render_content_sections(doc: &Document, nucleus: &Chunk) -> String {
    doc.chunks
        .iter()
        .map(|chunk| {
            if chunk.id == nucleus.id {
                format!("{NUCLEUS_OPEN}{}{NUCLEUS_CLOSE}", chunk.content)
            } else {
                chunk.content.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Expands context around `nucleus` by loading its full owning document via
/// `loader`, rendering a metadata header followed by ordered content
/// sections with the nucleus chunk highlighted, and truncating the content
/// (never the header) to `char_budget`.
///
/// # Errors
///
/// Returns `ContextError` if the document cannot be loaded.
pub async fn expand(
    nucleus: &Chunk,
    loader: &dyn DocumentLoader,
    char_budget: usize,
) -> Result<ExpandedContext, ContextError> {
    let document = loader.load(&nucleus.document_id).await?;

    let metadata_block = render_metadata_block(&document);
    let mut content_block = render_content_sections(&document, nucleus);

    let header_and_separator_len = metadata_block.chars().count() + 2;
    let mut truncated = false;
    let content_budget = char_budget.saturating_sub(header_and_separator_len);
    if content_block.chars().count() > content_budget {
        content_block = content_block.chars().take(content_budget).collect();
        content_block.push_str(TRUNCATION_MARKER);
        truncated = true;
    }

    let text = format!("{metadata_block}\n\n{content_block}");

    Ok(ExpandedContext {
        text,
        document_id: document.id,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChunkMetadata, DocumentId, DocumentMetadata};

    struct FixedLoader {
        document: Document,
    }

    #[async_trait]
    impl DocumentLoader for FixedLoader {
        async fn load(&self, document_id: &DocumentId) -> Result<Document, ContextError> {
            if document_id == &self.document.id {
                Ok(self.document.clone())
            } else {
                Err(ContextError::UnknownSource {
                    document_id: document_id.to_string(),
                })
            }
        }
    }

    fn sample_document() -> Document {
        let mut doc = Document::new(DocumentId::from("d1"), "ho_tich_cap_xa", "Đăng ký khai sinh");
        doc.metadata = DocumentMetadata {
            executing_agency: Some("UBND xã".to_string()),
            fee: Some("Miễn phí".to_string()),
            ..Default::default()
        };
        doc.chunks = vec![
            Chunk::new("c0", doc.id.clone(), 0, "Điều kiện đăng ký khai sinh...")
                .with_metadata(ChunkMetadata::default()),
            Chunk::new("c1", doc.id.clone(), 1, "Hồ sơ cần chuẩn bị gồm...")
                .with_metadata(ChunkMetadata::default()),
            Chunk::new("c2", doc.id.clone(), 2, "Lệ phí và thời gian xử lý...")
                .with_metadata(ChunkMetadata::default()),
        ];
        doc
    }

    #[tokio::test]
    async fn nucleus_content_is_contiguous_substring() {
        let doc = sample_document();
        let nucleus = doc.chunks[1].clone();
        let loader = FixedLoader { document: doc };
        let expanded = expand(&nucleus, &loader, 8000).await.unwrap();
        assert!(expanded.text.contains(&nucleus.content));
    }

    #[tokio::test]
    async fn metadata_block_precedes_content() {
        let doc = sample_document();
        let nucleus = doc.chunks[0].clone();
        let loader = FixedLoader { document: doc };
        let expanded = expand(&nucleus, &loader, 8000).await.unwrap();
        let meta_pos = expanded.text.find("Tiêu đề:").unwrap();
        let content_pos = expanded.text.find("Điều kiện").unwrap();
        assert!(meta_pos < content_pos);
    }

    #[tokio::test]
    async fn truncation_never_removes_metadata() {
        let doc = sample_document();
        let nucleus = doc.chunks[0].clone();
        let loader = FixedLoader { document: doc };
        let expanded = expand(&nucleus, &loader, 30).await.unwrap();
        assert!(expanded.truncated);
        assert!(expanded.text.contains("Tiêu đề:"));
        assert!(expanded.text.contains(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn unknown_document_errors() {
        let doc = sample_document();
        let nucleus = Chunk::new("x", DocumentId::from("other"), 0, "content");
        let loader = FixedLoader { document: doc };
        let result = expand(&nucleus, &loader, 8000).await;
        assert!(result.is_err());
    }
}
