//! Filesystem-backed `DocumentLoader`: reads one JSON-serialized `Document`
//! per file from a directory, keyed by document id.
//!
//! Grounded on the reader/writer shape of a plain file-backed I/O adapter;
//! simplified to direct reads since documents here are legal-procedure
//! text, orders of magnitude below the size where memory mapping pays off.

use crate::context::DocumentLoader;
use crate::core::{Document, DocumentId};
use crate::error::ContextError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Loads documents from `<root>/<document_id>.json`.
pub struct FilesystemDocumentLoader {
    root: PathBuf,
}

impl FilesystemDocumentLoader {
    /// Builds a loader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(format!("{}.json", document_id.as_ref()))
    }
}

#[async_trait]
impl DocumentLoader for FilesystemDocumentLoader {
    async fn load(&self, document_id: &DocumentId) -> Result<Document, ContextError> {
        let path = self.path_for(document_id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ContextError::Io {
                document_id: document_id.to_string(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|e| ContextError::Parse {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, DocumentMetadata};
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_a_document_by_id() {
        let dir = tempdir().unwrap();
        let mut doc = Document::new(DocumentId::from("d1"), "c1", "Đăng ký khai sinh");
        doc.metadata = DocumentMetadata::default();
        doc.chunks = vec![Chunk::new("c0", doc.id.clone(), 0, "nội dung")];
        let bytes = serde_json::to_vec(&doc).unwrap();
        tokio::fs::write(dir.path().join("d1.json"), bytes).await.unwrap();

        let loader = FilesystemDocumentLoader::new(dir.path());
        let loaded = loader.load(&DocumentId::from("d1")).await.unwrap();
        assert_eq!(loaded.title, "Đăng ký khai sinh");
    }

    #[tokio::test]
    async fn missing_document_is_an_io_error() {
        let dir = tempdir().unwrap();
        let loader = FilesystemDocumentLoader::new(dir.path());
        let err = loader.load(&DocumentId::from("missing")).await;
        assert!(matches!(err, Err(ContextError::Io { .. })));
    }
}
