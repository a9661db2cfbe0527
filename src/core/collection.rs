//! Collection: a named set of documents sharing a domain.

use serde::{Deserialize, Serialize};

/// A named set of legal-procedure documents sharing a domain, e.g.
/// `"ho_tich_cap_xa"` (civil registration at commune level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Stable collection id, used as the key in vector search and the
    /// question index.
    pub id: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Number of documents currently in the collection.
    pub document_count: usize,
}

impl Collection {
    /// Creates a new collection record.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, document_count: usize) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            document_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_collection_fields() {
        let c = Collection::new("ho_tich_cap_xa", "Hộ tịch cấp xã", 12);
        assert_eq!(c.id, "ho_tich_cap_xa");
        assert_eq!(c.document_count, 12);
    }
}
