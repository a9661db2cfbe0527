//! Vector index: the external contract for filtered cosine search over
//! chunk embeddings, plus the filter language and a couple of reference
//! adapters used in tests.

pub mod memory;
#[cfg(feature = "sqlite-vector-index")]
pub mod sqlite;

pub use memory::InMemoryVectorIndex;
#[cfg(feature = "sqlite-vector-index")]
pub use sqlite::SqliteVectorIndex;

use crate::core::{Chunk, Collection, SmartFilter};
use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single value a `Filter::Eq`/`Filter::In` compares against.
pub type FilterValue = String;

/// The filter language the vector index contract supports: equality,
/// set-membership, and conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// `field == value`.
    Eq(String, FilterValue),
    /// `field in values`.
    In(String, Vec<FilterValue>),
    /// Conjunction of sub-filters.
    And(Vec<Filter>),
}

impl Filter {
    /// Evaluates the filter against a chunk's metadata.
    #[must_use]
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Self::Eq(field, value) => field_value(chunk, field).is_some_and(|v| &v == value),
            Self::In(field, values) => {
                field_value(chunk, field).is_some_and(|v| values.contains(&v))
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(chunk)),
        }
    }
}

fn field_value(chunk: &Chunk, field: &str) -> Option<String> {
    match field {
        "title" => chunk.metadata.title.clone(),
        "procedure_code" => chunk.metadata.procedure_code.clone(),
        "executing_agency" => chunk.metadata.executing_agency.clone(),
        _ => None,
    }
}

/// Builds the metadata filter for a vector-search call per the filter
/// construction rule: an exact title (or a forced document title) is
/// emitted alone; otherwise the filter is the conjunction of whichever of
/// {procedure code, executing agency} the smart filter supplied.
#[must_use]
pub fn build_filter(smart_filter: Option<&SmartFilter>, forced_title: Option<&str>) -> Option<Filter> {
    if let Some(title) = forced_title {
        return Some(Filter::Eq("title".to_string(), title.to_string()));
    }
    let smart_filter = smart_filter?;
    if let Some(title) = &smart_filter.exact_title {
        return Some(Filter::Eq("title".to_string(), title.clone()));
    }
    let mut clauses = Vec::new();
    if let Some(code) = &smart_filter.procedure_code {
        clauses.push(Filter::Eq("procedure_code".to_string(), code.clone()));
    }
    if let Some(agency) = &smart_filter.executing_agency {
        clauses.push(Filter::Eq("executing_agency".to_string(), agency.clone()));
    }
    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(Filter::And(clauses)),
    }
}

/// A single vector-search result: the chunk and its cosine similarity to
/// the query embedding.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// The vector index contract: stores chunk embeddings plus per-chunk
/// metadata; supports filtered cosine search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Searches a single collection for the `k` chunks most similar to
    /// `query_embedding`, above `threshold`, matching `filter` if given.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::VectorIndex` on backend failure.
    async fn search_in_collection(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
        threshold: f32,
        filter: Option<&Filter>,
    ) -> std::result::Result<Vec<SearchHit>, OracleError>;

    /// Lists the collections this index currently holds chunks for.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::VectorIndex` on backend failure.
    async fn list_collections(&self) -> std::result::Result<Vec<Collection>, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentId;

    fn chunk_with(title: &str, code: Option<&str>, agency: Option<&str>) -> Chunk {
        use crate::core::ChunkMetadata;
        Chunk::new("c1", DocumentId::from("d1"), 0, "content").with_metadata(ChunkMetadata {
            title: Some(title.to_string()),
            procedure_code: code.map(str::to_string),
            executing_agency: agency.map(str::to_string),
            ..Default::default()
        })
    }

    #[test]
    fn forced_title_emitted_alone() {
        let smart = SmartFilter {
            procedure_code: Some("X1".to_string()),
            ..Default::default()
        };
        let filter = build_filter(Some(&smart), Some("Đăng ký khai sinh")).unwrap();
        assert_eq!(
            filter,
            Filter::Eq("title".to_string(), "Đăng ký khai sinh".to_string())
        );
    }

    #[test]
    fn exact_title_emitted_alone_over_other_fields() {
        let smart = SmartFilter {
            exact_title: Some("Đăng ký khai sinh".to_string()),
            procedure_code: Some("X1".to_string()),
            ..Default::default()
        };
        let filter = build_filter(Some(&smart), None).unwrap();
        assert_eq!(
            filter,
            Filter::Eq("title".to_string(), "Đăng ký khai sinh".to_string())
        );
    }

    #[test]
    fn conjunction_of_code_and_agency() {
        let smart = SmartFilter {
            procedure_code: Some("X1".to_string()),
            executing_agency: Some("UBND xã".to_string()),
            ..Default::default()
        };
        let filter = build_filter(Some(&smart), None).unwrap();
        match filter {
            Filter::And(clauses) => assert_eq!(clauses.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn no_filter_fields_is_none() {
        assert!(build_filter(None, None).is_none());
        assert!(build_filter(Some(&SmartFilter::default()), None).is_none());
    }

    #[test]
    fn filter_matches_against_chunk_metadata() {
        let chunk = chunk_with("Đăng ký khai sinh", Some("X1"), Some("UBND xã"));
        assert!(Filter::Eq("title".to_string(), "Đăng ký khai sinh".to_string()).matches(&chunk));
        assert!(!Filter::Eq("title".to_string(), "Khác".to_string()).matches(&chunk));
        assert!(
            Filter::And(vec![
                Filter::Eq("procedure_code".to_string(), "X1".to_string()),
                Filter::Eq("executing_agency".to_string(), "UBND xã".to_string()),
            ])
            .matches(&chunk)
        );
    }
}
