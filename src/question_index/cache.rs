//! Binary cache file for the question index.
//!
//! One blob per process: a small header fingerprinting the embedding-model
//! identity and per-collection question counts, followed by the full
//! `QuestionIndex`. Rebuilt whenever the file is absent or the header
//! disagrees with the running configuration — the same "cache first,
//! fallback to live loading" shape as `smart_router.py::_load_from_cache`,
//! minus the mtime-tolerance scan (the core has no filesystem notion of
//! "router example files"; freshness here is purely the fingerprint match).

use crate::error::{ConfigError, Error, Result};
use crate::question_index::QuestionIndex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current on-disk schema version. Bumped whenever the header or body
/// layout changes incompatibly.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Fingerprint written alongside the cached index, checked against the
/// running configuration before the cached body is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHeader {
    /// Schema version of the body that follows.
    pub schema_version: u32,
    /// Unix timestamp (seconds) the cache was written.
    pub created_at_unix: u64,
    /// Identity string of the embedding model used to build the cache
    /// (e.g. `"all-MiniLM-L6-v2"`). A mismatch means the embeddings in the
    /// cache are not comparable to freshly embedded queries.
    pub embedding_model_identity: String,
    /// Per-collection question counts, sorted by collection id. Used as a
    /// cheap fingerprint of the source question set.
    pub collection_sizes: Vec<(String, usize)>,
}

impl CacheHeader {
    /// `true` if `self` matches the expected model identity and question
    /// counts of `index`, i.e. the cached body can be trusted as-is.
    #[must_use]
    pub fn matches(&self, embedding_model_identity: &str, index: &QuestionIndex) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION
            && self.embedding_model_identity == embedding_model_identity
            && self.collection_sizes == index.collection_sizes()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    header: CacheHeader,
    index: QuestionIndex,
}

/// Writes `index` to `path`, stamping the header with `embedding_model_identity`
/// and the current time.
///
/// # Errors
///
/// Returns a `ConfigError` if serialization or the file write fails.
pub fn write_cache(
    path: impl AsRef<Path>,
    index: &QuestionIndex,
    embedding_model_identity: &str,
    created_at_unix: u64,
) -> Result<()> {
    let header = CacheHeader {
        schema_version: CURRENT_SCHEMA_VERSION,
        created_at_unix,
        embedding_model_identity: embedding_model_identity.to_string(),
        collection_sizes: index.collection_sizes(),
    };
    let file = CacheFile {
        header,
        index: index.clone(),
    };
    let bytes = bincode::serialize(&file).map_err(|e| Error::Config(ConfigError::from(e)))?;
    std::fs::write(path, bytes).map_err(|e| {
        Error::Config(ConfigError::QuestionIndexCorrupt(format!(
            "failed to write cache file: {e}"
        )))
    })?;
    Ok(())
}

/// Loads a cached index from `path` if it exists and its header matches
/// `embedding_model_identity`. Returns `Ok(None)` (not an error) when the
/// file is absent, corrupt, or stale — callers should fall back to
/// rebuilding from source questions in every such case.
///
/// # Errors
///
/// Never returns `Err` for a missing or stale cache; only propagates I/O
/// errors other than "not found".
pub fn load_cache(
    path: impl AsRef<Path>,
    embedding_model_identity: &str,
) -> Result<Option<QuestionIndex>> {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Config(ConfigError::QuestionIndexCorrupt(format!(
                "failed to read cache file: {e}"
            ))));
        }
    };

    let file: CacheFile = match bincode::deserialize(&bytes) {
        Ok(f) => f,
        Err(_) => return Ok(None),
    };

    if !file.header.matches(embedding_model_identity, &file.index) {
        return Ok(None);
    }

    Ok(Some(file.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentId;
    use crate::core::ExampleQuestion;
    use crate::question_index::QuestionEntry;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn sample_index() -> QuestionIndex {
        let mut collections = HashMap::new();
        collections.insert(
            "c1".to_string(),
            vec![QuestionEntry {
                question: ExampleQuestion::main("q1", DocumentId::from("d1"), "c1"),
                embedding: vec![1.0, 0.0],
            }],
        );
        QuestionIndex::from_parts(collections)
    }

    #[test]
    fn round_trip_write_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        let index = sample_index();
        write_cache(&path, &index, "model-a", 1_700_000_000).unwrap();

        let loaded = load_cache(&path, "model-a").unwrap();
        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.total_questions(), index.total_questions());
    }

    #[test]
    fn mismatched_model_identity_is_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        let index = sample_index();
        write_cache(&path, &index, "model-a", 1_700_000_000).unwrap();

        let loaded = load_cache(&path, "model-b").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let loaded = load_cache(&path, "model-a").unwrap();
        assert!(loaded.is_none());
    }
}
