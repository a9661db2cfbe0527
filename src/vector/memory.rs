//! In-memory reference [`VectorIndex`], used throughout the test suite.
//!
//! The cosine-scan loop is the same shape as a simple semantic-search
//! implementation: embed once, score every candidate, filter by threshold,
//! sort descending, truncate to `k`. Real deployments point the core at an
//! external vector database instead; this exists so the crate is testable
//! without one.

use crate::core::{Chunk, Collection};
use crate::embedding::cosine_similarity;
use crate::error::OracleError;
use crate::vector::{Filter, SearchHit, VectorIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// An in-memory, collection-keyed cosine-search index.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Vec<Entry>>>,
}

impl InMemoryVectorIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a chunk with its precomputed embedding into a collection.
    pub fn insert(&self, collection: &str, chunk: Chunk, embedding: Vec<f32>) {
        let mut guard = self.collections.write().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(collection.to_string())
            .or_default()
            .push(Entry { chunk, embedding });
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search_in_collection(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
        threshold: f32,
        filter: Option<&Filter>,
    ) -> std::result::Result<Vec<SearchHit>, OracleError> {
        let guard = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = guard.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter(|entry| filter.is_none_or(|f| f.matches(&entry.chunk)))
            .map(|entry| SearchHit {
                chunk: entry.chunk.clone(),
                similarity: cosine_similarity(query_embedding, &entry.embedding),
            })
            .filter(|hit| hit.similarity >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn list_collections(&self) -> std::result::Result<Vec<Collection>, OracleError> {
        let guard = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let mut docs_per_collection: HashMap<&str, std::collections::HashSet<&str>> =
            HashMap::new();
        for (name, entries) in &guard {
            let docs = docs_per_collection.entry(name).or_default();
            for entry in entries {
                docs.insert(entry.chunk.document_id.as_ref());
            }
        }
        Ok(docs_per_collection
            .into_iter()
            .map(|(name, docs)| Collection::new(name, name, docs.len()))
            .collect())
    }
}
