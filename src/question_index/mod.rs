//! Question index: collection → ordered (example question, embedding)
//! pairs, built once at startup and cached to disk.

pub mod cache;

pub use cache::{CacheHeader, CURRENT_SCHEMA_VERSION};

use crate::core::{Collection, ExampleQuestion};
use crate::embedding::EmbeddingOracle;
use crate::error::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One curated question paired with its precomputed embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntry {
    /// The curated question.
    pub question: ExampleQuestion,
    /// Its embedding, same dimension as every other entry in the index.
    pub embedding: Vec<f32>,
}

/// In-memory map of collection → ordered list of (question, embedding).
///
/// Process-wide, read-mostly state: built once at startup (or loaded from
/// the cache file) and rebuilt only on an explicit reindex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionIndex {
    collections: HashMap<String, Vec<QuestionEntry>>,
}

impl QuestionIndex {
    /// Builds an index directly from an already-grouped map, bypassing
    /// embedding. Used by the cache loader and by tests that construct
    /// fixtures without an `EmbeddingOracle`.
    #[must_use]
    pub fn from_parts(collections: HashMap<String, Vec<QuestionEntry>>) -> Self {
        Self { collections }
    }

    /// Builds an index from curated questions by embedding every question
    /// text in one batch call.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::QuestionIndexMissing` if `questions` is empty,
    /// or an oracle error if embedding fails.
    pub async fn build(
        questions: Vec<ExampleQuestion>,
        oracle: &dyn EmbeddingOracle,
    ) -> Result<Self> {
        if questions.is_empty() {
            return Err(Error::Config(ConfigError::QuestionIndexMissing {
                reason: "no curated questions supplied".to_string(),
            }));
        }

        let texts: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();
        let embeddings = oracle.embed(&texts).await?;

        let mut collections: HashMap<String, Vec<QuestionEntry>> = HashMap::new();
        for (question, embedding) in questions.into_iter().zip(embeddings) {
            collections
                .entry(question.collection_id.clone())
                .or_default()
                .push(QuestionEntry { question, embedding });
        }
        Ok(Self { collections })
    }

    /// The questions and embeddings for a collection, if any are indexed.
    #[must_use]
    pub fn collection(&self, collection_id: &str) -> &[QuestionEntry] {
        self.collections
            .get(collection_id)
            .map_or(&[], Vec::as_slice)
    }

    /// All indexed collection ids.
    pub fn collection_ids(&self) -> impl Iterator<Item = &String> {
        self.collections.keys()
    }

    /// `true` if no collection has any questions indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.values().all(Vec::is_empty)
    }

    /// Total number of indexed example questions across all collections.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// A `Collection` record summary for each indexed collection, counting
    /// distinct owning documents.
    #[must_use]
    pub fn collection_summaries(&self) -> Vec<Collection> {
        self.collections
            .iter()
            .map(|(id, entries)| {
                let docs: std::collections::HashSet<_> =
                    entries.iter().map(|e| e.question.document_id.clone()).collect();
                Collection::new(id.clone(), id.clone(), docs.len())
            })
            .collect()
    }

    /// Inserts an empty collection entry if absent, used by tests to
    /// verify that irrelevant collections don't perturb routing.
    pub fn ensure_collection(&mut self, collection_id: impl Into<String>) {
        self.collections.entry(collection_id.into()).or_default();
    }

    /// Per-collection question counts, used as part of the cache header's
    /// fingerprint.
    #[must_use]
    pub fn collection_sizes(&self) -> Vec<(String, usize)> {
        let mut sizes: Vec<_> = self
            .collections
            .iter()
            .map(|(id, entries)| (id.clone(), entries.len()))
            .collect();
        sizes.sort();
        sizes
    }
}
