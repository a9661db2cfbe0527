//! Consensus reranker: picks a single "nucleus" chunk from a candidate
//! pool by requiring agreement across the top-*m* cross-encoder scores
//! rather than trusting the single highest score outright.
//!
//! Grounded on `reranker.py`'s `_analyze_document_consensus` /
//! `_find_best_consensus` / `get_consensus_document` (router-trust branch)
//! and `result_reranker.py`'s `trust_router` gate and low-score warning.

#[cfg(feature = "remote-oracles")]
pub mod http;

use crate::config::Config;
use crate::core::{Chunk, DocumentId};
use crate::error::OracleError;
use async_trait::async_trait;
use tracing::{info, warn};

/// The reranker oracle contract: scores `(query, passage)` pairs with a
/// cross-encoder. Unbounded range; larger means more relevant.
#[async_trait]
pub trait RerankerOracle: Send + Sync {
    /// Scores each `(query, passage)` pair, same order as input.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Rerank` on failure.
    async fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, OracleError>;
}

/// Maximum passage length (characters) passed to the cross-encoder, per
/// the Vietnamese reranker's documented capacity (~2048 tokens of
/// passage ≈ 6000 characters).
pub const MAX_PASSAGE_CHARS: usize = 6000;

fn clean_and_truncate(content: &str) -> String {
    let cleaned: String = content
        .chars()
        .filter(|c| !matches!(c, '*' | '#'))
        .collect();
    let normalized = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() > MAX_PASSAGE_CHARS {
        let truncated: String = normalized.chars().take(MAX_PASSAGE_CHARS).collect();
        format!("{truncated}...")
    } else {
        normalized
    }
}

/// A scored candidate, after the cross-encoder pass.
#[derive(Debug, Clone)]
struct ScoredChunk {
    chunk: Chunk,
    score: f32,
}

/// Outcome of the consensus reranker's nucleus selection.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// The chosen nucleus chunk.
    pub nucleus: Chunk,
    /// The cross-encoder score of the nucleus (or the vector-search
    /// similarity, if the fallback path was used).
    pub top_rerank_score: f32,
    /// `true` if the reranker call failed and the outcome is the
    /// vector-search top-1 instead.
    pub reranker_fallback: bool,
    /// `true` if the router-trust short-circuit selected a chunk from the
    /// router's target document even though it was not the cross-encoder's
    /// top pick.
    pub router_trusted: bool,
}

/// Picks a nucleus chunk from `candidates` (already ordered by vector-search
/// similarity, descending) via the consensus algorithm.
///
/// # Errors
///
/// Never returns `Err`: a reranker failure degrades to the vector-search
/// top-1 per the propagation policy (§7), recorded in the outcome's
/// `reranker_fallback` flag.
pub async fn consensus_rerank(
    query: &str,
    candidates: Vec<Chunk>,
    oracle: &dyn RerankerOracle,
    cfg: &Config,
    router_confidence: f32,
    router_target_document: Option<&DocumentId>,
) -> Option<RerankOutcome> {
    let first = candidates.first()?.clone();

    let pairs: Vec<(String, String)> = candidates
        .iter()
        .map(|c| (query.to_string(), clean_and_truncate(&c.content)))
        .collect();

    let scores = match oracle.score(&pairs).await {
        Ok(scores) => scores,
        Err(err) => {
            warn!(error = %err, "reranker oracle failed, falling back to vector-search top-1");
            return Some(RerankOutcome {
                nucleus: first,
                top_rerank_score: 0.0,
                reranker_fallback: true,
                router_trusted: false,
            });
        }
    };

    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .zip(scores)
        .map(|(chunk, score)| ScoredChunk { chunk, score })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });

    if let Some(top) = scored.first()
        && top.score < 0.2
    {
        warn!(score = top.score, "low top rerank score after consensus pass");
    }

    // Router-trust short-circuit: a high-confidence router decision with a
    // named target document is trusted over cross-encoder disagreement,
    // provided a chunk from that document survived into the candidate set.
    if router_confidence >= cfg.router_trust_threshold
        && let Some(target) = router_target_document
        && let Some(trusted) = scored.iter().find(|s| &s.chunk.document_id == target)
    {
        info!(document_id = %target, "router-trust short-circuit selected nucleus");
        return Some(RerankOutcome {
            nucleus: trusted.chunk.clone(),
            top_rerank_score: trusted.score,
            reranker_fallback: false,
            router_trusted: true,
        });
    }

    let top_m = cfg.consensus_top_m.min(scored.len());
    let top_slice = &scored[..top_m];

    let mut by_document: std::collections::HashMap<&DocumentId, (usize, &ScoredChunk)> =
        std::collections::HashMap::new();
    for entry in top_slice {
        by_document
            .entry(&entry.chunk.document_id)
            .and_modify(|(count, best)| {
                *count += 1;
                if entry.score > best.score
                    || ((entry.score - best.score).abs() < f32::EPSILON
                        && entry.chunk.id < best.chunk.id)
                {
                    *best = entry;
                }
            })
            .or_insert((1, entry));
    }

    #[allow(clippy::cast_precision_loss)]
    let consensus_pick = by_document
        .into_iter()
        .map(|(_, (count, best))| (count as f32 / top_m as f32, best))
        .filter(|(ratio, _)| *ratio >= cfg.consensus_threshold)
        .max_by(|(ratio_a, a), (ratio_b, b)| {
            ratio_a
                .partial_cmp(ratio_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.score
                        .partial_cmp(&b.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

    let (nucleus, top_rerank_score) = match consensus_pick {
        Some((_, best)) => (best.chunk.clone(), best.score),
        None => {
            let top = scored.first()?;
            (top.chunk.clone(), top.score)
        }
    };

    Some(RerankOutcome {
        nucleus,
        top_rerank_score,
        reranker_fallback: false,
        router_trusted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentId;

    struct FakeReranker {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl RerankerOracle for FakeReranker {
        async fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, OracleError> {
            assert_eq!(pairs.len(), self.scores.len());
            Ok(self.scores.clone())
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl RerankerOracle for FailingReranker {
        async fn score(&self, _pairs: &[(String, String)]) -> Result<Vec<f32>, OracleError> {
            Err(OracleError::Rerank("service down".to_string()))
        }
    }

    fn chunk(id: &str, doc: &str) -> Chunk {
        Chunk::new(id, DocumentId::from(doc), 0, "nội dung chunk")
    }

    #[tokio::test]
    async fn same_document_consensus_picks_best_chunk() {
        let cfg = Config::default();
        let candidates = vec![chunk("a", "d1"), chunk("b", "d1"), chunk("c", "d1")];
        let reranker = FakeReranker {
            scores: vec![0.5, 0.9, 0.3],
        };
        let outcome = consensus_rerank("q", candidates, &reranker, &cfg, 0.0, None)
            .await
            .unwrap();
        assert_eq!(outcome.nucleus.id, "b");
        assert!(!outcome.reranker_fallback);
    }

    #[tokio::test]
    async fn all_distinct_documents_falls_back_to_top_score() {
        let cfg = Config::default();
        let candidates = vec![chunk("a", "d1"), chunk("b", "d2"), chunk("c", "d3")];
        let reranker = FakeReranker {
            scores: vec![0.4, 0.9, 0.2],
        };
        let outcome = consensus_rerank("q", candidates, &reranker, &cfg, 0.0, None)
            .await
            .unwrap();
        assert_eq!(outcome.nucleus.id, "b");
    }

    #[tokio::test]
    async fn ties_break_on_chunk_id() {
        let cfg = Config::default();
        let candidates = vec![chunk("z", "d1"), chunk("a", "d1")];
        let reranker = FakeReranker {
            scores: vec![0.5, 0.5],
        };
        let outcome = consensus_rerank("q", candidates, &reranker, &cfg, 0.0, None)
            .await
            .unwrap();
        assert_eq!(outcome.nucleus.id, "a");
    }

    #[tokio::test]
    async fn reranker_failure_falls_back_to_vector_top1() {
        let cfg = Config::default();
        let candidates = vec![chunk("first", "d1"), chunk("second", "d2")];
        let outcome = consensus_rerank("q", candidates, &FailingReranker, &cfg, 0.0, None)
            .await
            .unwrap();
        assert_eq!(outcome.nucleus.id, "first");
        assert!(outcome.reranker_fallback);
    }

    #[tokio::test]
    async fn router_trust_short_circuits_cross_encoder_disagreement() {
        let cfg = Config::default();
        let candidates = vec![chunk("a", "d1"), chunk("b", "d2")];
        // Cross-encoder prefers d2's chunk, but router trusts d1.
        let reranker = FakeReranker {
            scores: vec![0.3, 0.9],
        };
        let target = DocumentId::from("d1");
        let outcome = consensus_rerank("q", candidates, &reranker, &cfg, 0.9, Some(&target))
            .await
            .unwrap();
        assert_eq!(outcome.nucleus.document_id, target);
        assert!(outcome.router_trusted);
    }

    #[tokio::test]
    async fn empty_candidates_returns_none() {
        let cfg = Config::default();
        let reranker = FakeReranker { scores: vec![] };
        let outcome = consensus_rerank("q", Vec::new(), &reranker, &cfg, 0.0, None).await;
        assert!(outcome.is_none());
    }
}
