//! Router: resolves a query to `(collection, confidence level, optional
//! metadata filter)`.
//!
//! Pure function of `(query, question index, session routing memory)` plus
//! one embedding call. Grounded on `smart_router.py::route_query`'s
//! threshold ladder (0.85 / 0.50) and `rag_engine.py`'s
//! `OptimizedChatSession.should_override_confidence` override algorithm,
//! which now lives on `Session` itself (`core::session`); this module only
//! asks the session whether to apply it.

use crate::config::Config;
use crate::core::{DocumentId, Session, SmartFilter};
use crate::embedding::{EmbeddingOracle, cosine_similarity};
use crate::error::OracleError;
use crate::question_index::QuestionIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Coarse classification of a routing decision's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// Raw score at or above the high threshold (default 0.85).
    High,
    /// Raw score in `[low_medium_threshold, high_threshold)`.
    LowMedium,
    /// Raw score below the low-medium threshold.
    Low,
    /// `High`, but reached by session-override promotion from a raw
    /// `Low`/`LowMedium` score.
    OverrideHigh,
    /// `LowMedium`, but reached by session-override promotion.
    OverrideMedium,
}

impl ConfidenceLevel {
    /// `true` for `High` or either override variant — the levels the
    /// coordinator treats as admissible for direct vector search without
    /// invoking the clarification engine.
    #[must_use]
    pub const fn is_admissible(self) -> bool {
        !matches!(self, Self::Low)
    }

    /// `true` for either `*High` variant.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High | Self::OverrideHigh)
    }
}

fn classify(score: f32, cfg: &Config) -> ConfidenceLevel {
    if score >= cfg.router_high_threshold {
        ConfidenceLevel::High
    } else if score >= cfg.router_low_medium_threshold {
        ConfidenceLevel::LowMedium
    } else {
        ConfidenceLevel::Low
    }
}

/// Resolution of a query to a collection, with diagnostics.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Target collection, or `None` if the question index had nothing to
    /// compare against.
    pub collection_id: Option<String>,
    /// Effective confidence (post-override, if any).
    pub confidence: f32,
    /// Effective confidence level (post-override, if any).
    pub level: ConfidenceLevel,
    /// Raw confidence before any session-override promotion.
    pub raw_confidence: f32,
    /// Inferred metadata filter from the winning example question's smart
    /// filter, when the level is admissible.
    pub filter: Option<SmartFilter>,
    /// Text of the best-matching example question, for diagnostics and
    /// clarification fallbacks.
    pub best_question_text: Option<String>,
    /// Document id owning the best-matching example question.
    pub best_document_id: Option<DocumentId>,
    /// `true` if session routing memory promoted this decision.
    pub was_overridden: bool,
}

impl RoutingDecision {
    fn no_match() -> Self {
        Self {
            collection_id: None,
            confidence: 0.0,
            level: ConfidenceLevel::Low,
            raw_confidence: 0.0,
            filter: None,
            best_question_text: None,
            best_document_id: None,
            was_overridden: false,
        }
    }
}

/// Routes `query` against `index`, optionally consulting `session` for an
/// override.
///
/// # Errors
///
/// Returns `OracleError::Embedding` if the embedding oracle fails.
pub async fn route(
    query: &str,
    index: &QuestionIndex,
    session: Option<&Session>,
    oracle: &dyn EmbeddingOracle,
    cfg: &Config,
) -> Result<RoutingDecision, OracleError> {
    if index.is_empty() {
        info!("question index empty for all collections, returning low-confidence no-match");
        return Ok(RoutingDecision::no_match());
    }

    let embeddings = oracle.embed(&[query.to_string()]).await?;
    let query_embedding = embeddings.into_iter().next().unwrap_or_default();

    let mut best_collection: Option<String> = None;
    let mut best_score = f32::MIN;
    let mut best_question_text = None;
    let mut best_document_id = None;
    let mut best_filter = None;

    for collection_id in index.collection_ids() {
        for entry in index.collection(collection_id) {
            let score = cosine_similarity(&query_embedding, &entry.embedding);
            if score > best_score {
                best_score = score;
                best_collection = Some(collection_id.clone());
                best_question_text = Some(entry.question.text.clone());
                best_document_id = Some(entry.question.document_id.clone());
                best_filter = entry.question.smart_filter.clone();
            }
        }
    }

    let raw_score = best_score.max(0.0);
    let raw_level = classify(raw_score, cfg);
    debug!(score = raw_score, collection = ?best_collection, "router raw decision");

    let (level, confidence, collection_id, was_overridden) = apply_override(
        session,
        raw_level,
        raw_score,
        best_collection.clone(),
        cfg,
    );

    Ok(RoutingDecision {
        collection_id,
        confidence,
        level,
        raw_confidence: raw_score,
        filter: best_filter,
        best_question_text,
        best_document_id,
        was_overridden,
    })
}

/// Applies the session-override law (§4.7): a recent, strong routing
/// memory promotes a marginal new decision rather than letting it fall
/// through to clarification.
fn apply_override(
    session: Option<&Session>,
    raw_level: ConfidenceLevel,
    raw_score: f32,
    raw_collection: Option<String>,
    cfg: &Config,
) -> (ConfidenceLevel, f32, Option<String>, bool) {
    let Some(session) = session else {
        return (raw_level, raw_score, raw_collection, false);
    };
    if raw_level.is_high() {
        return (raw_level, raw_score, raw_collection, false);
    }
    if !session.should_override_confidence(raw_score, cfg) {
        return (raw_level, raw_score, raw_collection, false);
    }
    // should_override_confidence already checked recency/floor/gate; the
    // memory itself is guaranteed present at this point.
    let Some(memory) = &session.routing_memory else {
        return (raw_level, raw_score, raw_collection, false);
    };
    let overridden_level = match raw_level {
        ConfidenceLevel::LowMedium => ConfidenceLevel::OverrideMedium,
        _ => ConfidenceLevel::OverrideHigh,
    };
    info!(
        collection = %memory.collection_id,
        raw_score,
        "session override promoted routing decision"
    );
    (
        overridden_level,
        cfg.override_effective_confidence,
        Some(memory.collection_id.clone()),
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DocumentId, ExampleQuestion};
    use crate::error::OracleError;
    use async_trait::async_trait;

    struct FakeOracle {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingOracle for FakeOracle {
        fn dimensions(&self) -> usize {
            self.vector.len()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OracleError> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    async fn build_index() -> QuestionIndex {
        struct BuildOracle;
        #[async_trait]
        impl EmbeddingOracle for BuildOracle {
            fn dimensions(&self) -> usize {
                2
            }
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OracleError> {
                Ok(texts
                    .iter()
                    .map(|t| {
                        if t.contains("khai sinh") {
                            vec![1.0, 0.0]
                        } else if t.contains("kết hôn") {
                            vec![0.0, 1.0]
                        } else {
                            vec![0.5, 0.5]
                        }
                    })
                    .collect())
            }
        }
        let questions = vec![
            ExampleQuestion::main(
                "Đăng ký khai sinh cần giấy tờ gì?",
                DocumentId::from("doc-khai-sinh"),
                "ho_tich_cap_xa",
            )
            .with_filter(SmartFilter {
                exact_title: Some("Đăng ký khai sinh".to_string()),
                ..Default::default()
            }),
            ExampleQuestion::main(
                "Đăng ký kết hôn cần gì?",
                DocumentId::from("doc-ket-hon"),
                "ho_tich_cap_xa",
            ),
        ];
        QuestionIndex::build(questions, &BuildOracle).await.unwrap()
    }

    #[tokio::test]
    async fn exact_query_routes_high_with_exact_title_filter() {
        let index = build_index().await;
        let cfg = Config::default();
        let oracle = FakeOracle { vector: vec![1.0, 0.0] };
        let decision = route("Đăng ký khai sinh cần giấy tờ gì?", &index, None, &oracle, &cfg)
            .await
            .unwrap();
        assert_eq!(decision.collection_id.as_deref(), Some("ho_tich_cap_xa"));
        assert!(matches!(decision.level, ConfidenceLevel::High));
        assert_eq!(
            decision.filter.unwrap().exact_title.as_deref(),
            Some("Đăng ký khai sinh")
        );
    }

    #[tokio::test]
    async fn ambiguous_query_routes_low() {
        let index = build_index().await;
        let cfg = Config::default();
        let oracle = FakeOracle { vector: vec![0.3, 0.3] };
        let decision = route("câu hỏi mơ hồ", &index, None, &oracle, &cfg)
            .await
            .unwrap();
        assert!(matches!(decision.level, ConfidenceLevel::Low));
    }

    #[tokio::test]
    async fn empty_index_returns_low_confidence_no_target() {
        let index = QuestionIndex::default();
        let cfg = Config::default();
        let oracle = FakeOracle { vector: vec![1.0, 0.0] };
        let decision = route("bất kỳ", &index, None, &oracle, &cfg).await.unwrap();
        assert!(decision.collection_id.is_none());
        assert!(matches!(decision.level, ConfidenceLevel::Low));
    }

    #[tokio::test]
    async fn adding_irrelevant_collection_does_not_change_decision() {
        let mut index = build_index().await;
        let cfg = Config::default();
        let oracle = FakeOracle { vector: vec![1.0, 0.0] };
        let before = route("Đăng ký khai sinh cần giấy tờ gì?", &index, None, &oracle, &cfg)
            .await
            .unwrap();

        // An empty collection contributes no entries to iterate.
        index.ensure_collection("empty_collection");
        let after = route("Đăng ký khai sinh cần giấy tờ gì?", &index, None, &oracle, &cfg)
            .await
            .unwrap();
        assert_eq!(before.collection_id, after.collection_id);
        assert!((before.confidence - after.confidence).abs() < 1e-6);
    }

    #[tokio::test]
    async fn session_override_promotes_low_medium_to_override_high() {
        let index = build_index().await;
        let cfg = Config::default();
        let mut session = Session::new("s1");
        session.update_successful_routing("ho_tich_cap_xa", 0.9, None);
        let oracle = FakeOracle { vector: vec![0.55, 0.55] };
        let decision = route("Phí bao nhiêu?", &index, Some(&session), &oracle, &cfg)
            .await
            .unwrap();
        assert!(decision.was_overridden);
        assert_eq!(decision.collection_id.as_deref(), Some("ho_tich_cap_xa"));
        assert!(matches!(
            decision.level,
            ConfidenceLevel::OverrideHigh | ConfidenceLevel::OverrideMedium
        ));
    }
}
