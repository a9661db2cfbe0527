//! Runtime configuration.
//!
//! Collects every tunable threshold named in the component design into one
//! `Config` struct so none of it is hardcoded in the router, coordinator, or
//! session store. Defaults match the values the design specifies; two of
//! them were left as open questions in the source material and are pinned
//! here (see the field docs on `combined_confidence_floor` and
//! `session_ttl`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide configuration for the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Router: raw score at or above which a decision is `high` confidence.
    pub router_high_threshold: f32,
    /// Router: raw score at or above which a decision is `low-medium`.
    /// Below this, the decision is `low` and clarification is triggered.
    pub router_low_medium_threshold: f32,

    /// Session override: very-high confidence gate. A new raw confidence at
    /// or above this value is never overridden.
    pub override_very_high_gate: f32,
    /// Session override: the memorized confidence must be at least this to
    /// be eligible to override a new, weaker decision.
    pub override_min_context_floor: f32,
    /// Session override: routing memory older than this is never used for
    /// an override.
    pub override_freshness_window: Duration,
    /// Session override: confidence substituted for the overridden decision.
    pub override_effective_confidence: f32,
    /// Number of consecutive `low` outcomes after which routing memory is
    /// cleared.
    pub low_confidence_streak_limit: u32,

    /// Vector search: default similarity floor.
    pub similarity_threshold: f32,
    /// Vector search: default candidate count before dynamic adjustment.
    pub default_top_k: usize,
    /// Vector search: minimum allowed `k` after dynamic adjustment.
    pub min_top_k: usize,
    /// Vector search: maximum allowed `k` after dynamic adjustment.
    pub max_top_k: usize,
    /// Vector search: fraction `k` shrinks by on `high` confidence.
    pub high_confidence_k_shrink: f32,
    /// Vector search: fraction `k` grows by on `low-medium` confidence.
    pub low_medium_k_grow: f32,
    /// Vector search: fraction the similarity floor is multiplied by when a
    /// metadata filter is present.
    pub filtered_threshold_factor: f32,

    /// Consensus reranker: number of top candidates considered.
    pub consensus_top_m: usize,
    /// Consensus reranker: minimum consensus ratio required to pin a
    /// document as the nucleus owner.
    pub consensus_threshold: f32,
    /// Consensus reranker: router confidence at or above which its named
    /// target document is trusted over the cross-encoder.
    pub router_trust_threshold: f32,

    /// Context expander: character budget for the assembled block.
    pub context_char_budget: usize,

    /// Coordinator: weight of router confidence in combined confidence.
    pub combined_confidence_router_weight: f32,
    /// Coordinator: weight of the top rerank score in combined confidence.
    pub combined_confidence_rerank_weight: f32,
    /// Coordinator: combined confidence below which mid-confidence
    /// clarification is triggered. Kept distinct from
    /// `router_low_medium_threshold` per the open question in the design
    /// notes: the two floors are independently configurable, defaulting to
    /// the values given there (0.50 and 0.30 respectively).
    pub combined_confidence_floor: f32,
    /// Coordinator: raw routing confidence at or above which routing memory
    /// is updated after a successful turn.
    pub routing_memory_update_floor: f32,
    /// Coordinator: per-turn deadline.
    pub turn_deadline: Duration,
    /// Coordinator: maximum bounded chat history entries included in the
    /// generator prompt.
    pub max_prompt_history_turns: usize,

    /// Session store: bounded query history length.
    pub max_session_history: usize,
    /// Session store: idle eviction TTL. The source material gave two
    /// inconsistent defaults (1 hour and 24 hours); this pins the shorter
    /// one and leaves it configurable.
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router_high_threshold: 0.85,
            router_low_medium_threshold: 0.50,

            override_very_high_gate: 0.82,
            override_min_context_floor: 0.78,
            override_freshness_window: Duration::from_secs(600),
            override_effective_confidence: 0.85,
            low_confidence_streak_limit: 3,

            similarity_threshold: 0.3,
            default_top_k: 10,
            min_top_k: 8,
            max_top_k: 15,
            high_confidence_k_shrink: 0.30,
            low_medium_k_grow: 0.25,
            filtered_threshold_factor: 0.5,

            consensus_top_m: 5,
            consensus_threshold: 0.6,
            router_trust_threshold: 0.85,

            context_char_budget: 8000,

            combined_confidence_router_weight: 0.4,
            combined_confidence_rerank_weight: 0.6,
            combined_confidence_floor: 0.30,
            routing_memory_update_floor: 0.78,
            turn_deadline: Duration::from_secs(30),
            max_prompt_history_turns: 2,

            max_session_history: 5,
            session_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Clamped `k` for the given confidence level, starting from
    /// `default_top_k` and applying the configured shrink/grow factors,
    /// bounded to `[min_top_k, max_top_k]`.
    #[must_use]
    pub fn dynamic_top_k(&self, level: crate::router::ConfidenceLevel) -> usize {
        use crate::router::ConfidenceLevel::{
            High, Low, LowMedium, OverrideHigh, OverrideMedium,
        };
        let base = self.default_top_k as f32;
        #[allow(clippy::cast_precision_loss)]
        let raw = match level {
            High | OverrideHigh => base * (1.0 - self.high_confidence_k_shrink),
            LowMedium | OverrideMedium => base * (1.0 + self.low_medium_k_grow),
            Low => base,
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let k = raw.round() as usize;
        k.clamp(self.min_top_k, self.max_top_k)
    }

    /// Similarity floor for a search, halved when a metadata filter is in
    /// play.
    #[must_use]
    pub fn adaptive_threshold(&self, has_filter: bool) -> f32 {
        if has_filter {
            self.similarity_threshold * self.filtered_threshold_factor
        } else {
            self.similarity_threshold
        }
    }

    /// Weighted mix of router confidence and top rerank score.
    #[must_use]
    pub fn combined_confidence(&self, router_score: f32, top_rerank_score: f32) -> f32 {
        self.combined_confidence_router_weight * router_score
            + self.combined_confidence_rerank_weight * top_rerank_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ConfidenceLevel;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert!((cfg.router_high_threshold - 0.85).abs() < f32::EPSILON);
        assert!((cfg.router_low_medium_threshold - 0.50).abs() < f32::EPSILON);
        assert!((cfg.combined_confidence_floor - 0.30).abs() < f32::EPSILON);
        assert_eq!(cfg.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn dynamic_top_k_bounds() {
        let cfg = Config::default();
        assert!(cfg.dynamic_top_k(ConfidenceLevel::High) >= cfg.min_top_k);
        assert!(cfg.dynamic_top_k(ConfidenceLevel::LowMedium) <= cfg.max_top_k);
        assert_eq!(cfg.dynamic_top_k(ConfidenceLevel::Low), cfg.default_top_k);
    }

    #[test]
    fn dynamic_top_k_shrinks_and_grows() {
        let cfg = Config::default();
        let high_k = cfg.dynamic_top_k(ConfidenceLevel::High);
        let low_medium_k = cfg.dynamic_top_k(ConfidenceLevel::LowMedium);
        assert!(high_k < cfg.default_top_k);
        assert!(low_medium_k > cfg.default_top_k || low_medium_k == cfg.max_top_k);
    }

    #[test]
    fn adaptive_threshold_halves_with_filter() {
        let cfg = Config::default();
        assert!((cfg.adaptive_threshold(true) - 0.15).abs() < 1e-6);
        assert!((cfg.adaptive_threshold(false) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn combined_confidence_weighted() {
        let cfg = Config::default();
        let c = cfg.combined_confidence(1.0, 0.0);
        assert!((c - 0.4).abs() < 1e-6);
        let c = cfg.combined_confidence(0.0, 1.0);
        assert!((c - 0.6).abs() < 1e-6);
    }
}
