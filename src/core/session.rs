//! Session: a conversation handle carrying bounded history and routing
//! memory across turns.
//!
//! The override law and low-confidence streak here are grounded directly on
//! the source system's chat-session bookkeeping: a prior successful routing
//! decision is trusted over a new, weaker one only while it is both recent
//! and was itself confident.

use crate::config::Config;
use crate::core::document::DocumentId;
use crate::core::question::SmartFilter;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

/// One completed turn, kept for the bounded chat history passed to the
/// generator.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The user's query text.
    pub query: String,
    /// A short summary of the answer (or clarification) produced.
    pub summary: String,
}

/// The session's memory of its last successful routing decision.
#[derive(Debug, Clone)]
pub struct RoutingMemory {
    /// The collection that answered successfully.
    pub collection_id: String,
    /// The raw confidence of that decision (never the overridden value).
    pub confidence: f32,
    /// When the decision was recorded.
    pub timestamp: Instant,
    /// The metadata filter that produced the successful turn, if any.
    pub filter: Option<SmartFilter>,
}

/// Stage of the multi-turn clarification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClarificationStage {
    /// No clarification in progress.
    Idle,
    /// Waiting for the user to pick a collection.
    AwaitingCollection,
    /// Waiting for the user to pick a document within a chosen collection.
    AwaitingDocument,
    /// Waiting for the user to pick an example question of a chosen
    /// document.
    AwaitingQuestion,
}

/// A candidate offered in a clarification payload, retained on the session
/// so a later structured choice (an option id) can be resolved back to its
/// collection/document/question without re-running retrieval.
#[derive(Debug, Clone)]
pub struct ClarificationCandidate {
    /// The option id the user will echo back.
    pub option_id: String,
    /// The collection this candidate refers to, if any.
    pub collection_id: Option<String>,
    /// The document this candidate refers to, if any.
    pub document_id: Option<DocumentId>,
    /// The example question text this candidate refers to, if any.
    pub question_text: Option<String>,
}

/// Collection/document context preserved when the user sends
/// `manual_input` from an awaiting clarification stage (§4.2): the next
/// free-form query bypasses the router entirely and is scoped to this
/// filter. Distinct from `RoutingMemory`, which only ever influences the
/// override *promotion* (§4.7) and never forces a bypass of the router by
/// itself.
#[derive(Debug, Clone)]
pub struct PreservedFilter {
    /// Collection chosen so far, if the user advanced past
    /// `AwaitingCollection` before bailing to manual input.
    pub collection_id: Option<String>,
    /// Document chosen so far, if the user advanced past
    /// `AwaitingDocument` before bailing to manual input.
    pub document_id: Option<DocumentId>,
}

/// The session's pending clarification, if a turn is mid-state-machine.
#[derive(Debug, Clone)]
pub struct ClarificationState {
    /// Current stage.
    pub stage: ClarificationStage,
    /// Collection chosen so far, if the stage has advanced past
    /// `AwaitingCollection`.
    pub collection_id: Option<String>,
    /// Document chosen so far, if the stage has advanced past
    /// `AwaitingDocument`.
    pub document_id: Option<DocumentId>,
    /// The candidates most recently offered to the user.
    pub candidates: Vec<ClarificationCandidate>,
}

impl ClarificationState {
    /// A fresh `awaiting_collection` state with the given candidates.
    #[must_use]
    pub fn awaiting_collection(candidates: Vec<ClarificationCandidate>) -> Self {
        Self {
            stage: ClarificationStage::AwaitingCollection,
            collection_id: None,
            document_id: None,
            candidates,
        }
    }
}

/// A conversation handle: bounded history plus routing memory.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id.
    pub id: String,
    /// Creation time.
    pub created_at: Instant,
    /// Last access time, updated on every turn.
    pub last_accessed: Instant,
    /// Bounded query history, most recent last.
    pub history: VecDeque<HistoryEntry>,
    /// Memory of the last successful routing decision.
    pub routing_memory: Option<RoutingMemory>,
    /// Consecutive `low`-level routing outcomes since the memory was last
    /// set or cleared.
    pub consecutive_low_confidence_count: u32,
    /// Pending clarification state machine position, if mid-flow.
    pub pending_clarification: Option<ClarificationState>,
    /// Collection/document context preserved by a `manual_input` choice,
    /// consumed by the next turn's forced bypass (§4.2, §4.6 step 1).
    pub preserved_filter: Option<PreservedFilter>,
}

impl Session {
    /// Creates a new, empty session.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            id: id.into(),
            created_at: now,
            last_accessed: now,
            history: VecDeque::new(),
            routing_memory: None,
            consecutive_low_confidence_count: 0,
            pending_clarification: None,
            preserved_filter: None,
        }
    }

    /// Updates `last_accessed` to now.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    /// Appends a completed turn, trimming to `max_history` entries.
    pub fn record_turn(&mut self, query: impl Into<String>, summary: impl Into<String>, max_history: usize) {
        self.history.push_back(HistoryEntry {
            query: query.into(),
            summary: summary.into(),
        });
        while self.history.len() > max_history {
            self.history.pop_front();
        }
    }

    /// Records a successful routing decision, resetting the low-confidence
    /// streak. Called only after a turn clears the coordinator's
    /// `routing_memory_update_floor`.
    pub fn update_successful_routing(
        &mut self,
        collection_id: impl Into<String>,
        confidence: f32,
        filter: Option<SmartFilter>,
    ) {
        self.routing_memory = Some(RoutingMemory {
            collection_id: collection_id.into(),
            confidence,
            timestamp: Instant::now(),
            filter,
        });
        self.consecutive_low_confidence_count = 0;
    }

    /// Whether a new raw confidence `current_confidence` should be
    /// overridden by this session's routing memory.
    ///
    /// `true` iff: memory exists; its timestamp is within the freshness
    /// window; `current_confidence` is below the very-high gate; and the
    /// memorized confidence is at least the minimum-context floor. This
    /// encodes "don't disturb a strong prior with a mediocre new signal".
    #[must_use]
    pub fn should_override_confidence(&self, current_confidence: f32, cfg: &Config) -> bool {
        let Some(memory) = &self.routing_memory else {
            return false;
        };
        if memory.timestamp.elapsed() > cfg.override_freshness_window {
            return false;
        }
        current_confidence < cfg.override_very_high_gate
            && memory.confidence >= cfg.override_min_context_floor
    }

    /// Increments the low-confidence streak counter. If it reaches the
    /// configured limit, clears routing memory (topic change assumed) and
    /// returns `true`.
    pub fn increment_low_confidence(&mut self, cfg: &Config) -> bool {
        self.consecutive_low_confidence_count += 1;
        if self.consecutive_low_confidence_count >= cfg.low_confidence_streak_limit {
            self.clear_routing_state();
            true
        } else {
            false
        }
    }

    /// Clears routing memory and the low-confidence streak.
    pub fn clear_routing_state(&mut self) {
        self.routing_memory = None;
        self.consecutive_low_confidence_count = 0;
    }

    /// `true` if the session has been idle longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.last_accessed.elapsed() > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_session_never_overrides() {
        let session = Session::new("s1");
        let cfg = Config::default();
        assert!(!session.should_override_confidence(0.1, &cfg));
    }

    #[test]
    fn override_requires_fresh_and_strong_memory() {
        let mut session = Session::new("s1");
        let cfg = Config::default();
        session.update_successful_routing("c1", 0.9, None);
        assert!(session.should_override_confidence(0.5, &cfg));
        // At or above the very-high gate, never overridden.
        assert!(!session.should_override_confidence(0.9, &cfg));
    }

    #[test]
    fn override_is_monotone_nonincreasing_in_current_confidence() {
        let mut session = Session::new("s1");
        let cfg = Config::default();
        session.update_successful_routing("c1", 0.9, None);
        let low = session.should_override_confidence(0.1, &cfg);
        let high = session.should_override_confidence(0.81, &cfg);
        // A lower new confidence is at least as likely to be overridden.
        assert!(low || !high);
        assert!(!session.should_override_confidence(0.82, &cfg));
    }

    #[test]
    fn override_requires_memorized_confidence_floor() {
        let mut session = Session::new("s1");
        let cfg = Config::default();
        session.update_successful_routing("c1", 0.70, None);
        assert!(!session.should_override_confidence(0.5, &cfg));
    }

    #[test]
    fn stale_memory_never_overrides() {
        let mut session = Session::new("s1");
        let cfg = Config::default();
        session.update_successful_routing("c1", 0.9, None);
        if let Some(memory) = session.routing_memory.as_mut() {
            memory.timestamp = Instant::now() - Duration::from_secs(700);
        }
        assert!(!session.should_override_confidence(0.1, &cfg));
    }

    #[test]
    fn three_consecutive_low_clears_memory() {
        let mut session = Session::new("s1");
        let cfg = Config::default();
        session.update_successful_routing("c1", 0.9, None);
        assert!(!session.increment_low_confidence(&cfg));
        assert!(!session.increment_low_confidence(&cfg));
        assert!(session.routing_memory.is_some());
        assert!(session.increment_low_confidence(&cfg));
        assert!(session.routing_memory.is_none());
        assert_eq!(session.consecutive_low_confidence_count, 0);
    }

    #[test]
    fn history_bounded_to_max() {
        let mut session = Session::new("s1");
        for i in 0..10 {
            session.record_turn(format!("q{i}"), "answer", 5);
        }
        assert_eq!(session.history.len(), 5);
        assert_eq!(session.history.front().unwrap().query, "q5");
    }
}
