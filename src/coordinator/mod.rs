//! Retrieval coordinator: the single entry point for a conversational turn.
//!
//! Orchestrates router → vector search → rerank → context expansion →
//! generator, owns VRAM-sequencing hints, and drives the clarification
//! state machine when routing or combined confidence is insufficient.
//! Grounded on `rag_engine.py::enhanced_query`'s ten-ish-step turn
//! algorithm: forced-collection branch, dynamic-k, adaptive threshold,
//! VRAM unload ordering, and the combined-confidence gate.

use crate::clarification::{
    self, ClarificationAction, ClarificationPayload, CollectionCandidate,
    confirm_with_suggestion_payload, low_confidence_payload,
};
use crate::config::Config;
use crate::context::{self, DocumentLoader};
use crate::core::document::DocumentId;
use crate::core::question::SmartFilter;
use crate::embedding::EmbeddingOracle;
use crate::error::{ContextError, Error, OracleError, Result};
use crate::generator::{self, GeneratorOracle};
use crate::question_index::QuestionIndex;
use crate::rerank::{self, RerankerOracle};
use crate::router::{self, ConfidenceLevel, RoutingDecision};
use crate::session_store::SessionStore;
use crate::vector::{self, Filter, VectorIndex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Diagnostics about how a turn was routed and reranked, returned
/// alongside every answer/clarification for observability.
#[derive(Debug, Clone)]
pub struct RoutingInfo {
    /// Collection the turn was ultimately served from, if any.
    pub collection_id: Option<String>,
    /// Effective confidence (post-override).
    pub confidence: f32,
    /// Effective confidence level.
    pub level: ConfidenceLevel,
    /// `true` if session routing memory promoted this decision.
    pub was_overridden: bool,
}

/// Diagnostics about context expansion and rerank fallback behavior.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    /// Document id the context was expanded from.
    pub document_id: DocumentId,
    /// `true` if the assembled context block was truncated.
    pub truncated: bool,
    /// `true` if the reranker failed and vector-search top-1 was used.
    pub reranker_fallback: bool,
    /// `true` if the router-trust short-circuit selected the nucleus.
    pub router_trusted: bool,
}

/// The coordinator's response to a turn.
#[derive(Debug, Clone)]
pub enum Response {
    /// A grounded answer.
    Answer {
        /// Generated answer text.
        answer: String,
        /// Context diagnostics.
        context_info: ContextInfo,
        /// Routing diagnostics.
        routing_info: RoutingInfo,
        /// Session id this turn was served under.
        session_id: String,
        /// Wall-clock processing time.
        processing_time: Duration,
    },
    /// Routing or combined confidence was too low to answer directly.
    ClarificationNeeded {
        /// The clarification payload.
        clarification: ClarificationPayload,
        /// Session id.
        session_id: String,
        /// Wall-clock processing time.
        processing_time: Duration,
    },
    /// Vector search returned zero candidates above threshold.
    NoResults {
        /// User-visible message.
        message: String,
        /// Session id.
        session_id: String,
    },
    /// A non-fatal error occurred; the session was not mutated.
    ErrorResponse {
        /// Description of the error.
        error: String,
        /// Session id.
        session_id: String,
    },
}

/// A choice the user made in response to a prior clarification payload.
#[derive(Debug, Clone)]
pub struct SelectedOption {
    /// Echoed option id.
    pub option_id: String,
    /// The action tag carried by that option.
    pub action: ClarificationAction,
}

/// Everything the coordinator needs to serve turns. Constructed once at
/// startup; the three oracle fields and the vector index are the external
/// collaborators per spec.md §6.
pub struct RetrievalCoordinator {
    config: Config,
    question_index: QuestionIndex,
    sessions: SessionStore,
    embedding: Arc<dyn EmbeddingOracle>,
    vector_index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn RerankerOracle>,
    generator: Arc<dyn GeneratorOracle>,
    document_loader: Arc<dyn DocumentLoader>,
}

impl RetrievalCoordinator {
    /// Builds a coordinator from its external collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        question_index: QuestionIndex,
        embedding: Arc<dyn EmbeddingOracle>,
        vector_index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn RerankerOracle>,
        generator: Arc<dyn GeneratorOracle>,
        document_loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        Self {
            config,
            question_index,
            sessions: SessionStore::new(),
            embedding,
            vector_index,
            reranker,
            generator,
            document_loader,
        }
    }

    /// Allocates a brand-new session, returning its id.
    pub fn new_session(&self, id: impl Into<String>) -> String {
        let id = id.into();
        self.sessions.allocate(id.clone());
        id
    }

    /// Clears a session's history, routing memory, and pending
    /// clarification, without removing it from the store.
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionMissing` if `session_id` is unknown.
    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        let Some(session) = self.sessions.fetch(session_id) else {
            return Err(Error::SessionMissing {
                session_id: session_id.to_string(),
            });
        };
        let mut guard = session.lock().await;
        *guard = crate::core::Session::new(session_id);
        Ok(())
    }

    /// Runs one conversational turn.
    pub async fn query(
        &self,
        text: &str,
        session_id: Option<&str>,
        forced_collection: Option<&str>,
        forced_document_title: Option<&str>,
    ) -> Response {
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid_like_id());
        let session_handle = self
            .sessions
            .get_or_create(&session_id, self.config.session_ttl);

        let deadline = self.config.turn_deadline;
        match tokio::time::timeout(
            deadline,
            self.run_turn(text, &session_id, session_handle, forced_collection, forced_document_title),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => Response::ErrorResponse {
                error: OracleError::DeadlineExceeded {
                    elapsed_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                }
                .to_string(),
                session_id,
            },
        }
    }

    /// Applies a structured clarification choice and re-enters the
    /// pipeline as appropriate.
    pub async fn clarify(
        &self,
        session_id: &str,
        selected: SelectedOption,
        original_query: &str,
    ) -> Response {
        let Some(session_handle) = self.sessions.fetch(session_id) else {
            return Response::ErrorResponse {
                error: Error::SessionMissing {
                    session_id: session_id.to_string(),
                }
                .to_string(),
                session_id: session_id.to_string(),
            };
        };

        let mut session = session_handle.lock().await;
        session.touch();

        let candidate = session
            .pending_clarification
            .as_ref()
            .and_then(|state| {
                state
                    .candidates
                    .iter()
                    .find(|c| c.option_id == selected.option_id)
                    .cloned()
            });

        match selected.action {
            ClarificationAction::ManualInput => {
                clarification::apply_manual_input(&mut session);
                drop(session);
                self.query(original_query, Some(session_id), None, None).await
            }
            ClarificationAction::ProceedWithCollection => {
                let Some(candidate) = candidate else {
                    return missing_candidate_response(session_id);
                };
                let Some(collection_id) = candidate.collection_id else {
                    return missing_candidate_response(session_id);
                };
                let documents = self.document_candidates(&collection_id);
                let (payload, state) =
                    crate::clarification::document_selection_payload(&collection_id, documents);
                session.pending_clarification = Some(state);
                let elapsed = Duration::default();
                Response::ClarificationNeeded {
                    clarification: payload,
                    session_id: session_id.to_string(),
                    processing_time: elapsed,
                }
            }
            ClarificationAction::ProceedWithDocument => {
                let Some(candidate) = candidate else {
                    return missing_candidate_response(session_id);
                };
                let (Some(collection_id), Some(document_id)) =
                    (candidate.collection_id, candidate.document_id)
                else {
                    return missing_candidate_response(session_id);
                };
                let questions = self.question_candidates(&collection_id, &document_id);
                let (payload, state) = crate::clarification::question_selection_payload(
                    &collection_id,
                    &document_id,
                    &questions,
                );
                session.pending_clarification = Some(state);
                Response::ClarificationNeeded {
                    clarification: payload,
                    session_id: session_id.to_string(),
                    processing_time: Duration::default(),
                }
            }
            ClarificationAction::ProceedWithQuestion => {
                let Some(candidate) = candidate else {
                    return missing_candidate_response(session_id);
                };
                let question_text = candidate
                    .question_text
                    .clone()
                    .unwrap_or_else(|| original_query.to_string());
                let collection_id = candidate.collection_id.clone();
                let document_title = self.document_title_for(
                    collection_id.as_deref(),
                    candidate.document_id.as_ref(),
                );
                session.pending_clarification = None;
                drop(session);
                self.query(
                    &question_text,
                    Some(session_id),
                    collection_id.as_deref(),
                    document_title.as_deref(),
                )
                .await
            }
        }
    }

    fn document_candidates(&self, collection_id: &str) -> Vec<clarification::DocumentCandidate> {
        let mut by_document: std::collections::HashMap<DocumentId, (String, usize)> =
            std::collections::HashMap::new();
        for entry in self.question_index.collection(collection_id) {
            let e = by_document
                .entry(entry.question.document_id.clone())
                .or_insert_with(|| (String::new(), 0));
            e.1 += 1;
            if let Some(filter) = &entry.question.smart_filter
                && let Some(title) = &filter.exact_title
            {
                e.0 = title.clone();
            }
        }
        by_document
            .into_iter()
            .map(|(id, (title, count))| clarification::DocumentCandidate {
                title: if title.is_empty() { id.to_string() } else { title },
                id,
                question_count: count,
            })
            .collect()
    }

    fn question_candidates(
        &self,
        collection_id: &str,
        document_id: &DocumentId,
    ) -> Vec<crate::core::ExampleQuestion> {
        self.question_index
            .collection(collection_id)
            .iter()
            .filter(|e| &e.question.document_id == document_id)
            .map(|e| e.question.clone())
            .collect()
    }

    fn document_title_for(
        &self,
        collection_id: Option<&str>,
        document_id: Option<&DocumentId>,
    ) -> Option<String> {
        let collection_id = collection_id?;
        let document_id = document_id?;
        self.question_index
            .collection(collection_id)
            .iter()
            .find(|e| &e.question.document_id == document_id)
            .and_then(|e| e.question.smart_filter.as_ref())
            .and_then(|f| f.exact_title.clone())
    }

    #[allow(clippy::too_many_lines)]
    async fn run_turn(
        &self,
        text: &str,
        session_id: &str,
        session_handle: Arc<tokio::sync::Mutex<crate::core::Session>>,
        forced_collection: Option<&str>,
        forced_document_title: Option<&str>,
    ) -> Response {
        let started = Instant::now();
        let mut session = session_handle.lock().await;
        session.touch();

        // Step 1: adopt a preserved filter — set only by a prior
        // `manual_input` clarification choice (§4.2) — as a forced filter
        // for this one turn, unless the caller already forced an override.
        // Ordinary routing memory must NOT force the collection here: that
        // is a distinct mechanism (§4.7) that only promotes a marginal new
        // router decision in step 2, it never bypasses the router outright.
        let (forced_collection, forced_document_title) =
            if forced_collection.is_none() && forced_document_title.is_none() {
                match session.preserved_filter.take() {
                    Some(preserved) => {
                        let document_title = preserved.document_id.as_ref().and_then(|document_id| {
                            self.document_title_for(preserved.collection_id.as_deref(), Some(document_id))
                        });
                        (preserved.collection_id, document_title)
                    }
                    None => (None, None),
                }
            } else {
                (forced_collection.map(str::to_string), forced_document_title.map(str::to_string))
            };

        // Step 2: resolve a routing decision.
        let decision = if let Some(collection_id) = &forced_collection {
            RoutingDecision {
                collection_id: Some(collection_id.clone()),
                confidence: 1.0,
                level: ConfidenceLevel::High,
                raw_confidence: 1.0,
                filter: forced_document_title.as_ref().map(|title| SmartFilter {
                    exact_title: Some(title.clone()),
                    ..Default::default()
                }),
                best_question_text: None,
                best_document_id: None,
                was_overridden: false,
            }
        } else {
            match router::route(text, &self.question_index, Some(&*session), self.embedding.as_ref(), &self.config)
                .await
            {
                Ok(decision) => decision,
                Err(err) => {
                    return Response::ErrorResponse {
                        error: err.to_string(),
                        session_id: session_id.to_string(),
                    };
                }
            }
        };

        if !decision.level.is_admissible() {
            let streak_cleared = session.increment_low_confidence(&self.config);
            if streak_cleared {
                info!(session_id, "low-confidence streak cleared routing memory");
            }
            let candidates = self.top_collections(text).await;
            let (payload, state) = low_confidence_payload(&candidates);
            session.pending_clarification = Some(state);
            return Response::ClarificationNeeded {
                clarification: payload,
                session_id: session_id.to_string(),
                processing_time: started.elapsed(),
            };
        }

        let Some(collection_id) = decision.collection_id.clone() else {
            return Response::ErrorResponse {
                error: Error::RouterUncertain {
                    reason: "no collection target despite admissible confidence".to_string(),
                }
                .to_string(),
                session_id: session_id.to_string(),
            };
        };

        // Step 3: vector search with dynamic k / adaptive threshold.
        let k = self.config.dynamic_top_k(decision.level);
        let filter = vector::build_filter(decision.filter.as_ref(), forced_document_title.as_deref());
        let threshold = self.config.adaptive_threshold(filter.is_some());

        let query_embedding = match self.embedding.embed(&[text.to_string()]).await {
            Ok(v) => v.into_iter().next().unwrap_or_default(),
            Err(err) => {
                return Response::ErrorResponse {
                    error: err.to_string(),
                    session_id: session_id.to_string(),
                };
            }
        };

        let hits = match self.search_with_fallback(&collection_id, &query_embedding, k, threshold, filter.as_ref()).await {
            Ok(hits) => hits,
            Err(err) => {
                return Response::ErrorResponse {
                    error: err.to_string(),
                    session_id: session_id.to_string(),
                };
            }
        };

        if hits.is_empty() {
            return Response::NoResults {
                message: "Xin lỗi, mình không tìm thấy thông tin phù hợp với câu hỏi của bạn."
                    .to_string(),
                session_id: session_id.to_string(),
            };
        }

        // Step 4: VRAM-sequencing hints (cooperative; correctness does not
        // depend on the hosts honoring them).
        self.generator.unload().await;

        // Step 5: consensus rerank.
        let candidates: Vec<_> = hits.iter().map(|h| h.chunk.clone()).collect();
        let top_similarity = hits.first().map_or(0.0, |h| h.similarity);
        let outcome = rerank::consensus_rerank(
            text,
            candidates,
            self.reranker.as_ref(),
            &self.config,
            decision.raw_confidence,
            decision.best_document_id.as_ref(),
        )
        .await;
        self.generator.load().await;

        let Some(outcome) = outcome else {
            return Response::NoResults {
                message: "Xin lỗi, mình không tìm thấy thông tin phù hợp với câu hỏi của bạn."
                    .to_string(),
                session_id: session_id.to_string(),
            };
        };

        let top_rerank_score = if outcome.reranker_fallback {
            top_similarity
        } else {
            outcome.top_rerank_score
        };
        let combined = self.config.combined_confidence(decision.raw_confidence, top_rerank_score);
        if combined < self.config.combined_confidence_floor && !decision.level.is_high() {
            let (payload, state) = confirm_with_suggestion_payload(&decision);
            session.pending_clarification = Some(state);
            return Response::ClarificationNeeded {
                clarification: payload,
                session_id: session_id.to_string(),
                processing_time: started.elapsed(),
            };
        }

        // Step 6: context expansion.
        let expanded = match context::expand(&outcome.nucleus, self.document_loader.as_ref(), self.config.context_char_budget)
            .await
        {
            Ok(expanded) => expanded,
            Err(err) => {
                return Response::ErrorResponse {
                    error: Error::ContextLoadFailed(err).to_string(),
                    session_id: session_id.to_string(),
                };
            }
        };

        // Step 7-8: build and run the generator prompt.
        let history: Vec<_> = session.history.iter().cloned().collect();
        let request = generator::build_request(
            &history,
            self.config.max_prompt_history_turns,
            expanded.text.clone(),
            text.to_string(),
        );
        let generation = match self.generator.generate(request).await {
            Ok(response) => response,
            Err(err) => {
                return Response::ErrorResponse {
                    error: Error::OracleTransient(err).to_string(),
                    session_id: session_id.to_string(),
                };
            }
        };

        session.record_turn(text, truncate_summary(&generation.text), self.config.max_session_history);

        // Step 9: update routing memory if the raw decision was strong.
        if decision.raw_confidence >= self.config.routing_memory_update_floor {
            session.update_successful_routing(collection_id.clone(), decision.raw_confidence, decision.filter.clone());
        }

        Response::Answer {
            answer: generation.text,
            context_info: ContextInfo {
                document_id: expanded.document_id,
                truncated: expanded.truncated,
                reranker_fallback: outcome.reranker_fallback,
                router_trusted: outcome.router_trusted,
            },
            routing_info: RoutingInfo {
                collection_id: Some(collection_id),
                confidence: decision.confidence,
                level: decision.level,
                was_overridden: decision.was_overridden,
            },
            session_id: session_id.to_string(),
            processing_time: started.elapsed(),
        }
    }

    async fn search_with_fallback(
        &self,
        collection_id: &str,
        query_embedding: &[f32],
        k: usize,
        threshold: f32,
        filter: Option<&Filter>,
    ) -> std::result::Result<Vec<vector::SearchHit>, OracleError> {
        match self
            .vector_index
            .search_in_collection(collection_id, query_embedding, k, threshold, filter)
            .await
        {
            Ok(hits) => Ok(hits),
            Err(err) if filter.is_some() => {
                warn!(error = %err, "filtered vector search failed, retrying without filter");
                self.vector_index
                    .search_in_collection(collection_id, query_embedding, k, threshold, None)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    async fn top_collections(&self, query: &str) -> Vec<CollectionCandidate> {
        let Ok(embeddings) = self.embedding.embed(&[query.to_string()]).await else {
            return Vec::new();
        };
        let Some(query_embedding) = embeddings.into_iter().next() else {
            return Vec::new();
        };

        let mut scored: Vec<CollectionCandidate> = self
            .question_index
            .collection_ids()
            .map(|collection_id| {
                let best = self
                    .question_index
                    .collection(collection_id)
                    .iter()
                    .map(|e| crate::embedding::cosine_similarity(&query_embedding, &e.embedding))
                    .fold(f32::MIN, f32::max);
                CollectionCandidate {
                    id: collection_id.clone(),
                    display_name: collection_id.clone(),
                    score: best.max(0.0),
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }
}

fn missing_candidate_response(session_id: &str) -> Response {
    Response::ErrorResponse {
        error: "clarification option no longer valid for this session".to_string(),
        session_id: session_id.to_string(),
    }
}

fn truncate_summary(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() > MAX {
        text.chars().take(MAX).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

fn uuid_like_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("session-{n:x}")
}
