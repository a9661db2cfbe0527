//! Clarification engine: builds structured clarification payloads when
//! routing is uncertain, and advances the multi-turn state machine
//! (`idle → awaiting_collection → awaiting_document → awaiting_question →
//! idle`).
//!
//! Transition table and action-tag vocabulary from spec.md §4.2
//! (authoritative); message templates grounded on
//! `smart_clarification.py`'s three Vietnamese templates
//! (confirm-with-suggestion, multiple-choice, category-based).

use crate::core::document::DocumentId;
use crate::core::question::ExampleQuestion;
use crate::core::session::{
    ClarificationCandidate, ClarificationStage, ClarificationState, PreservedFilter, Session,
};
use crate::router::RoutingDecision;
use serde::{Deserialize, Serialize};

/// The action a clarification option instructs the coordinator to take
/// when chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClarificationAction {
    /// Advance to document selection within the chosen collection.
    ProceedWithCollection,
    /// Advance to question selection within the chosen document.
    ProceedWithDocument,
    /// Re-enter the pipeline with the chosen question as the effective
    /// query.
    ProceedWithQuestion,
    /// Abandon the structured flow; the next message is free text.
    ManualInput,
}

/// A single user-facing clarification option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationOption {
    /// Id the user echoes back in a structured choice.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// What choosing this option does.
    pub action: ClarificationAction,
    /// Forwarding context: collection, if this option pins one.
    pub collection: Option<String>,
    /// Forwarding context: document title, if this option pins one.
    pub document_title: Option<String>,
    /// Forwarding context: example question text, if this option pins one.
    pub question_text: Option<String>,
}

/// A user-facing payload emitted when the pipeline cannot confidently
/// answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationPayload {
    /// Prompt message shown to the user.
    pub message: String,
    /// Options to choose from.
    pub options: Vec<ClarificationOption>,
    /// Which stage of the state machine this payload belongs to.
    pub stage: ClarificationStage,
    /// Whether the user may instead type free-form text.
    pub allow_manual_input: bool,
}

const MANUAL_INPUT_TITLE: &str = "Nhập câu hỏi khác";
const MANUAL_INPUT_DESCRIPTION: &str = "Gõ câu hỏi của bạn theo cách khác";

fn manual_input_option() -> ClarificationOption {
    ClarificationOption {
        id: "manual_input".to_string(),
        title: MANUAL_INPUT_TITLE.to_string(),
        description: MANUAL_INPUT_DESCRIPTION.to_string(),
        action: ClarificationAction::ManualInput,
        collection: None,
        document_title: None,
        question_text: None,
    }
}

/// A scored collection candidate, used to build the `awaiting_collection`
/// payload.
#[derive(Debug, Clone)]
pub struct CollectionCandidate {
    /// Collection id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Router score that surfaced this collection.
    pub score: f32,
}

/// A document candidate, used to build the `awaiting_document` payload.
#[derive(Debug, Clone)]
pub struct DocumentCandidate {
    /// Document id.
    pub id: DocumentId,
    /// Display title.
    pub title: String,
    /// Number of curated questions for this document (used for ranking).
    pub question_count: usize,
}

/// Builds the `idle → awaiting_collection` payload: low router confidence,
/// top 2-3 candidate collections plus "enter a new question".
#[must_use]
pub fn low_confidence_payload(candidates: &[CollectionCandidate]) -> (ClarificationPayload, ClarificationState) {
    let top: Vec<&CollectionCandidate> = candidates.iter().take(3).collect();
    let mut options: Vec<ClarificationOption> = top
        .iter()
        .enumerate()
        .map(|(i, c)| ClarificationOption {
            id: format!("collection_{i}"),
            title: c.display_name.clone(),
            description: format!("Độ liên quan: {:.0}%", c.score * 100.0),
            action: ClarificationAction::ProceedWithCollection,
            collection: Some(c.id.clone()),
            document_title: None,
            question_text: None,
        })
        .collect();
    options.push(manual_input_option());

    let state_candidates: Vec<ClarificationCandidate> = top
        .iter()
        .enumerate()
        .map(|(i, c)| ClarificationCandidate {
            option_id: format!("collection_{i}"),
            collection_id: Some(c.id.clone()),
            document_id: None,
            question_text: None,
        })
        .collect();

    let payload = ClarificationPayload {
        message: "Mình chưa chắc bạn muốn hỏi về thủ tục nào. Bạn vui lòng chọn một trong các \
nhóm thủ tục dưới đây, hoặc nhập lại câu hỏi rõ hơn:"
            .to_string(),
        options,
        stage: ClarificationStage::AwaitingCollection,
        allow_manual_input: true,
    };
    (payload, ClarificationState::awaiting_collection(state_candidates))
}

/// Builds the `awaiting_collection → awaiting_document` payload: documents
/// of the chosen collection ranked by question count.
#[must_use]
pub fn document_selection_payload(
    collection_id: &str,
    mut documents: Vec<DocumentCandidate>,
) -> (ClarificationPayload, ClarificationState) {
    documents.sort_by(|a, b| b.question_count.cmp(&a.question_count));
    let top: Vec<DocumentCandidate> = documents.into_iter().take(5).collect();

    let mut options: Vec<ClarificationOption> = top
        .iter()
        .enumerate()
        .map(|(i, d)| ClarificationOption {
            id: format!("document_{i}"),
            title: d.title.clone(),
            description: format!("{} câu hỏi mẫu", d.question_count),
            action: ClarificationAction::ProceedWithDocument,
            collection: Some(collection_id.to_string()),
            document_title: Some(d.title.clone()),
            question_text: None,
        })
        .collect();
    options.push(manual_input_option());

    let state_candidates: Vec<ClarificationCandidate> = top
        .iter()
        .enumerate()
        .map(|(i, d)| ClarificationCandidate {
            option_id: format!("document_{i}"),
            collection_id: Some(collection_id.to_string()),
            document_id: Some(d.id.clone()),
            question_text: None,
        })
        .collect();

    let payload = ClarificationPayload {
        message: "Bạn muốn hỏi về thủ tục nào trong nhóm này?".to_string(),
        options,
        stage: ClarificationStage::AwaitingDocument,
        allow_manual_input: true,
    };

    let mut state = ClarificationState::awaiting_collection(state_candidates);
    state.stage = ClarificationStage::AwaitingDocument;
    state.collection_id = Some(collection_id.to_string());
    (payload, state)
}

/// Builds the `awaiting_document → awaiting_question` payload: 3-5 example
/// questions of the chosen document, plus "other".
#[must_use]
pub fn question_selection_payload(
    collection_id: &str,
    document_id: &DocumentId,
    questions: &[ExampleQuestion],
) -> (ClarificationPayload, ClarificationState) {
    let top: Vec<&ExampleQuestion> = questions.iter().take(5).collect();

    let mut options: Vec<ClarificationOption> = top
        .iter()
        .enumerate()
        .map(|(i, q)| ClarificationOption {
            id: format!("question_{i}"),
            title: q.text.clone(),
            description: String::new(),
            action: ClarificationAction::ProceedWithQuestion,
            collection: Some(collection_id.to_string()),
            document_title: None,
            question_text: Some(q.text.clone()),
        })
        .collect();
    options.push(manual_input_option());

    let state_candidates: Vec<ClarificationCandidate> = top
        .iter()
        .enumerate()
        .map(|(i, q)| ClarificationCandidate {
            option_id: format!("question_{i}"),
            collection_id: Some(collection_id.to_string()),
            document_id: Some(document_id.clone()),
            question_text: Some(q.text.clone()),
        })
        .collect();

    let payload = ClarificationPayload {
        message: "Đây có phải là câu hỏi của bạn không?".to_string(),
        options,
        stage: ClarificationStage::AwaitingQuestion,
        allow_manual_input: true,
    };

    let mut state = ClarificationState::awaiting_collection(state_candidates);
    state.stage = ClarificationStage::AwaitingQuestion;
    state.collection_id = Some(collection_id.to_string());
    state.document_id = Some(document_id.clone());
    (payload, state)
}

/// Builds the mid-confidence "confirm-with-suggestion" payload: the
/// coordinator's combined-confidence gate fell below the floor after
/// rerank, even though the router alone was `low-medium`. Grounded on
/// `smart_clarification.py`'s confirm-with-suggestion template.
#[must_use]
pub fn confirm_with_suggestion_payload(
    decision: &RoutingDecision,
) -> (ClarificationPayload, ClarificationState) {
    let suggestion_title = decision
        .best_question_text
        .clone()
        .unwrap_or_else(|| "câu hỏi phù hợp nhất".to_string());

    let mut options = vec![ClarificationOption {
        id: "confirm_0".to_string(),
        title: suggestion_title.clone(),
        description: "Câu hỏi gần giống nhất mình tìm được".to_string(),
        action: ClarificationAction::ProceedWithQuestion,
        collection: decision.collection_id.clone(),
        document_title: None,
        question_text: decision.best_question_text.clone(),
    }];
    options.push(manual_input_option());

    let candidates = vec![ClarificationCandidate {
        option_id: "confirm_0".to_string(),
        collection_id: decision.collection_id.clone(),
        document_id: decision.best_document_id.clone(),
        question_text: decision.best_question_text.clone(),
    }];

    let payload = ClarificationPayload {
        message: format!(
            "Có phải bạn muốn hỏi: \"{suggestion_title}\"? Hãy xác nhận hoặc nhập lại câu hỏi."
        ),
        options,
        stage: ClarificationStage::AwaitingQuestion,
        allow_manual_input: true,
    };
    (payload, ClarificationState::awaiting_collection(candidates))
}

/// Applies a `manual_input` choice from any awaiting stage: preserves the
/// partial filter (collection, and document if already chosen) into
/// `session.preserved_filter`, resets to idle, and instructs the caller to
/// treat the next message as free text.
pub fn apply_manual_input(session: &mut Session) {
    if let Some(state) = &session.pending_clarification {
        session.preserved_filter = Some(PreservedFilter {
            collection_id: state.collection_id.clone(),
            document_id: state.document_id.clone(),
        });
    }
    session.pending_clarification = None;
}

/// Resets the pending clarification stage when the user sends a brand-new
/// free-form query instead of a structured choice.
pub fn reset_on_new_query(session: &mut Session) {
    session.pending_clarification = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_payload_lists_up_to_three_plus_manual() {
        let candidates = vec![
            CollectionCandidate {
                id: "c1".to_string(),
                display_name: "Hộ tịch".to_string(),
                score: 0.6,
            },
            CollectionCandidate {
                id: "c2".to_string(),
                display_name: "Chứng thực".to_string(),
                score: 0.55,
            },
            CollectionCandidate {
                id: "c3".to_string(),
                display_name: "Nuôi con nuôi".to_string(),
                score: 0.4,
            },
            CollectionCandidate {
                id: "c4".to_string(),
                display_name: "Khác".to_string(),
                score: 0.1,
            },
        ];
        let (payload, state) = low_confidence_payload(&candidates);
        assert_eq!(payload.options.len(), 4); // 3 + manual
        assert_eq!(state.stage, ClarificationStage::AwaitingCollection);
        assert!(payload.allow_manual_input);
    }

    #[test]
    fn document_selection_ranks_by_question_count() {
        let docs = vec![
            DocumentCandidate {
                id: DocumentId::from("d1"),
                title: "Ít câu hỏi".to_string(),
                question_count: 1,
            },
            DocumentCandidate {
                id: DocumentId::from("d2"),
                title: "Nhiều câu hỏi".to_string(),
                question_count: 5,
            },
        ];
        let (payload, state) = document_selection_payload("c1", docs);
        assert_eq!(payload.options[0].title, "Nhiều câu hỏi");
        assert_eq!(state.stage, ClarificationStage::AwaitingDocument);
        assert_eq!(state.collection_id.as_deref(), Some("c1"));
    }

    #[test]
    fn question_selection_caps_at_five_plus_manual() {
        let questions: Vec<ExampleQuestion> = (0..8)
            .map(|i| ExampleQuestion::variant(format!("q{i}"), DocumentId::from("d1"), "c1"))
            .collect();
        let (payload, state) = question_selection_payload("c1", &DocumentId::from("d1"), &questions);
        assert_eq!(payload.options.len(), 6); // 5 + manual
        assert_eq!(state.stage, ClarificationStage::AwaitingQuestion);
        assert_eq!(state.document_id, Some(DocumentId::from("d1")));
    }

    #[test]
    fn manual_input_clears_pending_clarification() {
        let mut session = Session::new("s1");
        let (_, state) = low_confidence_payload(&[]);
        session.pending_clarification = Some(state);
        apply_manual_input(&mut session);
        assert!(session.pending_clarification.is_none());
    }

    #[test]
    fn manual_input_preserves_partial_collection_and_document() {
        let mut session = Session::new("s1");
        let (_, mut state) = low_confidence_payload(&[]);
        state.collection_id = Some("c1".to_string());
        state.document_id = Some(DocumentId::from("d1"));
        session.pending_clarification = Some(state);

        apply_manual_input(&mut session);

        let preserved = session.preserved_filter.expect("filter preserved");
        assert_eq!(preserved.collection_id.as_deref(), Some("c1"));
        assert_eq!(preserved.document_id, Some(DocumentId::from("d1")));
    }

    #[test]
    fn manual_input_from_bare_collection_stage_preserves_nothing() {
        let mut session = Session::new("s1");
        let (_, state) = low_confidence_payload(&[]);
        session.pending_clarification = Some(state);

        apply_manual_input(&mut session);

        let preserved = session.preserved_filter.expect("filter preserved");
        assert!(preserved.collection_id.is_none());
        assert!(preserved.document_id.is_none());
    }

    #[test]
    fn new_query_resets_pending_stage() {
        let mut session = Session::new("s1");
        let (_, state) = low_confidence_payload(&[]);
        session.pending_clarification = Some(state);
        reset_on_new_query(&mut session);
        assert!(session.pending_clarification.is_none());
    }
}
