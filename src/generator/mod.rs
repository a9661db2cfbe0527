//! Generator oracle: produces the final answer given a system prompt,
//! bounded chat history, expanded context, and the query.
//!
//! Grounded on `llm_service.py`/`language_model.py`'s non-streaming
//! `generate(system_prompt, history, context, query, max_tokens,
//! temperature)` contract (spec.md §6) and `rag_engine.py`'s prompt
//! assembly: a fixed directive constraining the model to the supplied
//! context, history trimmed before content, metadata always preserved.

#[cfg(feature = "remote-oracles")]
pub mod http;

use crate::core::session::HistoryEntry;
use crate::error::OracleError;
use async_trait::async_trait;

/// The fixed system directive constraining the generator to the supplied
/// context and forbidding fabrication.
pub const SYSTEM_DIRECTIVE: &str = "Bạn là trợ lý pháp lý. Chỉ trả lời dựa trên nội dung \
được cung cấp trong phần ngữ cảnh bên dưới. Nếu ngữ cảnh không chứa câu trả lời, hãy nói rõ \
rằng bạn không có đủ thông tin. Không được bịa đặt thông tin.";

/// One turn of bounded chat history included in the prompt.
#[derive(Debug, Clone)]
pub struct PromptHistoryTurn {
    /// The user's query in that turn.
    pub query: String,
    /// A short summary of the answer produced.
    pub summary: String,
}

impl From<&HistoryEntry> for PromptHistoryTurn {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            query: entry.query.clone(),
            summary: entry.summary.clone(),
        }
    }
}

/// Request passed to the generator oracle.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fixed system directive.
    pub system_prompt: String,
    /// Bounded chat history, most recent last.
    pub history: Vec<PromptHistoryTurn>,
    /// The expanded context block.
    pub context: String,
    /// The user's current query.
    pub query: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Response from the generator oracle.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// The generated answer text.
    pub text: String,
    /// Number of prompt tokens consumed, if reported.
    pub prompt_tokens: Option<u32>,
    /// Number of completion tokens generated, if reported.
    pub completion_tokens: Option<u32>,
    /// Wall-clock generation time.
    pub elapsed: std::time::Duration,
}

/// The generator oracle contract. Must be non-streaming; stop sequences
/// include the model's own turn delimiters (an implementation concern, not
/// part of this trait).
#[async_trait]
pub trait GeneratorOracle: Send + Sync {
    /// Produces an answer for `request`.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Generate` on failure or timeout.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, OracleError>;

    /// Cooperative hint: the model may unload to free VRAM. Implementations
    /// that ignore this must still behave correctly (§5).
    async fn unload(&self) {}

    /// Cooperative hint: the model should (re)load before the next
    /// `generate` call.
    async fn load(&self) {}
}

/// Default max-token budget for the generator call, distinct from the
/// context character budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Builds a `GenerationRequest`, trimming `history` to `max_history_turns`
/// (most recent kept) before the caller ever touches context/metadata —
/// history is trimmed first per spec.md §4.6 step 7's token-budget
/// enforcement order.
#[must_use]
pub fn build_request(
    history: &[HistoryEntry],
    max_history_turns: usize,
    context: String,
    query: String,
) -> GenerationRequest {
    let trimmed: Vec<PromptHistoryTurn> = history
        .iter()
        .rev()
        .take(max_history_turns)
        .rev()
        .map(PromptHistoryTurn::from)
        .collect();

    GenerationRequest {
        system_prompt: SYSTEM_DIRECTIVE.to_string(),
        history: trimmed,
        context,
        query,
        max_tokens: DEFAULT_MAX_TOKENS,
        temperature: DEFAULT_TEMPERATURE,
    }
}
