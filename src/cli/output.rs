//! Output formatting: renders a coordinator [`Response`] (or a fatal
//! [`Error`]) as text or JSON, the same text/json/ndjson split the rest of
//! the pack's CLIs use.

use crate::coordinator::Response;
use crate::error::Error;
use serde_json::json;

/// How a response or error is rendered to stdout/stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// A single JSON object.
    Json,
    /// Newline-delimited JSON (identical to `Json` for a single response;
    /// kept distinct so batch callers can rely on one object per line).
    Ndjson,
}

impl OutputFormat {
    /// Parses a `--format` value, defaulting to `Text` for anything
    /// unrecognized rather than erroring.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" => Self::Ndjson,
            _ => Self::Text,
        }
    }
}

/// Renders a coordinator response in the requested format.
#[must_use]
pub fn format_response(response: &Response, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_response_text(response),
        OutputFormat::Json | OutputFormat::Ndjson => format_response_json(response),
    }
}

fn format_response_text(response: &Response) -> String {
    match response {
        Response::Answer {
            answer,
            context_info,
            routing_info,
            session_id,
            processing_time,
        } => format!(
            "{answer}\n\n[session={session_id} collection={:?} confidence={:.2} truncated={} elapsed={processing_time:?}]",
            routing_info.collection_id, routing_info.confidence, context_info.truncated,
        ),
        Response::ClarificationNeeded {
            clarification,
            session_id,
            ..
        } => {
            let mut out = format!("{}\n", clarification.message);
            for option in &clarification.options {
                out.push_str(&format!("  [{}] {}\n", option.id, option.title));
            }
            out.push_str(&format!("(session={session_id})"));
            out
        }
        Response::NoResults { message, session_id } => {
            format!("{message} (session={session_id})")
        }
        Response::ErrorResponse { error, session_id } => {
            format!("Lỗi: {error} (session={session_id})")
        }
    }
}

fn format_response_json(response: &Response) -> String {
    let value = match response {
        Response::Answer {
            answer,
            context_info,
            routing_info,
            session_id,
            processing_time,
        } => json!({
            "type": "answer",
            "session_id": session_id,
            "answer": answer,
            "collection_id": routing_info.collection_id,
            "confidence": routing_info.confidence,
            "was_overridden": routing_info.was_overridden,
            "document_id": context_info.document_id.as_ref(),
            "truncated": context_info.truncated,
            "reranker_fallback": context_info.reranker_fallback,
            "router_trusted": context_info.router_trusted,
            "processing_time_ms": processing_time.as_millis(),
        }),
        Response::ClarificationNeeded {
            clarification,
            session_id,
            processing_time,
        } => json!({
            "type": "clarification_needed",
            "session_id": session_id,
            "message": clarification.message,
            "stage": format!("{:?}", clarification.stage),
            "allow_manual_input": clarification.allow_manual_input,
            "options": clarification.options.iter().map(|o| json!({
                "id": o.id,
                "title": o.title,
                "description": o.description,
            })).collect::<Vec<_>>(),
            "processing_time_ms": processing_time.as_millis(),
        }),
        Response::NoResults { message, session_id } => json!({
            "type": "no_results",
            "session_id": session_id,
            "message": message,
        }),
        Response::ErrorResponse { error, session_id } => json!({
            "type": "error",
            "session_id": session_id,
            "error": error,
        }),
    };
    value.to_string()
}

/// Maps an `Error` variant to a stable error-type tag and an optional
/// user-facing suggestion, the way the pack's other CLIs enrich raw
/// `Display` text for programmatic consumers.
const fn error_details(error: &Error) -> (&'static str, Option<&'static str>) {
    match error {
        Error::RouterUncertain { .. } => (
            "router_uncertain",
            Some("Hãy cung cấp thêm chi tiết cho câu hỏi."),
        ),
        Error::NoMatch => ("no_match", Some("Không tìm thấy kết quả phù hợp.")),
        Error::OracleTransient(_) => ("oracle_transient", Some("Thử lại sau ít phút.")),
        Error::ContextLoadFailed(_) => ("context_load_failed", None),
        Error::SessionMissing { .. } => (
            "session_missing",
            Some("Bắt đầu một phiên mới bằng truy vấn không có --session."),
        ),
        Error::Config(_) => (
            "config_error",
            Some("Kiểm tra lại đường dẫn tệp câu hỏi hoặc tệp cache."),
        ),
    }
}

/// Renders a fatal error (one that aborted before a `Response` could be
/// produced) in the requested format.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (kind, suggestion) = error_details(error);
            json!({
                "success": false,
                "error": {
                    "type": kind,
                    "message": error.to_string(),
                    "suggestion": suggestion,
                }
            })
            .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_to_text() {
        assert_eq!(OutputFormat::parse("bogus"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
    }

    #[test]
    fn format_error_text_is_plain_display() {
        let err = Error::NoMatch;
        assert_eq!(format_error(&err, OutputFormat::Text), "no results for query");
    }

    #[test]
    fn format_error_json_has_type_and_suggestion() {
        let err = Error::SessionMissing {
            session_id: "s1".to_string(),
        };
        let rendered = format_error(&err, OutputFormat::Json);
        assert!(rendered.contains("session_missing"));
        assert!(rendered.contains("\"success\":false"));
    }
}
