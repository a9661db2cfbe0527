//! Error types for the retrieval engine.
//!
//! Layers the taxonomy from the error-handling design over `thiserror`, the
//! same way storage/chunking/I/O errors used to be layered: a top-level
//! `Error` enum whose variants wrap lower-level causes, with a single
//! `Result<T>` alias used everywhere.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error taxonomy.
///
/// `RouterUncertain` is not really a failure — the router emitting a *low*
/// decision is the expected trigger for the clarification engine — but it is
/// represented here so callers that skip the clarification path still get a
/// typed signal instead of a silent `None`.
#[derive(Error, Debug)]
pub enum Error {
    /// The router could not confidently resolve a collection; the caller
    /// should invoke the clarification engine rather than treat this as
    /// fatal.
    #[error("router uncertain: {reason}")]
    RouterUncertain {
        /// Why routing fell back to clarification.
        reason: String,
    },

    /// Vector search returned zero candidates above threshold.
    #[error("no results for query")]
    NoMatch,

    /// An embedding, rerank, or generation call failed or timed out.
    #[error("oracle call failed: {0}")]
    OracleTransient(#[from] OracleError),

    /// The nucleus chunk's source document could not be loaded. Propagated
    /// as `OracleTransient` per the error-handling design; kept as a
    /// distinct variant so the cause is diagnosable.
    #[error("failed to load source document: {0}")]
    ContextLoadFailed(#[from] ContextError),

    /// A `clarify` call referenced an unknown session id.
    #[error("unknown session: {session_id}")]
    SessionMissing {
        /// The session id that was not found.
        session_id: String,
    },

    /// The question index is missing or corrupt at startup. Fatal: the
    /// process cannot serve queries.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Causes of an `OracleTransient` error.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The embedding oracle failed.
    #[error("embedding oracle error: {0}")]
    Embedding(String),

    /// The reranker oracle failed. Per the propagation policy this is
    /// caught one layer up (the rerank stage degrades to vector-search
    /// top-1 instead of raising), so seeing this variant at the coordinator
    /// boundary means both the rerank call and its fallback path failed.
    #[error("reranker oracle error: {0}")]
    Rerank(String),

    /// The generator oracle failed.
    #[error("generator oracle error: {0}")]
    Generate(String),

    /// The vector index raised (after the no-filter retry also failed).
    #[error("vector index error: {0}")]
    VectorIndex(String),

    /// A turn exceeded its deadline.
    #[error("turn deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },
}

/// Causes of a `ContextLoadFailed` error.
#[derive(Error, Debug)]
pub enum ContextError {
    /// The document's source file does not exist or could not be read.
    #[error("failed to read document {document_id}: {source}")]
    Io {
        /// The document that could not be loaded.
        document_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document file exists but could not be parsed.
    #[error("failed to parse document {document_id}: {reason}")]
    Parse {
        /// The document that could not be parsed.
        document_id: String,
        /// Parse failure reason.
        reason: String,
    },

    /// The nucleus chunk referenced a document id with no known source
    /// path.
    #[error("no source path registered for document {document_id}")]
    UnknownSource {
        /// The document id that has no registered source.
        document_id: String,
    },
}

/// Causes of a fatal `Config` error.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The question-index cache file or its source question files are
    /// missing or empty.
    #[error("question index unavailable: {reason}")]
    QuestionIndexMissing {
        /// Why the index could not be built or loaded.
        reason: String,
    },

    /// The question-index cache file exists but failed to deserialize, or
    /// its header disagrees irreparably with the running configuration.
    #[error("question index cache corrupt: {0}")]
    QuestionIndexCorrupt(String),

    /// A numeric configuration value is out of its valid range.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The configuration field with the invalid value.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },
}

impl From<std::io::Error> for OracleError {
    fn from(err: std::io::Error) -> Self {
        Self::VectorIndex(err.to_string())
    }
}

#[cfg(feature = "sqlite-vector-index")]
impl From<rusqlite::Error> for OracleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::VectorIndex(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::QuestionIndexCorrupt(err.to_string())
    }
}

impl From<bincode::Error> for ConfigError {
    fn from(err: bincode::Error) -> Self {
        Self::QuestionIndexCorrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_uncertain_display() {
        let err = Error::RouterUncertain {
            reason: "no collection scored above the low threshold".to_string(),
        };
        assert!(err.to_string().contains("router uncertain"));
    }

    #[test]
    fn no_match_display() {
        assert_eq!(Error::NoMatch.to_string(), "no results for query");
    }

    #[test]
    fn session_missing_display() {
        let err = Error::SessionMissing {
            session_id: "abc-123".to_string(),
        };
        assert_eq!(err.to_string(), "unknown session: abc-123");
    }

    #[test]
    fn oracle_error_variants_display() {
        assert!(
            OracleError::Embedding("timeout".into())
                .to_string()
                .contains("embedding oracle error")
        );
        assert!(
            OracleError::Rerank("timeout".into())
                .to_string()
                .contains("reranker oracle error")
        );
        assert!(
            OracleError::Generate("timeout".into())
                .to_string()
                .contains("generator oracle error")
        );
        assert!(
            OracleError::VectorIndex("down".into())
                .to_string()
                .contains("vector index error")
        );
        assert_eq!(
            OracleError::DeadlineExceeded { elapsed_ms: 30_000 }.to_string(),
            "turn deadline exceeded after 30000ms"
        );
    }

    #[test]
    fn context_error_variants_display() {
        let err = ContextError::UnknownSource {
            document_id: "doc-1".to_string(),
        };
        assert!(err.to_string().contains("doc-1"));

        let err = ContextError::Parse {
            document_id: "doc-2".to_string(),
            reason: "bad json".to_string(),
        };
        assert!(err.to_string().contains("bad json"));
    }

    #[test]
    fn config_error_variants_display() {
        let err = ConfigError::QuestionIndexMissing {
            reason: "directory empty".to_string(),
        };
        assert!(err.to_string().contains("directory empty"));

        let err = ConfigError::InvalidValue {
            field: "consensus_top_m",
            reason: "must be > 0".to_string(),
        };
        assert!(err.to_string().contains("consensus_top_m"));
    }

    #[test]
    fn error_from_oracle_error() {
        let err: Error = OracleError::Embedding("down".into()).into();
        assert!(matches!(err, Error::OracleTransient(_)));
    }

    #[test]
    fn error_from_context_error() {
        let err: Error = ContextError::UnknownSource {
            document_id: "d1".to_string(),
        }
        .into();
        assert!(matches!(err, Error::ContextLoadFailed(_)));
    }

    #[test]
    fn error_from_config_error() {
        let err: Error = ConfigError::QuestionIndexCorrupt("bad header".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[cfg(feature = "sqlite-vector-index")]
    fn oracle_error_from_rusqlite() {
        let sqlite_err = rusqlite::Error::InvalidQuery;
        let err: OracleError = sqlite_err.into();
        assert!(matches!(err, OracleError::VectorIndex(_)));
    }

    #[test]
    fn config_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::QuestionIndexCorrupt(_)));
    }
}
