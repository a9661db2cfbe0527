//! CLI argument parsing.
//!
//! A thin demo binary over [`crate::coordinator::RetrievalCoordinator`]:
//! global flags wire up the oracle endpoints and question/document sources,
//! and the subcommands mirror the coordinator's own operations (`query`,
//! `clarify`, `reset-session`) plus a `reindex` maintenance command.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Vietnamese legal-procedure retrieval engine.
#[derive(Parser, Debug)]
#[command(name = "legalrag", version, about, long_about = None)]
pub struct Cli {
    /// Output format: text, json, or ndjson.
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Curated example-questions file (JSON array), used to (re)build the
    /// question index when the cache is missing or stale.
    #[arg(long, env = "LEGALRAG_QUESTIONS_FILE", global = true)]
    pub questions_file: Option<PathBuf>,

    /// Path to the question-index binary cache file.
    #[arg(
        long,
        env = "LEGALRAG_CACHE_PATH",
        default_value = "question_index.cache",
        global = true
    )]
    pub cache_path: PathBuf,

    /// Directory of JSON-serialized documents served by the filesystem
    /// document loader.
    #[arg(long, env = "LEGALRAG_DOCUMENTS_DIR", default_value = "documents", global = true)]
    pub documents_dir: PathBuf,

    /// Path to a persisted SQLite vector index. Without it the demo serves
    /// from an empty in-memory index (requires the `sqlite-vector-index`
    /// feature to take effect).
    #[arg(long, env = "LEGALRAG_VECTOR_DB", global = true)]
    pub vector_db: Option<PathBuf>,

    /// Reranker service endpoint (requires the `remote-oracles` feature).
    #[arg(long, env = "LEGALRAG_RERANKER_ENDPOINT", global = true)]
    pub reranker_endpoint: Option<String>,

    /// Generator chat-completions endpoint (requires `remote-oracles`).
    #[arg(long, env = "LEGALRAG_GENERATOR_ENDPOINT", global = true)]
    pub generator_endpoint: Option<String>,

    /// Model name sent with generation requests.
    #[arg(long, env = "LEGALRAG_GENERATOR_MODEL", default_value = "default", global = true)]
    pub generator_model: String,

    /// Embedding model identity stamped in the question-index cache header.
    #[arg(
        long,
        env = "LEGALRAG_EMBEDDING_MODEL_IDENTITY",
        default_value = "all-MiniLM-L6-v2",
        global = true
    )]
    pub embedding_model_identity: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Action tag accepted by `clarify --action`, mirroring
/// [`crate::clarification::ClarificationAction`].
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ClarificationActionArg {
    /// Advance to document selection within the chosen collection.
    ProceedWithCollection,
    /// Advance to question selection within the chosen document.
    ProceedWithDocument,
    /// Re-enter the pipeline with the chosen question as the query.
    ProceedWithQuestion,
    /// Abandon the structured flow; treat the next message as free text.
    ManualInput,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs one conversational turn.
    Query {
        /// The user's question, in Vietnamese.
        text: String,
        /// Existing session id to continue a conversation; a new session
        /// is allocated if omitted.
        #[arg(long)]
        session: Option<String>,
        /// Force routing to a specific collection, bypassing the router.
        #[arg(long)]
        collection: Option<String>,
        /// Force context expansion around a specific document title.
        #[arg(long)]
        document_title: Option<String>,
    },
    /// Applies a structured clarification choice from a prior `query`.
    Clarify {
        /// Session id the clarification payload was issued under.
        session: String,
        /// The option id the user chose.
        option_id: String,
        /// The action tag carried by that option.
        #[arg(long, value_enum)]
        action: ClarificationActionArg,
        /// The original free-text query, used to re-enter the pipeline
        /// when `action` is `manual-input`.
        #[arg(long, default_value = "")]
        original_query: String,
    },
    /// Clears a session's history, routing memory, and pending
    /// clarification.
    ResetSession {
        /// Session id to reset.
        session: String,
    },
    /// Rebuilds the question index from the curated questions file and
    /// writes it to the cache path.
    Reindex,
}
