//! CLI command implementations.
//!
//! Assembles a [`RetrievalCoordinator`] from the parsed [`Cli`] flags and
//! dispatches to its `query`/`clarify`/`reset_session` operations, plus a
//! `reindex` maintenance path that rebuilds the question-index cache.

use crate::cli::output::{OutputFormat, format_response};
use crate::cli::parser::{Cli, ClarificationActionArg, Commands};
use crate::clarification::ClarificationAction;
use crate::config::Config;
use crate::context::FilesystemDocumentLoader;
use crate::coordinator::{RetrievalCoordinator, SelectedOption};
use crate::core::ExampleQuestion;
use crate::embedding::{BlockingEmbedderOracle, EmbeddingOracle};
use crate::error::{ConfigError, Error, Result};
use crate::generator::GeneratorOracle;
use crate::question_index::{QuestionIndex, cache};
use crate::rerank::RerankerOracle;
use crate::vector::{InMemoryVectorIndex, VectorIndex};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

impl From<ClarificationActionArg> for ClarificationAction {
    fn from(value: ClarificationActionArg) -> Self {
        match value {
            ClarificationActionArg::ProceedWithCollection => Self::ProceedWithCollection,
            ClarificationActionArg::ProceedWithDocument => Self::ProceedWithDocument,
            ClarificationActionArg::ProceedWithQuestion => Self::ProceedWithQuestion,
            ClarificationActionArg::ManualInput => Self::ManualInput,
        }
    }
}

#[cfg(feature = "fastembed-embeddings")]
fn build_embedding_oracle() -> Result<Arc<dyn EmbeddingOracle>> {
    let embedder = crate::embedding::create_embedder()?;
    Ok(Arc::new(BlockingEmbedderOracle::new(embedder)))
}

#[cfg(not(feature = "fastembed-embeddings"))]
fn build_embedding_oracle() -> Result<Arc<dyn EmbeddingOracle>> {
    Err(Error::Config(ConfigError::InvalidValue {
        field: "fastembed-embeddings",
        reason: "binary was built without the fastembed-embeddings feature".to_string(),
    }))
}

fn build_vector_index(cli: &Cli) -> Result<Arc<dyn VectorIndex>> {
    match &cli.vector_db {
        #[cfg(feature = "sqlite-vector-index")]
        Some(path) => {
            let index = crate::vector::SqliteVectorIndex::open(path)
                .map_err(crate::error::Error::OracleTransient)?;
            Ok(Arc::new(index))
        }
        #[cfg(not(feature = "sqlite-vector-index"))]
        Some(_) => Err(Error::Config(ConfigError::InvalidValue {
            field: "vector_db",
            reason: "binary was built without the sqlite-vector-index feature".to_string(),
        })),
        None => Ok(Arc::new(InMemoryVectorIndex::new())),
    }
}

#[cfg(feature = "remote-oracles")]
fn build_reranker(cli: &Cli) -> Result<Arc<dyn RerankerOracle>> {
    let endpoint = cli.reranker_endpoint.as_deref().ok_or_else(|| {
        Error::Config(ConfigError::InvalidValue {
            field: "reranker_endpoint",
            reason: "required to serve queries".to_string(),
        })
    })?;
    Ok(Arc::new(crate::rerank::http::HttpRerankerOracle::new(
        endpoint,
        ORACLE_TIMEOUT,
    )))
}

#[cfg(not(feature = "remote-oracles"))]
fn build_reranker(_cli: &Cli) -> Result<Arc<dyn RerankerOracle>> {
    Err(Error::Config(ConfigError::InvalidValue {
        field: "reranker_endpoint",
        reason: "binary was built without the remote-oracles feature".to_string(),
    }))
}

#[cfg(feature = "remote-oracles")]
fn build_generator(cli: &Cli) -> Result<Arc<dyn GeneratorOracle>> {
    let endpoint = cli.generator_endpoint.as_deref().ok_or_else(|| {
        Error::Config(ConfigError::InvalidValue {
            field: "generator_endpoint",
            reason: "required to serve queries".to_string(),
        })
    })?;
    Ok(Arc::new(crate::generator::http::HttpGeneratorOracle::new(
        endpoint,
        cli.generator_model.clone(),
        ORACLE_TIMEOUT,
    )))
}

#[cfg(not(feature = "remote-oracles"))]
fn build_generator(_cli: &Cli) -> Result<Arc<dyn GeneratorOracle>> {
    Err(Error::Config(ConfigError::InvalidValue {
        field: "generator_endpoint",
        reason: "binary was built without the remote-oracles feature".to_string(),
    }))
}

fn load_curated_questions(cli: &Cli) -> Result<Vec<ExampleQuestion>> {
    let path = cli.questions_file.as_ref().ok_or_else(|| {
        Error::Config(ConfigError::QuestionIndexMissing {
            reason: "no --questions-file supplied and the cache is missing or stale".to_string(),
        })
    })?;
    let bytes = std::fs::read(path).map_err(|e| {
        Error::Config(ConfigError::QuestionIndexMissing {
            reason: format!("failed to read {}: {e}", path.display()),
        })
    })?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Config(ConfigError::from(e)))
}

async fn load_or_build_question_index(cli: &Cli, embedding: &dyn EmbeddingOracle) -> Result<QuestionIndex> {
    if let Some(index) = cache::load_cache(&cli.cache_path, &cli.embedding_model_identity)? {
        return Ok(index);
    }

    let questions = load_curated_questions(cli)?;
    let index = QuestionIndex::build(questions, embedding).await?;

    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    cache::write_cache(&cli.cache_path, &index, &cli.embedding_model_identity, created_at)?;

    Ok(index)
}

async fn build_coordinator(cli: &Cli) -> Result<RetrievalCoordinator> {
    let embedding = build_embedding_oracle()?;
    let question_index = load_or_build_question_index(cli, embedding.as_ref()).await?;
    let vector_index = build_vector_index(cli)?;
    let reranker = build_reranker(cli)?;
    let generator = build_generator(cli)?;
    let document_loader = Arc::new(FilesystemDocumentLoader::new(cli.documents_dir.clone()));

    Ok(RetrievalCoordinator::new(
        Config::default(),
        question_index,
        embedding,
        vector_index,
        reranker,
        generator,
        document_loader,
    ))
}

/// Executes the parsed CLI command, returning the text to print on stdout.
///
/// # Errors
///
/// Returns an error if the coordinator cannot be assembled (missing
/// oracle endpoints, an unbuildable question index) or the referenced
/// session is unknown.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Query {
            text,
            session,
            collection,
            document_title,
        } => {
            let coordinator = build_coordinator(cli).await?;
            let response = coordinator
                .query(
                    text,
                    session.as_deref(),
                    collection.as_deref(),
                    document_title.as_deref(),
                )
                .await;
            Ok(format_response(&response, format))
        }
        Commands::Clarify {
            session,
            option_id,
            action,
            original_query,
        } => {
            let coordinator = build_coordinator(cli).await?;
            let selected = SelectedOption {
                option_id: option_id.clone(),
                action: (*action).into(),
            };
            let response = coordinator.clarify(session, selected, original_query).await;
            Ok(format_response(&response, format))
        }
        Commands::ResetSession { session } => {
            let coordinator = build_coordinator(cli).await?;
            coordinator.reset_session(session).await?;
            Ok(match format {
                OutputFormat::Text => format!("session {session} reset\n"),
                OutputFormat::Json | OutputFormat::Ndjson => {
                    serde_json::json!({"type": "session_reset", "session_id": session}).to_string()
                }
            })
        }
        Commands::Reindex => {
            let embedding = build_embedding_oracle()?;
            let questions = load_curated_questions(cli)?;
            let count = questions.len();
            let index = QuestionIndex::build(questions, embedding.as_ref()).await?;
            let created_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            cache::write_cache(&cli.cache_path, &index, &cli.embedding_model_identity, created_at)?;
            Ok(match format {
                OutputFormat::Text => {
                    format!("rebuilt question index: {count} questions across {} collections\n", index.collection_ids().count())
                }
                OutputFormat::Json | OutputFormat::Ndjson => serde_json::json!({
                    "type": "reindex",
                    "question_count": count,
                    "collection_count": index.collection_ids().count(),
                    "cache_path": cli.cache_path.display().to_string(),
                })
                .to_string(),
            })
        }
    }
}
