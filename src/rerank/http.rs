//! HTTP-based `RerankerOracle` calling an out-of-process cross-encoder
//! service over a JSON REST API.
//!
//! Grounded on `lemoal-t-oriongraphdb`'s `HttpSemanticGen`: a thin
//! `reqwest::Client` wrapper translating a local request/response shape to
//! and from the remote service's JSON contract.

use crate::error::OracleError;
use crate::rerank::RerankerOracle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    pairs: &'a [(String, String)],
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

/// Calls a remote cross-encoder reranking service.
pub struct HttpRerankerOracle {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRerankerOracle {
    /// Builds an oracle against `endpoint` (expected to accept a POST with
    /// a JSON body `{"pairs": [[query, passage], ...]}` and respond with
    /// `{"scores": [...]}`, same order as input).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl RerankerOracle for HttpRerankerOracle {
    async fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RerankRequest { pairs })
            .send()
            .await
            .map_err(|e| OracleError::Rerank(e.to_string()))?
            .error_for_status()
            .map_err(|e| OracleError::Rerank(e.to_string()))?
            .json::<RerankResponse>()
            .await
            .map_err(|e| OracleError::Rerank(e.to_string()))?;

        if response.scores.len() != pairs.len() {
            return Err(OracleError::Rerank(format!(
                "reranker returned {} scores for {} pairs",
                response.scores.len(),
                pairs.len()
            )));
        }
        Ok(response.scores)
    }
}
