//! HTTP-based `GeneratorOracle` calling an OpenAI-compatible chat
//! completions endpoint (vLLM, llama.cpp server, Ollama, etc).
//!
//! Grounded on `lemoal-t-oriongraphdb`'s `HttpSemanticGen`: a thin
//! `reqwest::Client` wrapper around a JSON REST contract, with errors
//! mapped into the oracle error taxonomy rather than propagated raw.

use crate::generator::{GenerationRequest, GenerationResponse, GeneratorOracle};
use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn render_turn(query: &str, summary: &str) -> String {
    format!("Người dùng: {query}\nTrợ lý: {summary}")
}

fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage {
        role: "system",
        content: request.system_prompt.clone(),
    }];
    if !request.history.is_empty() {
        let transcript = request
            .history
            .iter()
            .map(|turn| render_turn(&turn.query, &turn.summary))
            .collect::<Vec<_>>()
            .join("\n\n");
        messages.push(ChatMessage {
            role: "system",
            content: format!("Lịch sử hội thoại gần đây:\n{transcript}"),
        });
    }
    messages.push(ChatMessage {
        role: "system",
        content: format!("Ngữ cảnh:\n{}", request.context),
    });
    messages.push(ChatMessage {
        role: "user",
        content: request.query.clone(),
    });
    messages
}

/// Calls a remote OpenAI-compatible chat completions endpoint.
pub struct HttpGeneratorOracle {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl HttpGeneratorOracle {
    /// Builds an oracle against `endpoint` (a full chat-completions URL)
    /// using `model` as the request's `model` field.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl GeneratorOracle for HttpGeneratorOracle {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, OracleError> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Generate(e.to_string()))?
            .error_for_status()
            .map_err(|e| OracleError::Generate(e.to_string()))?
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| OracleError::Generate(e.to_string()))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::Generate("empty choices in completion response".to_string()))?;

        debug!(elapsed_ms = started.elapsed().as_millis(), "generator http call completed");

        Ok(GenerationResponse {
            text,
            prompt_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
            elapsed: started.elapsed(),
        })
    }
}
