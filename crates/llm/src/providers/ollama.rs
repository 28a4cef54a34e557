//! Ollama provider.
//!
//! Uses the non-streaming `/api/generate` endpoint. See
//! https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use concierge_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<SamplingOptions>,
    stream: bool,
}

/// Sampling knobs; Ollama calls the token cap `num_predict`.
#[derive(Debug, Serialize, PartialEq)]
struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    /// Client for [`DEFAULT_OLLAMA_URL`].
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base(base_url.into()),
            http: reqwest::Client::new(),
        }
    }

    /// Client whose requests give up after `timeout`. Small local models
    /// can take a while on first load, so callers usually pass something
    /// generous.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base(base_url.into()),
            http,
        })
    }

    fn body<'a>(&self, request: &'a LlmRequest) -> GenerateBody<'a> {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            SamplingOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }
        });

        GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            options,
            stream: false,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!("POST {} (model: {})", url, request.model);

        let response = self
            .http
            .post(&url)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Ollama unreachable at {}: {}", self.base_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("Ollama returned {}: {}", status, detail)));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed Ollama reply: {}", e)))?;

        tracing::trace!("Ollama reply: {:?}", reply);

        Ok(LlmResponse {
            content: reply.response,
            model: reply.model,
            usage: LlmUsage::new(reply.prompt_eval_count, reply.eval_count),
        })
    }
}
