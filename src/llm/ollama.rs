//! Local Ollama server via `/api/generate`.
//!
//! No credential is sent. The system prompt has no field of its own in this
//! endpoint and is folded into the prompt text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

use super::http::{self, BASE_URL_KEY, ErrorDetail};
use super::{Provider, ProviderKind, Request, Response, RetryPolicy, validate_credentials};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const OLLAMA_URL_KEY: &str = "ollama_url";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

fn extract_error(body: &str) -> Option<ErrorDetail> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    Some(ErrorDetail {
        message: envelope.error,
        code: None,
    })
}

fn build_prompt(req: &Request) -> String {
    match req.system_prompt.as_deref() {
        Some(system) => format!("System: {}\n\nUser: {}", system, req.prompt),
        None => req.prompt.clone(),
    }
}

#[derive(Debug)]
pub struct OllamaProvider {
    config: ProviderConfig,
    url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// `api_key` is accepted for a uniform constructor and ignored.
    pub fn new(config: ProviderConfig, _api_key: String) -> Result<Self, ConfigError> {
        let base = config
            .custom(OLLAMA_URL_KEY)
            .or_else(|| config.custom(BASE_URL_KEY))
            .unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{}/api/generate", base.trim_end_matches('/'));
        let client = http::build_client(config.timeout, &[])?;

        Ok(Self {
            config,
            url,
            client,
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        validate_credentials(self.kind(), "", &self.config.model)
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    async fn generate_once(&self, req: &Request) -> Result<Response, ProviderError> {
        let provider = self.kind();
        let body = GenerateRequest {
            model: &req.model,
            prompt: build_prompt(req),
            stream: false,
            options: Options {
                temperature: req.temperature,
                num_predict: req.max_tokens,
            },
        };

        let (status, text) = http::post_json(&self.client, provider, &self.url, &body).await?;
        if !status.is_success() {
            return Err(http::status_error(provider, status, text, extract_error));
        }

        let parsed: GenerateResponse = http::parse_body(provider, &text)?;
        if parsed.response.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion { provider });
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("created_at".to_string(), json!(parsed.created_at));
        metadata.insert("done".to_string(), json!(parsed.done));
        metadata.insert("prompt_eval_count".to_string(), json!(parsed.prompt_eval_count));
        metadata.insert("eval_count".to_string(), json!(parsed.eval_count));

        Ok(Response {
            content: parsed.response,
            tokens_used: parsed.prompt_eval_count + parsed.eval_count,
            model: if parsed.model.is_empty() {
                req.model.clone()
            } else {
                parsed.model
            },
            provider,
            cost_estimate: 0.0,
            metadata,
        })
    }
}
