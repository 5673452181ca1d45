//! Anthropic Messages API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

use super::http::{self, ErrorDetail};
use super::{Provider, ProviderKind, Request, Response, RetryPolicy, pricing, validate_credentials};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

const API_VERSION_KEY: &str = "anthropic_version";

/// Map friendly model names to API model ids. Anything else passes through.
pub fn normalize_model(model: &str) -> &str {
    match model {
        "haiku" | "claude-haiku-4-5" => "claude-3-5-haiku-20241022",
        "sonnet" | "claude-sonnet-4-5" => "claude-3-5-sonnet-20241022",
        "opus" | "claude-opus-4" => "claude-opus-4-20250514",
        other => other,
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

fn extract_error(body: &str) -> Option<ErrorDetail> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    Some(ErrorDetail {
        message: envelope.error.message,
        code: envelope.error.kind,
    })
}

pub struct AnthropicProvider {
    config: ProviderConfig,
    api_key: String,
    url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig, api_key: String) -> Result<Self, ConfigError> {
        let version = config
            .custom(API_VERSION_KEY)
            .unwrap_or(DEFAULT_API_VERSION)
            .to_string();

        let mut headers = vec![("anthropic-version", version)];
        if !api_key.is_empty() {
            headers.push(("x-api-key", api_key.clone()));
        }

        let client = http::build_client(config.timeout, &headers)?;
        let url = http::endpoint(&config.custom, DEFAULT_BASE_URL, "/messages");

        Ok(Self {
            config,
            api_key,
            url,
            client,
        })
    }

    fn parse_response(&self, parsed: MessagesResponse) -> Result<Response, ProviderError> {
        let provider = ProviderKind::Anthropic;
        let content: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion { provider });
        }

        let usage = parsed.usage;
        let mut metadata = BTreeMap::new();
        metadata.insert("input_tokens".to_string(), json!(usage.input_tokens));
        metadata.insert("output_tokens".to_string(), json!(usage.output_tokens));
        metadata.insert("id".to_string(), json!(parsed.id));
        if let Some(reason) = parsed.stop_reason {
            metadata.insert("stop_reason".to_string(), json!(reason));
        }

        Ok(Response {
            content,
            tokens_used: usage.input_tokens + usage.output_tokens,
            cost_estimate: pricing::estimate_cost(
                provider,
                &parsed.model,
                usage.input_tokens,
                usage.output_tokens,
            ),
            model: parsed.model,
            provider,
            metadata,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        validate_credentials(self.kind(), &self.api_key, &self.config.model)
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    async fn generate_once(&self, req: &Request) -> Result<Response, ProviderError> {
        let body = MessagesRequest {
            model: normalize_model(&req.model),
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            messages: [Message {
                role: "user",
                content: &req.prompt,
            }],
            system: req.system_prompt.as_deref(),
        };

        let (status, text) = http::post_json(&self.client, self.kind(), &self.url, &body).await?;
        if !status.is_success() {
            return Err(http::status_error(self.kind(), status, text, extract_error));
        }

        let parsed: MessagesResponse = http::parse_body(self.kind(), &text)?;
        self.parse_response(parsed)
    }
}
