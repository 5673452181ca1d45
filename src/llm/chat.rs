//! OpenAI-compatible chat completions, shared by OpenAI, Cerebras, Groq and
//! OpenRouter.
//!
//! The four vendors speak the same wire format and differ only in endpoint,
//! pricing table and a few attribution headers, so each of them wraps a
//! [`ChatCompletions`] client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

use super::http::{self, ErrorDetail};
use super::{ProviderKind, Request, Response, RetryPolicy, pricing, validate_credentials};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatRequest<'a> {
    /// System message first (when present), then the user prompt.
    pub fn from_request(req: &'a Request) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &req.prompt,
        });

        Self {
            model: &req.model,
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// `{"error": {"message", "type", "code"}}`. The code may be a string or a number.
fn extract_error(body: &str) -> Option<ErrorDetail> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let code = match envelope.error.code {
        Some(serde_json::Value::String(code)) => Some(code),
        Some(serde_json::Value::Null) | None => envelope.error.kind,
        Some(other) => Some(other.to_string()),
    };
    Some(ErrorDetail {
        message: envelope.error.message,
        code,
    })
}

/// Convert a decoded chat completion into a [`Response`].
pub fn into_response(
    provider: ProviderKind,
    requested_model: &str,
    parsed: ChatResponse,
) -> Result<Response, ProviderError> {
    let Some(choice) = parsed.choices.into_iter().next() else {
        return Err(ProviderError::EmptyCompletion { provider });
    };
    let content = choice.message.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ProviderError::EmptyCompletion { provider });
    }

    let usage = parsed.usage;
    let model = if parsed.model.is_empty() {
        requested_model.to_string()
    } else {
        parsed.model
    };

    let mut metadata = BTreeMap::new();
    metadata.insert("prompt_tokens".to_string(), json!(usage.prompt_tokens));
    metadata.insert("completion_tokens".to_string(), json!(usage.completion_tokens));
    if let Some(reason) = choice.finish_reason {
        metadata.insert("finish_reason".to_string(), json!(reason));
    }
    if !parsed.id.is_empty() {
        metadata.insert("id".to_string(), json!(parsed.id));
    }

    Ok(Response {
        content,
        tokens_used: usage.total_tokens,
        cost_estimate: pricing::estimate_cost(
            provider,
            &model,
            usage.prompt_tokens,
            usage.completion_tokens,
        ),
        model,
        provider,
        metadata,
    })
}

/// A client for one OpenAI-compatible endpoint.
pub struct ChatCompletions {
    kind: ProviderKind,
    config: ProviderConfig,
    api_key: String,
    url: String,
    client: reqwest::Client,
}

impl ChatCompletions {
    /// `default_base` is used unless `custom.base_url` overrides it.
    /// `extra_headers` are sent with every request alongside bearer auth.
    pub fn new(
        kind: ProviderKind,
        config: ProviderConfig,
        api_key: String,
        default_base: &str,
        extra_headers: Vec<(&'static str, String)>,
    ) -> Result<Self, ConfigError> {
        let mut headers = extra_headers;
        if !api_key.is_empty() {
            headers.push(("authorization", format!("Bearer {}", api_key)));
        }
        let client = http::build_client(config.timeout, &headers)?;
        let url = http::endpoint(&config.custom, default_base, "/chat/completions");

        Ok(Self {
            kind,
            config,
            api_key,
            url,
            client,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_credentials(self.kind, &self.api_key, &self.config.model)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    /// One POST to `/chat/completions`.
    pub async fn complete(&self, req: &Request) -> Result<Response, ProviderError> {
        let body = ChatRequest::from_request(req);
        let (status, text) = http::post_json(&self.client, self.kind, &self.url, &body).await?;

        if !status.is_success() {
            debug!(provider = %self.kind, %status, "Chat completion request rejected");
            return Err(http::status_error(self.kind, status, text, extract_error));
        }

        let parsed: ChatResponse = http::parse_body(self.kind, &text)?;
        into_response(self.kind, &req.model, parsed)
    }
}
