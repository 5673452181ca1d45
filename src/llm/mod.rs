//! LLM provider abstraction, adapters and shared retry logic.
//!
//! Every vendor implements [`Provider::generate_once`]; the trait's default
//! [`Provider::generate`] runs the pre-flight [`Provider::validate_config`]
//! check once and then wraps `generate_once` in [`retry::retry_with_backoff`].

pub mod anthropic;
pub mod cerebras;
pub mod chat;
pub mod factory;
pub mod groq;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod pricing;
pub mod retry;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

pub use factory::{DefaultFactory, ProviderFactory, create_provider};
pub use retry::{BackoffKind, RetryError, RetryPolicy, retry_with_backoff};

/// Supported LLM services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    Cerebras,
    Groq,
    OpenRouter,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAI,
        ProviderKind::Cerebras,
        ProviderKind::Groq,
        ProviderKind::OpenRouter,
        ProviderKind::Ollama,
    ];

    /// Identifier used in configuration files and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Cerebras => "cerebras",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Ollama talks to a local, unauthenticated endpoint.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnsupportedProvider(s.to_string()))
    }
}

/// A vendor-neutral generation request. Built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Request {
    /// Build a request using a stage's configured model and limits.
    pub fn from_config(config: &ProviderConfig, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        self.system_prompt = (!system_prompt.is_empty()).then_some(system_prompt);
        self
    }
}

/// A vendor-neutral generation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub content: String,
    /// Zero when the vendor does not report usage.
    pub tokens_used: u64,
    /// The model the vendor reports having used (may differ from the request).
    pub model: String,
    pub provider: ProviderKind,
    /// Estimated cost in USD; zero when unknown or free.
    pub cost_estimate: f64,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// One LLM service.
///
/// Implementors provide a single HTTP round trip in [`Provider::generate_once`].
/// Callers use [`Provider::generate`], which validates configuration up
/// front and retries only the network path.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Check credentials and model before any network activity.
    fn validate_config(&self) -> Result<(), ConfigError>;

    fn retry_policy(&self) -> &RetryPolicy;

    /// A single attempt: one HTTP POST, parsed into a [`Response`].
    async fn generate_once(&self, req: &Request) -> Result<Response, ProviderError>;

    async fn generate(
        &self,
        cancel: &CancellationToken,
        req: &Request,
    ) -> Result<Response, ProviderError> {
        self.validate_config()?;

        let provider = self.kind();
        retry_with_backoff(self.retry_policy(), cancel, |attempt| {
            debug!(%provider, model = %req.model, attempt, "Sending generation request");
            self.generate_once(req)
        })
        .await
        .map_err(ProviderError::from)
    }
}

/// Shared pre-flight check for adapters that carry an API key and a model.
pub(crate) fn validate_credentials(
    kind: ProviderKind,
    api_key: &str,
    model: &str,
) -> Result<(), ConfigError> {
    if kind.requires_api_key() && api_key.is_empty() {
        return Err(ConfigError::EmptyApiKey { provider: kind });
    }
    if model.trim().is_empty() {
        return Err(ConfigError::EmptyModel { provider: kind });
    }
    Ok(())
}
