//! OpenRouter (OpenAI-compatible gateway).
//!
//! Optional `http_referer` and `x_title` entries in `custom` are forwarded as
//! OpenRouter's attribution headers.

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

use super::chat::ChatCompletions;
use super::{Provider, ProviderKind, Request, Response, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterProvider {
    inner: ChatCompletions,
}

impl OpenRouterProvider {
    pub fn new(config: ProviderConfig, api_key: String) -> Result<Self, ConfigError> {
        let mut headers = Vec::new();
        if let Some(referer) = config.custom("http_referer") {
            headers.push(("http-referer", referer.to_string()));
        }
        if let Some(title) = config.custom("x_title") {
            headers.push(("x-title", title.to_string()));
        }

        let inner = ChatCompletions::new(
            ProviderKind::OpenRouter,
            config,
            api_key,
            DEFAULT_BASE_URL,
            headers,
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        self.inner.validate()
    }

    fn retry_policy(&self) -> &RetryPolicy {
        self.inner.retry_policy()
    }

    async fn generate_once(&self, req: &Request) -> Result<Response, ProviderError> {
        self.inner.complete(req).await
    }
}
