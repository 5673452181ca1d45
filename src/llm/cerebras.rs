//! Cerebras inference (OpenAI-compatible).

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

use super::chat::ChatCompletions;
use super::{Provider, ProviderKind, Request, Response, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.cerebras.ai/v1";

pub struct CerebrasProvider {
    inner: ChatCompletions,
}

impl CerebrasProvider {
    pub fn new(config: ProviderConfig, api_key: String) -> Result<Self, ConfigError> {
        let inner = ChatCompletions::new(
            ProviderKind::Cerebras,
            config,
            api_key,
            DEFAULT_BASE_URL,
            Vec::new(),
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Provider for CerebrasProvider {
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
