//! Provider construction.

use crate::config::ProviderConfig;
use crate::error::ConfigError;

use super::anthropic::AnthropicProvider;
use super::cerebras::CerebrasProvider;
use super::groq::GroqProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::openrouter::OpenRouterProvider;
use super::{Provider, ProviderKind};

/// Builds providers for the workflow. Swapped out in tests.
pub trait ProviderFactory: Send + Sync {
    fn create(
        &self,
        config: &ProviderConfig,
        api_key: String,
    ) -> Result<Box<dyn Provider>, ConfigError>;
}

/// Builds the real HTTP adapters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl ProviderFactory for DefaultFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        api_key: String,
    ) -> Result<Box<dyn Provider>, ConfigError> {
        create_provider(config, api_key)
    }
}

/// Construct the adapter for `config.provider` and run its pre-flight check,
/// so a missing credential surfaces here rather than on first use.
pub fn create_provider(
    config: &ProviderConfig,
    api_key: String,
) -> Result<Box<dyn Provider>, ConfigError> {
    let config = config.clone();
    let provider: Box<dyn Provider> = match config.provider {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(config, api_key)?),
        ProviderKind::OpenAI => Box::new(OpenAIProvider::new(config, api_key)?),
        ProviderKind::Cerebras => Box::new(CerebrasProvider::new(config, api_key)?),
        ProviderKind::Groq => Box::new(GroqProvider::new(config, api_key)?),
        ProviderKind::OpenRouter => Box::new(OpenRouterProvider::new(config, api_key)?),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(config, api_key)?),
    };

    provider.validate_config()?;
    Ok(provider)
}
