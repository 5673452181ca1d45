//! Effective per-stage settings and API-key lookup.
//!
//! Polish fields fall back to the discovery stage, then to the static
//! per-provider defaults. The key variable is the exception: it is inherited
//! only while the polish stage targets the discovery vendor.

use std::env;
use std::fmt;

use tracing::debug;

use crate::error::ConfigError;
use crate::llm::ProviderKind;

use super::{Config, ProviderConfig, check_max_tokens, check_temperature};
use super::{default_api_key_env, default_model};

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Effective settings for the discovery stage.
pub fn resolve_discovery(config: &Config) -> Result<ProviderConfig, ConfigError> {
    let ai = &config.ai;
    let provider: ProviderKind = ai.provider.parse()?;

    check_max_tokens(ai.max_tokens)?;
    check_temperature(ai.temperature)?;

    Ok(ProviderConfig {
        provider,
        model: non_empty(&ai.model)
            .unwrap_or(default_model(provider))
            .to_string(),
        api_key_env: non_empty(&ai.api_key_env)
            .unwrap_or(default_api_key_env(provider))
            .to_string(),
        max_tokens: ai.max_tokens,
        temperature: ai.temperature,
        timeout: ai.timeout,
        retry: ai.retry.to_policy()?,
        custom: ai.custom.clone(),
    })
}

/// Effective settings for the polish stage.
pub fn resolve_polish(config: &Config) -> Result<ProviderConfig, ConfigError> {
    let discovery = resolve_discovery(config)?;
    let polish = &config.ai.polish;

    let provider = match non_empty(&polish.polish_provider) {
        Some(name) => name.parse::<ProviderKind>()?,
        None => discovery.provider,
    };
    let same_provider = provider == discovery.provider;

    let model = non_empty(&polish.polish_model)
        .or_else(|| non_empty(&discovery.model))
        .unwrap_or(default_model(provider))
        .to_string();

    let api_key_env = match non_empty(&polish.polish_api_key_env) {
        Some(var) => var.to_string(),
        None if same_provider => discovery.api_key_env.clone(),
        None => default_api_key_env(provider).to_string(),
    };

    let max_tokens = polish.polish_max_tokens.unwrap_or(discovery.max_tokens);
    let temperature = polish.polish_temperature.unwrap_or(discovery.temperature);
    check_max_tokens(max_tokens)?;
    check_temperature(temperature)?;

    Ok(ProviderConfig {
        provider,
        model,
        api_key_env,
        max_tokens,
        temperature,
        ..discovery
    })
}

/// Read the API key named by `config.api_key_env`.
///
/// An empty variable name means no credential is needed. Keyless providers
/// tolerate an unset variable; everyone else gets an error naming it.
pub fn read_api_key(config: &ProviderConfig) -> Result<String, ConfigError> {
    let Some(var) = non_empty(&config.api_key_env) else {
        return Ok(String::new());
    };

    match env::var(var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ if !config.provider.requires_api_key() => {
            debug!(provider = %config.provider, env_var = var, "No API key set, continuing without one");
            Ok(String::new())
        }
        _ => Err(ConfigError::MissingApiKey {
            env_var: var.to_string(),
        }),
    }
}

/// API key for the polish stage.
///
/// Reuses the discovery key when both stages target the same provider so the
/// same variable is never read twice.
pub fn polish_api_key(
    discovery: &ProviderConfig,
    discovery_key: &str,
    polish: &ProviderConfig,
) -> Result<String, ConfigError> {
    if polish.provider == discovery.provider {
        return Ok(discovery_key.to_string());
    }
    read_api_key(polish)
}

/// A stage's settings together with its resolved credential.
#[derive(Clone)]
pub struct ResolvedStage {
    pub config: ProviderConfig,
    pub api_key: String,
}

impl fmt::Debug for ResolvedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStage")
            .field("config", &self.config)
            .field("api_key", &if self.api_key.is_empty() { "<none>" } else { "<redacted>" })
            .finish()
    }
}

/// Everything needed to run the workflow, resolved before any network call.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub discovery: ResolvedStage,
    pub polish: Option<ResolvedStage>,
}

impl StagePlan {
    pub fn worst_case_duration(&self) -> std::time::Duration {
        let discovery = self.discovery.config.worst_case_duration();
        match &self.polish {
            Some(polish) => discovery.saturating_add(polish.config.worst_case_duration()),
            None => discovery,
        }
    }
}

/// Resolve both stages and their keys. Fails before any request is sent.
pub fn plan_stages(config: &Config, polish_enabled: bool) -> Result<StagePlan, ConfigError> {
    let discovery_config = resolve_discovery(config)?;
    let discovery_key = read_api_key(&discovery_config)?;

    let polish = if polish_enabled {
        let polish_config = resolve_polish(config)?;
        let api_key = polish_api_key(&discovery_config, &discovery_key, &polish_config)?;
        Some(ResolvedStage {
            config: polish_config,
            api_key,
        })
    } else {
        None
    };

    Ok(StagePlan {
        discovery: ResolvedStage {
            config: discovery_config,
            api_key: discovery_key,
        },
        polish,
    })
}
