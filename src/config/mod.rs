//! File-backed configuration and per-stage provider settings.
//!
//! The YAML file mirrors [`ProviderConfig`] under an `ai:` block. Anything
//! left unset there is filled from [`defaults`] after loading; the polish
//! stage is resolved separately by [`resolve`].

pub mod defaults;
pub mod duration;
pub mod resolve;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::llm::{BackoffKind, ProviderKind, RetryPolicy};

pub use defaults::{default_api_key_env, default_model};
pub use resolve::{
    ResolvedStage, StagePlan, plan_stages, polish_api_key, read_api_key, resolve_discovery,
    resolve_polish,
};

pub const DEFAULT_CONFIG_PATH: &str = ".relnotes.yml";
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::Anthropic;
pub const DEFAULT_MAX_TOKENS: u32 = 8000;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fully resolved settings for one generation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Empty for services that need no credential.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Vendor overrides such as `base_url` or `anthropic_version`.
    pub custom: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Settings for `provider` with every other field at its default.
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: default_model(provider).to_string(),
            api_key_env: default_api_key_env(provider).to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            custom: BTreeMap::new(),
        }
    }

    pub fn custom(&self, key: &str) -> Option<&str> {
        self.custom
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Upper bound on wall-clock time for this stage, every attempt timing out.
    pub fn worst_case_duration(&self) -> Duration {
        self.timeout
            .saturating_mul(self.retry.attempts.max(1))
            .saturating_add(self.retry.total_delay())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub ai: AiConfig,
}

/// Discovery-stage settings plus the nested polish block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub custom: BTreeMap<String, String>,
    pub polish: PolishConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff: String,
    #[serde(deserialize_with = "duration::deserialize")]
    pub initial_delay: Duration,
}

/// Optional second stage. Empty strings and `None` inherit from discovery.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolishConfig {
    pub enabled: bool,
    pub polish_provider: String,
    pub polish_model: String,
    pub polish_api_key_env: String,
    /// Custom template; `{draft}` and `{diff}` are substituted.
    pub polish_prompt: String,
    pub polish_max_tokens: Option<u32>,
    pub polish_temperature: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            version: "1".to_string(),
            ai: AiConfig::default(),
        };
        config.apply_defaults();
        config
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.as_str().to_string(),
            model: String::new(),
            api_key_env: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            custom: BTreeMap::new(),
            polish: PolishConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            backoff: policy.backoff.as_str().to_string(),
            initial_delay: policy.initial_delay,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::InvalidAttempts(self.attempts));
        }
        Ok(RetryPolicy {
            attempts: self.attempts,
            backoff: self.backoff.parse::<BackoffKind>()?,
            initial_delay: self.initial_delay,
        })
    }
}

impl Config {
    /// Read and parse a configuration file, then fill defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Parse YAML text; `origin` only labels errors.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::ParseFailed {
                path: origin.to_string(),
                source,
            })?;
        config.apply_defaults();
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it is missing or unusable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No config file found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}. Using default configuration.", e);
                Self::default()
            }
        }
    }

    /// Fill provider-dependent fields left empty in the file.
    pub fn apply_defaults(&mut self) {
        let ai = &mut self.ai;
        if ai.provider.trim().is_empty() {
            ai.provider = DEFAULT_PROVIDER.as_str().to_string();
        }
        if ai.timeout.is_zero() {
            ai.timeout = DEFAULT_TIMEOUT;
        }

        // Unknown providers are left alone for validate() to report.
        if let Ok(kind) = ai.provider.parse::<ProviderKind>() {
            if ai.model.trim().is_empty() {
                ai.model = default_model(kind).to_string();
            }
            if ai.api_key_env.trim().is_empty() {
                ai.api_key_env = default_api_key_env(kind).to_string();
            }
        }
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.ai.provider.parse()
    }

    /// Switch the discovery provider, resetting its key variable and, unless
    /// one is given, its model to that provider's defaults.
    pub fn override_provider(&mut self, provider: ProviderKind, model: Option<String>) {
        self.ai.provider = provider.as_str().to_string();
        self.ai.api_key_env = default_api_key_env(provider).to_string();
        self.ai.model = model.unwrap_or_else(|| default_model(provider).to_string());
    }

    /// Check every field the generation stages depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider_kind()?;
        check_max_tokens(self.ai.max_tokens)?;
        check_temperature(self.ai.temperature)?;
        self.ai.retry.to_policy()?;

        let polish = &self.ai.polish;
        if polish.enabled {
            if !polish.polish_provider.trim().is_empty() {
                polish.polish_provider.parse::<ProviderKind>()?;
            }
            if let Some(max_tokens) = polish.polish_max_tokens {
                check_max_tokens(max_tokens)?;
            }
            if let Some(temperature) = polish.polish_temperature {
                check_temperature(temperature)?;
            }
        }

        Ok(())
    }
}

pub(crate) fn check_max_tokens(max_tokens: u32) -> Result<(), ConfigError> {
    if max_tokens == 0 {
        return Err(ConfigError::InvalidMaxTokens(max_tokens));
    }
    Ok(())
}

pub(crate) fn check_temperature(temperature: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(ConfigError::InvalidTemperature(temperature));
    }
    Ok(())
}
