//! Error types for relnotes modules using thiserror.

use std::fmt;

use thiserror::Error;

use crate::llm::ProviderKind;

/// Configuration problems. Always fatal and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Unsupported AI provider: '{0}' (supported: anthropic, openai, cerebras, groq, openrouter, ollama)"
    )]
    UnsupportedProvider(String),

    #[error("Unsupported backoff strategy: '{0}' (supported: exponential, linear, constant)")]
    UnsupportedBackoff(String),

    #[error("API key not found in environment variable: {env_var}")]
    MissingApiKey { env_var: String },

    #[error("{provider} API key is not set")]
    EmptyApiKey { provider: ProviderKind },

    #[error("{provider} model is not specified")]
    EmptyModel { provider: ProviderKind },

    #[error("max_tokens must be positive, got: {0}")]
    InvalidMaxTokens(u32),

    #[error("temperature must be between 0 and 1, got: {0:.2}")]
    InvalidTemperature(f64),

    #[error("retry attempts must be positive, got: {0}")]
    InvalidAttempts(u32),

    #[error("Invalid duration '{0}' (expected e.g. 500ms, 2s, 1h 30m or whole seconds)")]
    InvalidDuration(String),

    #[error("Invalid value for HTTP header '{name}'")]
    InvalidHeader { name: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from a single provider generation call.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to send request to {provider}: {source}")]
    Network {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("{provider} API error (status {status}): {body}")]
    Status {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("failed to parse {provider} response: {source}")]
    InvalidResponse {
        provider: ProviderKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("no content in {provider} response")]
    EmptyCompletion { provider: ProviderKind },

    #[error("failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ProviderError>,
    },

    #[error("request cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl ProviderError {
    /// True when the caller's cancellation token or deadline stopped the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled { .. })
    }

    /// The innermost error, unwrapping retry exhaustion.
    pub fn root(&self) -> &ProviderError {
        match self {
            ProviderError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Which generation pass an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Polish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discovery => f.write_str("discovery"),
            Stage::Polish => f.write_str("polish"),
        }
    }
}

/// Errors from the two-stage generation workflow.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: ProviderError,
    },
}

impl WorkflowError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkflowError::Config(_) => None,
            WorkflowError::Stage { stage, .. } => Some(*stage),
        }
    }
}

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to find reference '{0}': {1}")]
    ReferenceNotFound(String, #[source] git2::Error),

    #[error("Failed to parse commit: {0}")]
    ParseCommit(#[source] git2::Error),

    #[error("Failed to walk commit history: {0}")]
    RevwalkError(#[source] git2::Error),

    #[error("Failed to collect diff: {0}")]
    DiffFailed(#[source] git2::Error),
}
