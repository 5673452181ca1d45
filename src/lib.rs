//! relnotes - drafts and polishes release notes through interchangeable LLM providers.
//!
//! # Overview
//!
//! A caller-supplied prompt is sent to one of six LLM services (Anthropic,
//! OpenAI, Cerebras, Groq, OpenRouter or a local Ollama) with bounded,
//! cancellable retries. An optional second pass rewords the draft with an
//! independently configured provider, checked against the git diff.

pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, ProviderConfig, StagePlan};
pub use error::{ConfigError, GitError, ProviderError, Stage, WorkflowError};
pub use llm::{BackoffKind, Provider, ProviderKind, Request, Response, RetryPolicy};
pub use workflow::{Workflow, WorkflowInput, WorkflowResult};
