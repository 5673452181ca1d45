//! Two-stage generation: discovery, then an optional polish pass.
//!
//! Discovery turns the caller's prompt into a draft. When polish is enabled
//! the draft is embedded verbatim in a rewording prompt and sent to a second,
//! independently configured provider whose output becomes the result. A
//! failed polish fails the whole run; the draft is never returned in its place.

pub mod discovery;
pub mod polish;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, ResolvedStage, StagePlan, plan_stages};
use crate::error::{ProviderError, Stage, WorkflowError};
use crate::llm::{DefaultFactory, Provider, ProviderFactory, ProviderKind, Request, Response};

pub use discovery::strip_framing_headers;
pub use polish::{DEFAULT_POLISH_PROMPT, build_polish_prompt};

/// Caller-supplied material for one run.
#[derive(Debug, Clone, Default)]
pub struct WorkflowInput {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Verification material for the polish prompt's `{diff}`.
    pub diff: String,
    /// Overrides `ai.polish.enabled` when set.
    pub polish: Option<bool>,
}

impl WorkflowInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn polish_enabled(&self, config: &Config) -> bool {
        self.polish.unwrap_or(config.ai.polish.enabled)
    }
}

/// Usage figures for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub provider: ProviderKind,
    pub model: String,
    pub tokens_used: u64,
    pub cost_estimate: f64,
}

impl From<&Response> for StageReport {
    fn from(response: &Response) -> Self {
        Self {
            provider: response.provider,
            model: response.model.clone(),
            tokens_used: response.tokens_used,
            cost_estimate: response.cost_estimate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub content: String,
    pub discovery: StageReport,
    pub polish: Option<StageReport>,
}

impl WorkflowResult {
    pub fn total_tokens(&self) -> u64 {
        self.discovery.tokens_used + self.polish.as_ref().map_or(0, |p| p.tokens_used)
    }

    pub fn total_cost(&self) -> f64 {
        self.discovery.cost_estimate + self.polish.as_ref().map_or(0.0, |p| p.cost_estimate)
    }
}

/// Drives both stages using providers built by `F`.
#[derive(Debug, Clone, Default)]
pub struct Workflow<F = DefaultFactory> {
    factory: F,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: ProviderFactory> Workflow<F> {
    pub fn with_factory(factory: F) -> Self {
        Self { factory }
    }

    /// Validate `config` and resolve both stages, keys included.
    pub fn plan(&self, config: &Config, input: &WorkflowInput) -> Result<StagePlan, WorkflowError> {
        config.validate()?;
        Ok(plan_stages(config, input.polish_enabled(config))?)
    }

    /// Validate, plan and execute in one call.
    pub async fn run(
        &self,
        config: &Config,
        input: &WorkflowInput,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let plan = self.plan(config, input)?;
        self.execute(&plan, &config.ai.polish.polish_prompt, input, cancel)
            .await
    }

    /// Run a previously resolved plan.
    ///
    /// Both providers are built before the first request, so a bad polish
    /// configuration never costs a discovery call.
    pub async fn execute(
        &self,
        plan: &StagePlan,
        polish_template: &str,
        input: &WorkflowInput,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let discovery_provider = self.build(Stage::Discovery, &plan.discovery)?;
        let polish_provider = match &plan.polish {
            Some(resolved) => Some((resolved, self.build(Stage::Polish, resolved)?)),
            None => None,
        };

        info!(
            provider = discovery_provider.name(),
            model = %plan.discovery.config.model,
            "Running discovery stage"
        );
        let mut request = Request::from_config(&plan.discovery.config, input.prompt.as_str());
        if let Some(system) = &input.system_prompt {
            request = request.with_system_prompt(system.as_str());
        }
        let draft = discovery_provider
            .generate(cancel, &request)
            .await
            .map_err(|source| WorkflowError::Stage {
                stage: Stage::Discovery,
                source,
            })?;

        let content = strip_framing_headers(&draft.content);
        let discovery = StageReport::from(&draft);
        info!(tokens = draft.tokens_used, "Discovery stage complete");

        let Some((stage, provider)) = polish_provider else {
            return Ok(WorkflowResult {
                content,
                discovery,
                polish: None,
            });
        };

        info!(
            provider = provider.name(),
            model = %stage.config.model,
            "Running polish stage"
        );
        let prompt = build_polish_prompt(polish_template, &content, &input.diff);
        let request = Request::from_config(&stage.config, prompt);
        let polished = provider
            .generate(cancel, &request)
            .await
            .map_err(|source| WorkflowError::Stage {
                stage: Stage::Polish,
                source,
            })?;
        info!(tokens = polished.tokens_used, "Polish stage complete");

        Ok(WorkflowResult {
            polish: Some(StageReport::from(&polished)),
            content: polished.content,
            discovery,
        })
    }

    fn build(&self, stage: Stage, resolved: &ResolvedStage) -> Result<Box<dyn Provider>, WorkflowError> {
        self.factory
            .create(&resolved.config, resolved.api_key.clone())
            .map_err(|e| WorkflowError::Stage {
                stage,
                source: ProviderError::Config(e),
            })
    }
}
