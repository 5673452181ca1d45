//! relnotes - CLI entry point.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use relnotes::config::duration::parse_duration;
use relnotes::config::{Config, DEFAULT_CONFIG_PATH};
use relnotes::git::collect_diff;
use relnotes::workflow::{StageReport, Workflow, WorkflowInput, WorkflowResult};
use relnotes::ProviderKind;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "RELNOTES_LOG";

/// Draft release notes with an LLM and optionally polish them with a second one.
#[derive(Parser, Debug)]
#[command(name = "relnotes")]
#[command(about = "Draft and polish release notes with interchangeable LLM providers")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// File containing the discovery prompt (reads stdin when omitted)
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// File containing a system prompt for the discovery stage
    #[arg(long)]
    system_file: Option<PathBuf>,

    /// Provider for the discovery stage (resets model and key variable)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Model for the discovery stage
    #[arg(long)]
    model: Option<String>,

    /// Run the polish stage even if disabled in config
    #[arg(long, conflicts_with = "no_polish")]
    polish: bool,

    /// Skip the polish stage even if enabled in config
    #[arg(long)]
    no_polish: bool,

    /// Diff shown to the polish stage for verification
    #[arg(long, conflicts_with = "since")]
    diff_file: Option<PathBuf>,

    /// Collect the polish diff from this ref to HEAD (default: latest release tag)
    #[arg(long)]
    since: Option<String>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overall deadline, e.g. 90s or 5m (default: worst-case retry budget)
    #[arg(long, value_parser = parse_duration)]
    deadline: Option<Duration>,

    /// Suppress progress and usage output
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn polish_override(&self) -> Option<bool> {
        match (self.polish, self.no_polish) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut config = Config::load_or_default(&cli.config);
    match (cli.provider, cli.model.clone()) {
        (Some(provider), model) => config.override_provider(provider, model),
        (None, Some(model)) => config.ai.model = model,
        (None, None) => {}
    }

    let mut input = WorkflowInput {
        prompt: read_prompt(cli.prompt_file.as_deref())?,
        system_prompt: cli
            .system_file
            .as_deref()
            .map(|path| read_file(path, "system prompt"))
            .transpose()?,
        diff: String::new(),
        polish: cli.polish_override(),
    };

    let workflow = Workflow::new();
    let plan = workflow
        .plan(&config, &input)
        .context("Failed to resolve provider configuration")?;

    if plan.polish.is_some() {
        input.diff = load_diff(&cli)?;
    }

    let cancel = CancellationToken::new();
    let deadline = cli.deadline.unwrap_or_else(|| plan.worst_case_duration());
    debug!(deadline_secs = deadline.as_secs(), "Overall deadline set");
    let watchdog = tokio::spawn(cancel_on_interrupt_or_deadline(cancel.clone(), deadline));

    if !cli.quiet {
        eprintln!(
            "Generating release notes with {} ({})...",
            plan.discovery.config.provider, plan.discovery.config.model
        );
        if let Some(polish) = &plan.polish {
            eprintln!(
                "Polishing with {} ({})...",
                polish.config.provider, polish.config.model
            );
        }
    }

    let outcome = workflow
        .execute(&plan, &config.ai.polish.polish_prompt, &input, &cancel)
        .await;
    watchdog.abort();

    let result = match outcome {
        Ok(result) => result,
        Err(e) if cancel.is_cancelled() => {
            return Err(e).context("Generation was interrupted or exceeded its deadline");
        }
        Err(e) => return Err(e).context("Failed to generate release notes"),
    };

    match &cli.output {
        Some(path) => write_atomic(path, &result.content)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", result.content),
    }

    if !cli.quiet {
        print_usage(&result);
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "relnotes=info,warn",
        (false, _) => "relnotes=debug,info",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel `token` on Ctrl-C or once `deadline` has elapsed.
async fn cancel_on_interrupt_or_deadline(token: CancellationToken, deadline: Duration) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Could not listen for Ctrl-C: {}", e);
                tokio::time::sleep(deadline).await;
            }
        }
        _ = tokio::time::sleep(deadline) => {
            warn!("Deadline of {}s reached, cancelling", deadline.as_secs());
        }
    }
    token.cancel();
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))
}

fn read_prompt(path: Option<&Path>) -> Result<String> {
    let prompt = match path {
        Some(path) => read_file(path, "prompt")?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read prompt from stdin")?;
            buf
        }
    };

    if prompt.trim().is_empty() {
        bail!("Prompt is empty. Pass --prompt-file or pipe a prompt on stdin.");
    }
    Ok(prompt)
}

/// Diff for the polish stage. Git problems degrade to an empty diff.
fn load_diff(cli: &Cli) -> Result<String> {
    if let Some(path) = &cli.diff_file {
        return read_file(path, "diff");
    }

    match collect_diff(Path::new("."), cli.since.as_deref()) {
        Ok(diff) => Ok(diff),
        Err(e) if cli.since.is_some() => Err(e).context("Failed to collect diff"),
        Err(e) => {
            warn!("Could not collect git diff: {}. Polishing without one.", e);
            Ok(String::new())
        }
    }
}

/// Write `content` next to `path` and atomically rename it into place.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut file = NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
    file.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.persist(path)?;
    Ok(())
}

fn print_usage(result: &WorkflowResult) {
    print_stage("discovery", &result.discovery);
    if let Some(polish) = &result.polish {
        print_stage("polish", polish);
        eprintln!(
            "total: {} tokens (estimated cost: ${:.4})",
            result.total_tokens(),
            result.total_cost()
        );
    }
}

fn print_stage(label: &str, report: &StageReport) {
    let mut line = format!(
        "{}: {} ({}), {} tokens",
        label, report.provider, report.model, report.tokens_used
    );
    if report.cost_estimate > 0.0 {
        line.push_str(&format!(" (estimated cost: ${:.4})", report.cost_estimate));
    }
    eprintln!("✓ {}", line);
}
