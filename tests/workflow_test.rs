//! End-to-end two-stage runs against mocked vendor endpoints.
//!
//! Both stages share one wiremock server: the `base_url` override is
//! inherited by the polish stage, and each vendor has its own resource path.

mod common;

use std::time::Duration;

use relnotes::{Config, ConfigError, Stage, Workflow, WorkflowError, WorkflowInput};
use serde_json::{Value, json};
use serial_test::serial;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DISCOVERY_KEY_VAR: &str = "RELNOTES_TEST_DISCOVERY_KEY";
const POLISH_KEY_VAR: &str = "RELNOTES_TEST_POLISH_KEY";

fn two_stage_config(server_uri: &str) -> Config {
    let yaml = format!(
        r#"
ai:
  provider: anthropic
  api_key_env: {DISCOVERY_KEY_VAR}
  max_tokens: 4000
  timeout: 5s
  retry:
    attempts: 3
    backoff: constant
    initial_delay: 5ms
  custom:
    base_url: {server_uri}
  polish:
    enabled: true
    polish_provider: openai
    polish_model: gpt-4o-mini
    polish_api_key_env: {POLISH_KEY_VAR}
    polish_max_tokens: 1000
"#
    );
    Config::parse(&yaml, "test").expect("test config parses")
}

fn input() -> WorkflowInput {
    WorkflowInput {
        prompt: "Summarize the changes since v1.0.0".to_string(),
        system_prompt: None,
        diff: "+pub fn since_flag() {}".to_string(),
        polish: None,
    }
}

fn anthropic_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_1",
        "model": "claude-3-5-haiku-20241022",
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 900, "output_tokens": 100}
    }))
}

fn openai_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini",
        "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 300, "completion_tokens": 80, "total_tokens": 380}
    }))
}

fn plan_with_keys(
    workflow: &Workflow,
    config: &Config,
    input: &WorkflowInput,
    polish_key: Option<&str>,
) -> Result<relnotes::StagePlan, WorkflowError> {
    temp_env::with_vars(
        [
            (DISCOVERY_KEY_VAR, Some("sk-ant-test")),
            (POLISH_KEY_VAR, polish_key),
        ],
        || workflow.plan(config, input),
    )
}

#[tokio::test]
#[serial]
async fn discovery_then_polish_through_two_vendors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .respond_with(anthropic_reply(
            "Here are the release notes:\n\n### Added\n- `--since` flag for diff ranges",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-openai-test"))
        .respond_with(openai_reply("### Added\n- Added a `--since` flag to pick the diff range"))
        .expect(1)
        .mount(&server)
        .await;

    let config = two_stage_config(&server.uri());
    let workflow = Workflow::new();
    let input = input();
    let plan = plan_with_keys(&workflow, &config, &input, Some("sk-openai-test")).unwrap();

    let result = workflow
        .execute(&plan, &config.ai.polish.polish_prompt, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.content,
        "### Added\n- Added a `--since` flag to pick the diff range"
    );
    assert_eq!(result.discovery.tokens_used, 1000);
    assert_eq!(result.polish.as_ref().map(|p| p.tokens_used), Some(380));
    assert_eq!(result.total_tokens(), 1380);

    let requests = server.received_requests().await.unwrap();
    let polish_request = requests
        .iter()
        .find(|r| r.url.path() == "/chat/completions")
        .expect("polish request was sent");
    let body: Value = serde_json::from_slice(&polish_request.body).unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap();

    // The stripped draft is embedded verbatim, along with the diff.
    assert!(prompt.contains("### Added\n- `--since` flag for diff ranges"));
    assert!(!prompt.contains("Here are the release notes"));
    assert!(prompt.contains("+pub fn since_flag() {}"));
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["max_tokens"], 1000);
}

#[tokio::test]
#[serial]
async fn polish_failure_fails_the_run_after_all_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(anthropic_reply("- Draft entry"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "The server had an error", "type": "server_error"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let config = two_stage_config(&server.uri());
    let workflow = Workflow::new();
    let input = input();
    let plan = plan_with_keys(&workflow, &config, &input, Some("sk-openai-test")).unwrap();

    let err = workflow
        .execute(&plan, "", &input, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Polish));
    let message = err.to_string();
    assert!(message.starts_with("polish stage failed"), "{message}");
    assert!(message.contains("failed after 3 attempts"), "{message}");
    assert!(message.contains("The server had an error"), "{message}");
    assert!(!message.contains("Draft entry"));
}

#[tokio::test]
#[serial]
async fn missing_polish_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_reply("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let config = two_stage_config(&server.uri());
    let workflow = Workflow::new();
    let err = plan_with_keys(&workflow, &config, &input(), None).unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Config(ConfigError::MissingApiKey { ref env_var }) if env_var == POLISH_KEY_VAR
    ));
}

#[tokio::test]
#[serial]
async fn unknown_provider_is_rejected_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_reply("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = two_stage_config(&server.uri());
    config.ai.provider = "unknown".to_string();

    let err = Workflow::new()
        .run(&config, &input(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Config(ConfigError::UnsupportedProvider(ref p)) if p == "unknown"
    ));
    assert!(err.stage().is_none());
}

#[tokio::test]
#[serial]
async fn deadline_cancels_a_hanging_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_reply("late").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let config = two_stage_config(&server.uri());
    let workflow = Workflow::new();
    let input = WorkflowInput {
        polish: Some(false),
        ..input()
    };
    let plan = plan_with_keys(&workflow, &config, &input, None).unwrap();
    assert!(plan.polish.is_none());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = workflow.execute(&plan, "", &input, &cancel).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Discovery));
    assert!(matches!(
        err,
        WorkflowError::Stage { ref source, .. } if source.is_cancelled()
    ));
}
