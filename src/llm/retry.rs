//! Configurable retry loop shared by all LLM providers.
//!
//! The loop knows nothing about why an operation failed: every error is
//! retried until the attempt budget runs out. Both the operation and the
//! delay between attempts race the caller's [`CancellationToken`].

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use backoff::backoff::Backoff;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ConfigError, ProviderError};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    /// initial * 2^(attempt-1)
    #[default]
    Exponential,
    /// initial * attempt
    Linear,
    /// initial, every time
    Constant,
}

impl BackoffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackoffKind::Exponential => "exponential",
            BackoffKind::Linear => "linear",
            BackoffKind::Constant => "constant",
        }
    }

    /// Delay to wait after the given (1-indexed) failed attempt.
    pub fn delay(&self, initial: Duration, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            BackoffKind::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                initial.saturating_mul(factor)
            }
            BackoffKind::Linear => initial.saturating_mul(attempt),
            BackoffKind::Constant => initial,
        }
    }
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exponential" => Ok(BackoffKind::Exponential),
            "linear" => Ok(BackoffKind::Linear),
            "constant" => Ok(BackoffKind::Constant),
            _ => Err(ConfigError::UnsupportedBackoff(s.to_string())),
        }
    }
}

/// Attempt budget and delay schedule for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: BackoffKind,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: BackoffKind::Exponential,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(self.initial_delay, attempt)
    }

    /// Sum of every delay the loop can sleep through before giving up.
    pub fn total_delay(&self) -> Duration {
        (1..self.attempts.max(1))
            .map(|attempt| self.delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    fn schedule(&self) -> ScheduledBackoff {
        ScheduledBackoff {
            kind: self.backoff,
            initial: self.initial_delay,
            attempt: 0,
        }
    }
}

/// Deterministic [`Backoff`] that follows a [`BackoffKind`] without jitter.
#[derive(Debug, Clone)]
pub struct ScheduledBackoff {
    kind: BackoffKind,
    initial: Duration,
    attempt: u32,
}

impl Backoff for ScheduledBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        Some(self.kind.delay(self.initial, self.attempt))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Why the retry loop gave up.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("retry cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl From<RetryError<ProviderError>> for ProviderError {
    fn from(err: RetryError<ProviderError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => ProviderError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
            RetryError::Cancelled { attempts } => ProviderError::Cancelled { attempts },
        }
    }
}

/// Retry an async operation according to `policy`.
///
/// `operation` receives the 1-indexed attempt number and is called at most
/// `policy.attempts` times. Cancellation is checked while the operation is
/// in flight and while sleeping; either way the loop returns
/// [`RetryError::Cancelled`] without starting another attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.attempts.max(1);
    let mut backoff = policy.schedule();
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
            result = operation(attempt) => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %error, "All retry attempts failed");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let wait = backoff.next_backoff().unwrap_or(policy.initial_delay);
        warn!(
            attempt,
            max_attempts,
            delay_ms = wait.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct TestError(String);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn policy(attempts: u32, backoff: BackoffKind, initial_secs: u64) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff,
            initial_delay: Duration::from_secs(initial_secs),
        }
    }

    fn secs(delays: &[u64]) -> Vec<Duration> {
        delays.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn exponential_doubles_each_attempt() {
        let p = policy(5, BackoffKind::Exponential, 2);
        let delays: Vec<_> = (1..=4).map(|a| p.delay(a)).collect();
        assert_eq!(delays, secs(&[2, 4, 8, 16]));
    }

    #[test]
    fn linear_grows_by_initial_delay() {
        let p = policy(5, BackoffKind::Linear, 2);
        let delays: Vec<_> = (1..=4).map(|a| p.delay(a)).collect();
        assert_eq!(delays, secs(&[2, 4, 6, 8]));
    }

    #[test]
    fn constant_never_changes() {
        let p = policy(5, BackoffKind::Constant, 2);
        let delays: Vec<_> = (1..=4).map(|a| p.delay(a)).collect();
        assert_eq!(delays, secs(&[2, 2, 2, 2]));
    }

    #[test]
    fn delays_are_non_decreasing_for_every_kind() {
        for kind in [BackoffKind::Exponential, BackoffKind::Linear, BackoffKind::Constant] {
            let p = policy(64, kind, 1);
            for attempt in 1..63 {
                assert!(
                    p.delay(attempt) <= p.delay(attempt + 1),
                    "{kind} delay shrank at attempt {attempt}"
                );
            }
        }
    }

    #[test]
    fn huge_attempt_numbers_saturate_instead_of_overflowing() {
        let p = policy(1000, BackoffKind::Exponential, 2);
        assert!(p.delay(500) >= p.delay(40));
    }

    #[test]
    fn scheduled_backoff_follows_kind_and_resets() {
        let mut schedule = policy(4, BackoffKind::Linear, 1).schedule();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(2)));
        schedule.reset();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn total_delay_sums_gaps_between_attempts() {
        assert_eq!(policy(3, BackoffKind::Exponential, 2).total_delay(), Duration::from_secs(6));
        assert_eq!(policy(4, BackoffKind::Linear, 1).total_delay(), Duration::from_secs(6));
        assert_eq!(policy(1, BackoffKind::Constant, 5).total_delay(), Duration::ZERO);
    }

    #[test]
    fn backoff_kind_parses_known_values_only() {
        assert_eq!("Linear".parse::<BackoffKind>().unwrap(), BackoffKind::Linear);
        let err = "fibonacci".parse::<BackoffKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedBackoff(ref s) if s == "fibonacci"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_first_attempt() {
        let cancel = CancellationToken::new();
        let result: Result<&str, RetryError<TestError>> =
            retry_with_backoff(&RetryPolicy::default(), &cancel, |_| async { Ok("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_runs_exactly_n_attempts() {
        for attempts in [1, 3, 5] {
            let count = Arc::new(AtomicU32::new(0));
            let cancel = CancellationToken::new();

            let result: Result<(), _> = retry_with_backoff(
                &policy(attempts, BackoffKind::Constant, 1),
                &cancel,
                |_| {
                    let c = count.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err(TestError("boom".to_string()))
                    }
                },
            )
            .await;

            let err = result.unwrap_err();
            assert!(matches!(err, RetryError::Exhausted { attempts: n, .. } if n == attempts));
            assert!(err.to_string().contains(&format!("failed after {attempts} attempts")));
            assert!(err.to_string().contains("boom"));
            assert_eq!(count.load(Ordering::SeqCst), attempts);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let cancel = CancellationToken::new();
        let result: Result<u32, RetryError<TestError>> = retry_with_backoff(
            &policy(3, BackoffKind::Exponential, 2),
            &cancel,
            |attempt| async move {
                if attempt < 3 {
                    Err(TestError("transient".to_string()))
                } else {
                    Ok(attempt)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_follow_the_schedule() {
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = retry_with_backoff(
            &policy(3, BackoffKind::Exponential, 2),
            &cancel,
            |_| async { Err(TestError("fail".to_string())) },
        )
        .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_secs(7), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_before_next_attempt() {
        let count = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let result: Result<(), _> = retry_with_backoff(
            &policy(5, BackoffKind::Constant, 10),
            &cancel,
            |_| {
                let c = count.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(TestError("fail".to_string()))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_in_flight_attempt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result: Result<(), RetryError<TestError>> =
            retry_with_backoff(&RetryPolicy::default(), &cancel, |_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_makes_no_attempt() {
        let count = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), RetryError<TestError>> =
            retry_with_backoff(&RetryPolicy::default(), &cancel, |_| {
                let c = count.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_retry_converts_to_provider_error() {
        let err: ProviderError = RetryError::Exhausted {
            attempts: 3,
            last: ProviderError::EmptyCompletion {
                provider: crate::llm::ProviderKind::OpenAI,
            },
        }
        .into();
        assert!(matches!(err, ProviderError::RetriesExhausted { attempts: 3, .. }));
        assert!(matches!(err.root(), ProviderError::EmptyCompletion { .. }));
        assert_eq!(err.to_string(), "failed after 3 attempts: no content in openai response");
    }
}
