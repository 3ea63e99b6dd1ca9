//! Bounded retry for idempotent calls and per-call timeouts
//!
//! `list` and `get` go through [`fetch_with_retry`]; `create` and `update`
//! go through [`write_once`], which applies the timeout but never retries,
//! so a slow create can never be duplicated.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;

use super::RemoteError;

/// Retry and timeout settings for remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Applied to every individual call
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, default timeout.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(0.1)
            .with_max_elapsed_time(None)
            .build()
    }

    fn timeout_error(&self) -> RemoteError {
        RemoteError::Timeout {
            millis: u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Run an idempotent call, retrying transient failures with exponential
/// backoff up to `policy.max_attempts` attempts.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut backoff = policy.backoff();
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(policy.timeout_error()),
        };

        match result {
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(e);
                };
                tracing::warn!(
                    call = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient remote failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Run a non-idempotent call exactly once, bounded by the call timeout.
pub async fn write_once<T, Fut>(policy: &RetryPolicy, call: Fut) -> Result<T, RemoteError>
where
    Fut: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(policy.call_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(policy.timeout_error()),
    }
}
