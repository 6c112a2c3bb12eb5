//! Retry of transient backend failures with capped exponential backoff.
//!
//! Every attempt and every backoff sleep races the caller's cancellation
//! token, so an unlimited retry budget still returns promptly on shutdown or
//! client disconnect.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::BackendError;

/// Retry and timeout settings for backend commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `None` retries until cancelled.
    pub max_retries: Option<u32>,
    /// Deadline for a single attempt.
    pub command_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            command_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(50),
            backoff_max: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Backoff before retry number `attempt` (1-based):
    /// `min(backoff_base * 2^(attempt-1), backoff_max)`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.backoff_base.saturating_mul(multiplier);
        std::cmp::min(delay, self.backoff_max)
    }

    fn allows_retry(&self, retries_so_far: u32) -> bool {
        self.max_retries.is_none_or(|max| retries_so_far < max)
    }
}

/// Run `attempt` until it succeeds, fails permanently, runs out of retries,
/// or `cancel` fires.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op: &'static str,
    mut attempt: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut retries: u32 = 0;
    loop {
        // select! builds every branch future up front, so check before calling attempt().
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            r = tokio::time::timeout(policy.command_timeout, attempt()) => {
                r.unwrap_or(Err(BackendError::Timeout))
            }
        };

        match result {
            Err(e) if e.is_transient() && policy.allows_retry(retries) => {
                retries += 1;
                let delay = policy.backoff_for_attempt(retries);
                tracing::warn!(op, retries, error = %e, ?delay, "transient backend error, retrying");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                if retries > 0 {
                    tracing::error!(op, retries, error = %e, "backend command failed");
                }
                return Err(e);
            }
            ok => return ok,
        }
    }
}
