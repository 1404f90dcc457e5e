//! Bounded retry with backoff around a single transport call.
//!
//! # Design
//! - Only transient failures (connection, timeout) are retried; application failures
//!   return on the first attempt.
//! - The delay before retry `n` is `unit * base^2 * n`.
//! - Every attempt runs under its own deadline; an expired deadline counts as a timeout.

use std::future::Future;
use std::time::Duration;

use ferry_core::TransportError;
use tracing::warn;

/// Default number of retries after the first call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff base.
pub const DEFAULT_BACKOFF_BASE: u32 = 2;
/// Default backoff unit.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry policy applied to every transport call of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryGovernor {
    max_retries: u32,
    backoff_base: u32,
    backoff_unit: Duration,
    call_timeout: Duration,
}

impl Default for RetryGovernor {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RetryGovernor {
    /// Build a governor from explicit limits.
    #[must_use]
    pub const fn new(
        max_retries: u32,
        backoff_base: u32,
        backoff_unit: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            max_retries,
            backoff_base,
            backoff_unit,
            call_timeout,
        }
    }

    /// Governor that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_UNIT, DEFAULT_CALL_TIMEOUT)
    }

    /// Retries allowed after the first call.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total calls issued before a transient failure is surfaced.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Per-call deadline.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Delay slept before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_base.saturating_pow(2).saturating_mul(retry);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Run `call` until it succeeds, fails non-transiently, or the retries run out.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient error once every
    /// retry has been spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut retry = 0;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Timeout {
                    detail: format!(
                        "no response within {}ms",
                        self.call_timeout.as_millis()
                    ),
                }),
            };
            match outcome {
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        operation,
                        attempt = retry,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient transport failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
