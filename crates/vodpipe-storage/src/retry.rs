//! Retry utilities with exponential backoff and jitter.
//!
//! Provides a reusable retry pattern for resilient operations against
//! potentially flaky external services (object stores, upload endpoints).
//! Callers supply a classifier deciding which failures are worth retrying.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// How a failed operation should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; retry with backoff while attempts remain.
    Retryable,
    /// Permanent; propagate immediately without sleeping.
    Fatal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum total attempts (including the initial one).
    pub max_attempts: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Pre-jitter delay after the given failed attempt (1-based).
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`. Strictly increasing
    /// until the cap is reached.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Add bounded random jitter: up to half the computed delay.
    pub fn jittered(&self, delay: Duration) -> Duration {
        let half = delay.as_millis() as u64 / 2;
        if half == 0 {
            return delay;
        }
        let extra = rand::rng().random_range(0..=half);
        delay + Duration::from_millis(extra)
    }
}

/// Error annotated with the number of attempts made.
#[derive(Debug)]
pub struct RetryError<E> {
    pub error: E,
    pub attempts: u32,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempts)", self.error, self.attempts)
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for RetryError<E> {}

/// Execute an async operation with classified retry.
///
/// On failure, `classify` decides whether to back off and retry or to
/// propagate immediately. Either way the returned error carries the number
/// of attempts actually made.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    classify: C,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    C: Fn(&E) -> ErrorClass,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if classify(&e) == ErrorClass::Fatal {
                    debug!(
                        "{} attempt {} failed fatally: {}",
                        config.operation_name, attempt, e
                    );
                    return Err(RetryError { error: e, attempts: attempt });
                }
                if attempt >= config.max_attempts {
                    warn!(
                        "{} failed after {} attempts: {}",
                        config.operation_name, attempt, e
                    );
                    return Err(RetryError { error: e, attempts: attempt });
                }
                let delay = config.jittered(config.delay_for_attempt(attempt));
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
