//! Automatic retry with exponential backoff and jitter.
//!
//! Every failure is classified into a [`FailureKind`]. Kinds listed in
//! [`RetryConfig::retry_on`] (by default rate limits, 5xx responses and
//! connection failures) are retried with exponential backoff; any other kind
//! is returned immediately as [`RetryError::Fatal`] without consuming further
//! attempts. A malformed request or a rejected API key never gets retried.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The remote side asked us to slow down (HTTP 429).
    RateLimited,
    /// The remote side failed or is overloaded (HTTP 5xx, 529).
    ServerError,
    /// The request never got a response (DNS, reset, timeout).
    Connection,
    /// The request itself was rejected (HTTP 4xx other than 429).
    Client,
    /// Anything else.
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RateLimited => write!(f, "rate_limited"),
            FailureKind::ServerError => write!(f, "server_error"),
            FailureKind::Connection => write!(f, "connection"),
            FailureKind::Client => write!(f, "client"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// Errors that can tell the executor which [`FailureKind`] they belong to.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

/// Failure returned by [`retry_with_backoff`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Every allowed attempt failed with a retryable error.
    #[error("failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: E,
    },
    /// A non-retryable error, passed through untouched.
    #[error(transparent)]
    Fatal(E),
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Whether the attempts ran out (as opposed to a fatal failure).
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The last underlying error, whichever way the executor gave up.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Fatal(e) => e,
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries. Total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay, jitter included.
    pub max_delay: Duration,
    /// Scale each delay by a random factor in `[0.5, 1.5)`.
    pub jitter: bool,
    /// Failure kinds treated as transient.
    pub retry_on: Vec<FailureKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
            retry_on: vec![
                FailureKind::RateLimited,
                FailureKind::ServerError,
                FailureKind::Connection,
            ],
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries and default delays.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// A config that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self::with_retries(0)
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the set of retryable failure kinds.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        self.retry_on.contains(&kind)
    }

    /// `min(base_delay * 2^attempt, max_delay)` for a 0-indexed attempt.
    ///
    /// The exponential term saturates instead of overflowing, so large
    /// attempt numbers simply land on `max_delay`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// The delay to sleep after a failed 0-indexed attempt, with jitter
    /// applied when enabled. Never exceeds `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self.backoff_ceiling(attempt);
        if !self.jitter {
            return capped;
        }
        let factor: f64 = rand::rng().random_range(0.5..1.5);
        Duration::try_from_secs_f64(capped.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails fatally, or runs out of attempts.
///
/// The operation is invoked at most `config.max_retries + 1` times. Between
/// attempts the calling task sleeps for [`RetryConfig::delay_for_attempt`].
/// Dropping the returned future abandons any remaining attempts.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + std::error::Error + 'static,
{
    let total_attempts = config.max_retries.saturating_add(1);
    let mut attempt: u32 = 0;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let kind = error.failure_kind();
        if !config.is_retryable(kind) {
            debug!(
                "Non-retryable {kind} failure on attempt {}: {error}",
                attempt.saturating_add(1)
            );
            return Err(RetryError::Fatal(error));
        }

        if attempt >= config.max_retries {
            return Err(RetryError::Exhausted {
                attempts: attempt.saturating_add(1),
                last_error: error,
            });
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:.1}s",
            attempt + 1,
            total_attempts,
            preview(&error.to_string(), 100),
            delay.as_secs_f64(),
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
