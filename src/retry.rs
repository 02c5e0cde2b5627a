//! Retry logic with linear backoff
//!
//! Transient failures are retried with a wait of `base_delay * (attempt + 1)`
//! between attempts, up to `max_attempts` total attempts. Waits can be
//! interrupted through a [`CancellationToken`].
//!
//! # Example
//!
//! ```no_run
//! use catalog_sync::retry::{Cancelled, IsRetryable, with_retry};
//! use catalog_sync::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Aborted,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! impl From<Cancelled> for MyError {
//!     fn from(_: Cancelled) -> Self {
//!         MyError::Aborted
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! with_retry(&config, &cancel, |_attempt| async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection refused, timeouts, rate limiting) return `true`.
/// Deterministic failures (validation errors, malformed responses) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Marker returned when a retry loop is interrupted by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection problems and timeouts are transient
            Error::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Connection(_) => true,
            Error::RateLimited { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            // Business errors are deterministic; retrying yields the same answer
            Error::RemoteBusiness { .. } | Error::Rejected { .. } => false,
            Error::RateLimitExceeded { .. } => false,
            Error::Protocol(_) => false,
            Error::MissingCategoryMapping { .. }
            | Error::MissingId { .. }
            | Error::ChannelNotFound { .. }
            | Error::Catalog(_) => false,
            Error::Config { .. } => false,
            Error::Cancelled => false,
            Error::Database(_) | Error::Sqlx(_) => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Wait before the retry that follows failed attempt `attempt` (0-based)
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    config
        .base_delay
        .saturating_mul(attempt.saturating_add(1))
        .min(config.max_delay)
}

/// Execute an async operation, retrying transient failures with linear backoff
///
/// The closure receives the 0-based attempt number. At most
/// `config.max_attempts` attempts are made (at least one). When the attempt
/// budget is exhausted, the last error is returned unchanged so callers can
/// decide how to escalate it.
///
/// Cancellation is checked before every attempt and interrupts the backoff
/// sleep; in both cases `E::from(Cancelled)` is returned.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display + From<Cancelled>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(E::from(Cancelled));
        }

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(config, attempt);
                let delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(E::from(Cancelled)),
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
