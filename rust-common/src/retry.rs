//! Retry policy implementation with exponential backoff.
//!
//! An operation is attempted at most `max_attempts` times. Only errors whose
//! [`Retryable::is_retryable`] returns true are retried; anything else is
//! returned to the caller immediately.

use crate::Retryable;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (minimum 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Set the total number of attempts (values below 1 are raised to 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the delay after the first failed attempt.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between attempts.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

/// Why a retried operation ultimately failed.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error
    #[error("{0}")]
    Fatal(E),

    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last: E,
    },
}

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let max_attempts = config.max_attempts.max(1);
        Self {
            config: RetryConfig {
                max_attempts,
                ..config
            },
        }
    }

    /// Calculate the delay after the given zero-based attempt failed.
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(exponent);

        if base >= self.config.max_delay.as_secs_f64() {
            return self.config.max_delay;
        }
        Duration::try_from_secs_f64(base).unwrap_or(self.config.max_delay)
    }

    /// Check if an error raised by the given zero-based attempt should be retried.
    #[must_use]
    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        attempt + 1 < self.config.max_attempts && error.is_retryable()
    }

    /// Execute an async operation with retries.
    ///
    /// The closure receives the zero-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Fatal`] for the first non-retryable error, or
    /// [`RetryError::Exhausted`] with the last error once every attempt failed.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.config.max_attempts,
                "Attempting operation"
            );

            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(error) if !error.is_retryable() => return Err(RetryError::Fatal(error)),
                Err(error) if !self.should_retry(&error, attempt) => {
                    warn!(attempts = attempt + 1, error = %error, "Retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt + 1,
                        last: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Get the total number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
