//! Retry with exponential backoff for transient errors
//!
//! Applies only to idempotent operations; the resilience facade decides
//! whether an operation qualifies. Non-transient errors stop immediately.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::ProviderError;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one (1 disables retries)
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_interval: Duration,

    /// Maximum backoff duration
    pub max_interval: Duration,

    /// Multiplier for backoff between retries
    pub multiplier: f64,

    /// Jitter applied to each interval (0.0-1.0)
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
            randomization_factor: 0.2,
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_attempts: {}, initial_interval: {:?}, max_interval: {:?}, multiplier: {} }}",
            self.max_attempts, self.initial_interval, self.max_interval, self.multiplier
        )
    }
}

/// A value (or error) together with how many attempts produced it
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            current_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            multiplier: self.config.multiplier,
            randomization_factor: self.config.randomization_factor,
            // The caller's deadline bounds the whole chain
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Run the operation, retrying transient failures up to `max_attempts`
    pub async fn execute<F, Fut, T>(
        &self,
        mut operation: F,
    ) -> std::result::Result<Attempted<T>, Attempted<ProviderError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match operation().await {
                Ok(value) => return Ok(Attempted { value, attempts }),
                Err(err) if err.is_transient() && attempts < max_attempts => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.config.max_interval)
                        .min(self.config.max_interval);

                    log::warn!(
                        "Operation failed with transient error, retrying in {:?} (attempt {}/{}): {}",
                        delay,
                        attempts,
                        max_attempts,
                        err
                    );

                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(Attempted { value: err, attempts }),
            }
        }
    }

    /// Run the operation exactly once
    pub async fn execute_once<F, Fut, T>(
        &self,
        operation: F,
    ) -> std::result::Result<Attempted<T>, Attempted<ProviderError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        match operation().await {
            Ok(value) => Ok(Attempted { value, attempts: 1 }),
            Err(err) => Err(Attempted { value: err, attempts: 1 }),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
