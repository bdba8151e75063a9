//! Retry with exponential backoff for retriable classified errors

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::{ClassifiedError, Result};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_interval: Duration,

    /// Maximum backoff duration
    pub max_interval: Duration,

    /// Multiplier for backoff between retries
    pub multiplier: f64,

    /// Whether to add randomization to backoff intervals
    pub randomization_factor: f64,

    /// Maximum total time to spend retrying
    pub max_elapsed_time: Option<Duration>,

    /// Longest provider cooldown worth waiting for
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            randomization_factor: 0.2,
            max_elapsed_time: Some(Duration::from_secs(120)),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: self.max_elapsed_time,
            ..ExponentialBackoff::default()
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryPolicy {{ max_retries: {}, initial_interval: {:?}, max_interval: {:?}, multiplier: {} }}",
            self.max_retries, self.initial_interval, self.max_interval, self.multiplier
        )
    }
}

/// Run `operation`, retrying while it fails with a retriable error.
///
/// The wait before each retry is the backoff interval, or the error's
/// `retry_after` when that is longer. A cooldown above `max_retry_after`
/// ends the loop with the error.
pub async fn retry_classified<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.retriable || attempts >= policy.max_retries {
            return Err(err);
        }

        let Some(wait) = next_wait(&mut backoff, &err, policy) else {
            return Err(err);
        };

        attempts += 1;
        log::warn!(
            "Retriable {} error, retrying in {:?} (attempt {}/{}): {}",
            err.kind.code(),
            wait,
            attempts,
            policy.max_retries,
            err.message
        );
        tokio::time::sleep(wait).await;
    }
}

fn next_wait(
    backoff: &mut ExponentialBackoff,
    err: &ClassifiedError,
    policy: &RetryPolicy,
) -> Option<Duration> {
    let interval = backoff.next_backoff()?;

    match err.retry_after {
        Some(cooldown) if cooldown > policy.max_retry_after => None,
        Some(cooldown) => Some(cooldown.max(interval)),
        None => Some(interval),
    }
}
