//! Bounded exponential backoff for idempotent network calls.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MeshError, MeshResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Details of a failed attempt that is about to be retried.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// 1-based number of the attempt that failed.
    pub attempt: u32,

    /// The error the attempt failed with.
    pub error: &'a MeshError,

    /// Wait before the next attempt.
    pub delay: Duration,
}

/// Observer invoked before each retry.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Retry configuration.
#[derive(Clone)]
pub struct RetryOptions {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay after the first failure.
    pub base_delay: Duration,

    /// Upper bound for computed delays. Server hints are not capped.
    pub max_delay: Duration,

    /// Growth factor applied per attempt.
    pub factor: f64,

    /// Called before every retry.
    pub on_retry: Option<RetryObserver>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RetryOptions {
    /// Options that never retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the observer.
    pub fn with_observer(mut self, observer: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Delay before the attempt following failed attempt `attempt` (1-based).
///
/// A retry-after hint on the error replaces the computed delay entirely.
pub fn compute_delay(options: &RetryOptions, attempt: u32, error: &MeshError) -> Duration {
    if let Some(hint) = error.retry_after() {
        return hint;
    }

    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let millis = options.base_delay.as_millis() as f64 * options.factor.powi(exponent);
    let cap = options.max_delay.as_millis() as f64;
    if !millis.is_finite() || millis >= cap {
        return options.max_delay;
    }
    Duration::from_millis(millis.max(0.0) as u64)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts.
///
/// The operation receives the 1-based attempt number. The last error is
/// returned unchanged.
pub async fn with_retry<T, F, Fut>(options: &RetryOptions, mut operation: F) -> MeshResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = MeshResult<T>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.retryable() || attempt >= max_attempts {
            if attempt > 1 {
                tracing::debug!(attempt, "giving up");
            }
            return Err(err);
        }

        let delay = compute_delay(options, attempt, &err);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying"
        );

        if let Some(observer) = &options.on_retry {
            observer(&RetryEvent {
                attempt,
                error: &err,
                delay,
            });
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("factor", &self.factor)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
