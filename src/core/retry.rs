//! Retry utilities for transient engine faults
//!
//! Two shapes are provided: `retry_async` re-runs a single operation in place,
//! while `RetryBudget` counts consecutive transient failures across the ticks
//! of a polling loop and reports when the ceiling has been exceeded.

use std::time::Duration;
use tokio::time::sleep;

/// Configurable retry policy for async operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Execute an async operation, retrying while `is_transient` accepts the error
///
/// # Examples
/// ```rust
/// use websecscan::core::retry::{retry_async, RetryPolicy};
///
/// # async fn example() -> Result<String, String> {
/// let result = retry_async(
///     "alert_summary",
///     RetryPolicy::default(),
///     |_err: &String| true,
///     || async { Ok::<String, String>("success".to_string()) },
/// )
/// .await?;
/// # Ok(result)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut, P>(
    operation_name: &str,
    policy: RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if attempt < max_attempts && is_transient(&error) => {
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    policy.delay,
                    error
                );
                sleep(policy.delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Outcome of recording a transient failure against a `RetryBudget`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Still within the ceiling; `failures` consecutive faults so far
    Retry { failures: usize, ceiling: usize },
    /// The ceiling has been exceeded
    Exhausted { failures: usize },
}

/// Counter of consecutive transient failures with a fixed ceiling
///
/// A ceiling of `n` tolerates `n` consecutive failures; failure `n + 1`
/// exhausts the budget. Any success resets the count.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    ceiling: usize,
    consecutive_failures: usize,
}

impl RetryBudget {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            consecutive_failures: 0,
        }
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.consecutive_failures += 1;
        if self.consecutive_failures > self.ceiling {
            RetryDecision::Exhausted {
                failures: self.consecutive_failures,
            }
        } else {
            RetryDecision::Retry {
                failures: self.consecutive_failures,
                ceiling: self.ceiling,
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }
}
