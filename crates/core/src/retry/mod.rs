//! Retry and deadline helpers for fallible async operations.
//!
//! Used by the task store to bound persistence I/O so a slow or momentarily
//! locked filesystem cannot hang a task update indefinitely.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Policy for retrying a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// No retries - fail immediately.
    None,

    /// Fixed delay between retries.
    Fixed {
        /// Maximum number of attempts (including the first).
        max_attempts: u32,
        /// Delay between attempts.
        delay: Duration,
    },

    /// Exponential backoff between retries.
    Exponential {
        /// Maximum number of attempts (including the first).
        max_attempts: u32,
        /// Initial delay (doubles each attempt).
        initial_delay: Duration,
        /// Maximum delay cap.
        max_delay: Duration,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::None
    }
}

impl RetryPolicy {
    /// Create a fixed delay policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Create an exponential backoff policy with sensible defaults.
    ///
    /// - Initial delay: 100 milliseconds
    /// - Max delay: 30 seconds
    pub fn exponential(max_attempts: u32) -> Self {
        Self::Exponential {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Returns the maximum number of attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => (*max_attempts).max(1),
            Self::Exponential { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Calculate the delay to sleep after a failed attempt (1-indexed).
    ///
    /// Returns `None` when the attempt budget is exhausted.
    pub fn delay_after_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            return None;
        }
        match self {
            Self::None => None,
            Self::Fixed { delay, .. } => Some(*delay),
            Self::Exponential {
                initial_delay,
                max_delay,
                ..
            } => {
                // 2^(attempt-1) * initial_delay, capped at max_delay
                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1));
                let delay_ms = (initial_delay.as_millis() as u64).saturating_mul(multiplier);
                Some(Duration::from_millis(
                    delay_ms.min(max_delay.as_millis() as u64),
                ))
            }
        }
    }
}

/// Run `op` under the given policy, sleeping the policy delay between failed
/// attempts. The last error is returned once the attempt budget is exhausted.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => match policy.delay_after_attempt(attempt) {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
        }
    }
}

/// Bound a future with a deadline.
///
/// Thin wrapper over `tokio::time::timeout` so call sites read uniformly
/// with [`retry`].
pub async fn with_deadline<Fut, T>(limit: Duration, fut: Fut) -> Result<T, Elapsed>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await
}
