//! Retry policy for transient failures.
//!
//! The policy is a pure function of the attempt number and the client configuration:
//! it holds no counters of its own, so one policy value can serve any number of
//! concurrent calls.

use crate::config::ClientConfig;
use crate::Error;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with an attempt cap.
///
/// # Examples
///
/// ```
/// use palaver::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // 100ms, 200ms, 400ms, then capped at 500ms
/// let policy = RetryPolicy {
///     max_retries: 4,
///     base_delay: Duration::from_millis(100),
///     max_delay: Duration::from_millis(500),
///     jitter: false,
/// };
/// assert_eq!(policy.delay_for(2), Duration::from_millis(400));
/// assert_eq!(policy.delay_for(3), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Whether to scale each delay by a uniform random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
        }
    }
}

/// Whether to issue another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The failure is terminal.
    None,
    /// Retry after waiting this long.
    After(Duration),
}

/// One execution of a request within a call.
///
/// `T` is whatever a successful attempt produced; the policy only looks at failures.
#[derive(Debug)]
pub struct Attempt<T = ()> {
    /// Zero-based sequence number within the call.
    pub number: u32,
    /// Backoff waited before this attempt was issued.
    pub backoff: Duration,
    /// How the attempt ended.
    pub outcome: std::result::Result<T, Error>,
}

impl Attempt {
    /// Records a failed attempt.
    pub fn failed(number: u32, backoff: Duration, error: Error) -> Self {
        Self {
            number,
            backoff,
            outcome: Err(error),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before retrying after attempt `number` (zero-based).
    ///
    /// `base_delay * 2^number`, capped at `max_delay`.
    pub fn delay_for(&self, number: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(number);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Decides whether `attempt` should be followed by another one.
    ///
    /// Only retryable errors (see [`Error::is_retryable`]) are retried, and only while
    /// `attempt.number < max_retries`. With `max_retries = R` a call makes at most `R + 1`
    /// attempts.
    pub fn decide<T>(&self, attempt: &Attempt<T>) -> RetryDecision {
        let Err(error) = &attempt.outcome else {
            return RetryDecision::None;
        };
        if !error.is_retryable() || attempt.number >= self.max_retries {
            return RetryDecision::None;
        }

        let delay = self.delay_for(attempt.number);
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            RetryDecision::After(delay.mul_f64(factor))
        } else {
            RetryDecision::After(delay)
        }
    }
}
