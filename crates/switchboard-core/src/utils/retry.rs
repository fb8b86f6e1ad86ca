//! Exponential backoff for broker connections
//!
//! A [`Backoff`] describes the delays between attempts; [`retry`] drives a
//! fallible async operation with it. The Redis event bus uses a bounded
//! backoff for the initial connect and an unbounded one for reconnection.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Delay growth factor between consecutive attempts
const GROWTH: u32 = 2;

/// Exponential backoff policy with up to 25% jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failure
    pub first_delay: Duration,
    /// Upper bound for any single delay (before jitter)
    pub max_delay: Duration,
    /// Total attempts; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Whether to spread delays with jitter
    pub jitter: bool,
}

impl Backoff {
    /// Give up after `attempts` tries (at least one)
    #[must_use]
    pub fn bounded(attempts: u32, first_delay: Duration, max_delay: Duration) -> Self {
        Self {
            first_delay,
            max_delay,
            max_attempts: Some(attempts.max(1)),
            jitter: true,
        }
    }

    /// Never give up
    #[must_use]
    pub fn unbounded(first_delay: Duration, max_delay: Duration) -> Self {
        Self {
            first_delay,
            max_delay,
            max_attempts: None,
            jitter: true,
        }
    }

    /// Same policy with exact delays
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Whether another try is allowed after `attempt` tries
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        let delay = self
            .first_delay
            .saturating_mul(GROWTH.saturating_pow(doublings))
            .min(self.max_delay);

        if self.jitter {
            delay + jitter(delay / 4)
        } else {
            delay
        }
    }
}

/// Clock-derived jitter in `[0, max)`
fn jitter(max: Duration) -> Duration {
    let max_nanos = max.as_nanos() as u64;
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or_default();
    Duration::from_nanos(nanos % max_nanos)
}

/// The operation kept failing
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct GaveUp<E> {
    /// Error from the final attempt
    pub last_error: E,
    /// Attempts made
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with an error `is_transient`
/// rejects, or the policy runs out of attempts.
pub async fn retry<T, E, F, Fut, P>(
    policy: &Backoff,
    mut operation: F,
    is_transient: P,
) -> Result<T, GaveUp<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if is_transient(&e) && policy.allows_retry(attempt) => {
                let delay = policy.delay(attempt);
                warn!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(GaveUp {
                    last_error: e,
                    attempts: attempt,
                })
            }
        }
    }
}
