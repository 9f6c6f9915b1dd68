//! Bounded retry with exponential backoff for provider calls.

use std::time::Duration;

use tracing::warn;

use crate::ProviderError;

/// How often and how patiently to retry a provider call.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Sleep before the first retry; doubles per retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }
}

/// Run `call` until it succeeds or the attempt budget is exhausted,
/// sleeping `base_delay * 2^n` between attempts. The final error is
/// surfaced unchanged.
pub fn with_backoff<T, F>(policy: &RetryPolicy, mut call: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, ProviderError>,
{
    let attempts = policy.attempts.max(1);
    let mut delay = policy.base_delay;
    let mut last_err = None;

    for attempt in 1..=attempts {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < attempts {
                    warn!(attempt, %err, "provider call failed; retrying");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    delay *= 2;
                }
                last_err = Some(err);
            }
        }
    }
    Err(last_err.expect("at least one attempt ran"))
}
