//! Outbound call pacing
//!
//! Two separate concerns live here:
//! - `DelayPolicy`: the randomized pause after every scraping lookup, a
//!   politeness contract towards the scraped sites
//! - `retry_with_jitter`: exponential backoff with full jitter for
//!   transient collaborator failures
//!
//! Both are plain values so tests can substitute zero delays.

use crate::collaborators::CollabResult;
use deckgen_common::config::{GrammarConfig, RetryConfig};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Uniformly random pause between `min` and `max` seconds
///
/// The sampled value snaps to steps of `granularity` seconds (1.0 gives
/// whole seconds, 0.1 one decimal).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayPolicy {
    pub min_secs: f64,
    pub max_secs: f64,
    pub granularity: f64,
}

impl DelayPolicy {
    /// No pause at all
    pub fn none() -> Self {
        Self {
            min_secs: 0.0,
            max_secs: 0.0,
            granularity: 1.0,
        }
    }

    /// Whole seconds between 1 and 5
    pub fn verb_default() -> Self {
        Self {
            min_secs: 1.0,
            max_secs: 5.0,
            granularity: 1.0,
        }
    }

    /// 0.2 to 3.0 seconds in tenths
    pub fn noun_default() -> Self {
        Self {
            min_secs: 0.2,
            max_secs: 3.0,
            granularity: 0.1,
        }
    }

    pub fn verb_from_config(config: &GrammarConfig) -> Self {
        Self {
            min_secs: config.verb_delay_min_secs,
            max_secs: config.verb_delay_max_secs,
            granularity: 1.0,
        }
    }

    pub fn noun_from_config(config: &GrammarConfig) -> Self {
        Self {
            min_secs: config.noun_delay_min_secs,
            max_secs: config.noun_delay_max_secs,
            granularity: 0.1,
        }
    }

    /// Draw one delay
    pub fn sample(&self) -> Duration {
        if self.max_secs <= 0.0 {
            return Duration::ZERO;
        }
        let (low, high) = if self.min_secs <= self.max_secs {
            (self.min_secs.max(0.0), self.max_secs)
        } else {
            (self.max_secs.max(0.0), self.min_secs)
        };

        let raw = if high > low {
            rand::thread_rng().gen_range(low..high)
        } else {
            low
        };

        // Whole seconds truncate, finer steps round to the nearest step
        let secs = if self.granularity >= 1.0 {
            raw.trunc()
        } else if self.granularity > 0.0 {
            (raw / self.granularity).round() * self.granularity
        } else {
            raw
        };

        Duration::from_secs_f64(secs.clamp(low, high))
    }

    /// Sleep for one sampled delay
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Throttling before next lookup");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Retry bounds for transient collaborator errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Upper bound of the backoff window before attempt `attempt + 1`
    fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Run `operation`, retrying transient failures with full-jitter backoff
///
/// Non-transient errors return immediately. After `max_attempts` the last
/// error is returned unchanged.
pub async fn retry_with_jitter<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> CollabResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CollabResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Giving up after transient failures"
                );
                return Err(err);
            }
            Err(err) => {
                let ceiling = policy.ceiling(attempt);
                let delay = jitter(ceiling);
                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn jitter(ceiling: Duration) -> Duration {
    let millis = ceiling.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}
