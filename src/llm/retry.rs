//! Bounded retry policy with enumerated backoff and jitter.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth of the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Exponential { multiplier: f64 },
}

/// Randomization applied to a computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Jitter {
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay * (1 - factor), delay]`.
    Proportional { factor: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential { multiplier: 2.0 },
            jitter: Jitter::Proportional { factor: 0.25 },
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits; used in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            jitter: Jitter::None,
        }
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.max(1)
    }

    /// Delay after the `failed_attempts`-th failure, with jitter drawn from
    /// `unit` in `[0, 1)`.
    ///
    /// Pure: the same inputs always give the same delay.
    pub fn delay_for(&self, failed_attempts: u32, unit: f64) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let raw = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential { multiplier } => {
                base * multiplier.max(1.0).powi(failed_attempts.saturating_sub(1) as i32)
            }
        };
        let capped = raw.min(self.max_delay.as_secs_f64());
        let unit = unit.clamp(0.0, 1.0);

        let jittered = match self.jitter {
            Jitter::None => capped,
            Jitter::Full => capped * unit,
            Jitter::Proportional { factor } => capped * (1.0 - factor.clamp(0.0, 1.0) * unit),
        };
        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Delay with a random jitter draw.
    pub fn next_delay(&self, failed_attempts: u32) -> Duration {
        let unit = rand::rng().random::<f64>();
        self.delay_for(failed_attempts, unit)
    }
}
