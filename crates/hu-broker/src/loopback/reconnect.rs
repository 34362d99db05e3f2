//! Reconnect pacing for the loopback channel
//!
//! adbd needs a moment to reopen its TCP listener after a restart. The
//! backoff is an endless iterator of delays; callers decide how many
//! attempts to make, usually from a wall-clock window.

use std::time::Duration;

use hu_core::config::BackoffConfig;

/// Upper bound on attempts derived from a window
const MAX_ATTEMPTS: u32 = 30;

/// Exponential backoff with additive jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
    /// Fraction of each delay added at random (0.0 to 1.0)
    jitter: f64,
}

impl ExponentialBackoff {
    /// Backoff using the `[loopback.backoff]` settings
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            current: initial.min(max),
            max,
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// How many connection attempts fit in `window`, ignoring jitter.
    ///
    /// Always at least one, never more than 30.
    pub fn attempts_within(&self, window: Duration) -> u32 {
        let mut attempts = 1;
        let mut elapsed = Duration::ZERO;
        let mut delay = self.current;
        while attempts < MAX_ATTEMPTS && elapsed + delay <= window {
            elapsed += delay;
            attempts += 1;
            delay = self.grow(delay);
        }
        attempts
    }

    fn grow(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier).min(self.max)
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        self.current = self.grow(delay);

        let jitter = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        Some(delay + Duration::from_secs_f64(jitter))
    }
}
