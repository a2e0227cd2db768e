//! Push Reconnection Backoff
//!
//! Exponential backoff with jitter for the realtime push channel. The
//! attempt budget is shared across one outage and reset once a connection
//! is established again.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::PushSettings;

/// Default jitter applied to every delay (±10%).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay.
    pub jitter_factor: f64,
    /// Retries allowed per outage (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::from_settings(&PushSettings::default())
    }
}

impl BackoffConfig {
    /// Build from push settings.
    #[must_use]
    pub const fn from_settings(settings: &PushSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Same parameters without jitter.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }
}

/// Stateful backoff over one outage.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    /// Fresh backoff.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let next = config.initial_delay;
        Self {
            config,
            next,
            attempts: 0,
        }
    }

    /// Delay before the next retry, or `None` once the budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        let delay = self.jittered(self.next.min(self.config.max_delay));
        self.next = self.grow(self.next);
        Some(delay)
    }

    /// Forget the outage after a successful connect.
    pub const fn reset(&mut self) {
        self.next = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Retries handed out in this outage.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the attempt budget is spent.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts
    }

    fn grow(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.config.multiplier;
        if !scaled.is_finite() || scaled <= 0.0 {
            return self.config.initial_delay;
        }
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }
        let base = delay.as_secs_f64();
        let spread = base * self.config.jitter_factor;
        let offset: f64 = rand::rng().random_range(-spread..=spread);
        Duration::try_from_secs_f64((base + offset).max(0.001)).unwrap_or(delay)
    }
}
