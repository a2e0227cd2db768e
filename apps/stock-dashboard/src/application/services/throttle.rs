//! Save Throttle
//!
//! Leading-edge rate limiter for snapshot saves triggered by realtime
//! traffic. The first call in a window fires immediately; calls inside the
//! window only mark a save as pending, which is flushed once the window has
//! elapsed so the latest state is never lost.

use std::time::{Duration, Instant};

/// Default minimum spacing between throttled saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Leading-edge throttle with a pending trailing flag.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_fired: Option<Instant>,
    pending: bool,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_INTERVAL)
    }
}

impl Throttle {
    /// Create a throttle firing at most once per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
            pending: false,
        }
    }

    /// Minimum spacing between fires.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a call was suppressed and not yet flushed.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        self.last_fired
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Request a fire at `now`. Returns whether the caller should act.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.window_elapsed(now) {
            self.last_fired = Some(now);
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Fire a pending call once its window has elapsed.
    pub fn take_pending(&mut self, now: Instant) -> bool {
        if self.pending && self.window_elapsed(now) {
            self.last_fired = Some(now);
            self.pending = false;
            true
        } else {
            false
        }
    }

    /// Time until the next call would fire.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last_fired.map_or(Duration::ZERO, |last| {
            self.interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }
}
