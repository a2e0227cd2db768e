//! Patch Coalescer
//!
//! Buffers realtime patches between flushes so a burst of push messages
//! costs one merge and one view refresh. Dropping intermediate values is
//! safe because the newest value per key always wins.

use std::time::Duration;

use crate::domain::realtime::RealtimePatch;

/// Default flush interval of the push pipeline.
pub const DEFAULT_COALESCE_INTERVAL: Duration = Duration::from_millis(250);

/// Accumulates patches until drained.
#[derive(Debug, Default)]
pub struct PatchCoalescer {
    buffer: RealtimePatch,
    received: u64,
}

impl PatchCoalescer {
    /// Empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a patch to the buffer.
    pub fn push(&mut self, patch: RealtimePatch) {
        if patch.is_empty() {
            return;
        }
        self.received += 1;
        self.buffer.coalesce(patch);
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Patches folded into the buffer since the last drain.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// Take the buffered patch, if any.
    pub fn drain(&mut self) -> Option<RealtimePatch> {
        if self.buffer.is_empty() {
            return None;
        }
        self.received = 0;
        Some(std::mem::take(&mut self.buffer))
    }
}
