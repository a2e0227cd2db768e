//! Realtime Push Channel
//!
//! WebSocket client for `realtime_update` events and the pipeline that
//! coalesces them into the dashboard.

/// Push client connection loop.
pub mod client;

/// Push frame codec.
pub mod codec;

/// Coalescing merge loop.
pub mod pipeline;

/// Reconnection backoff.
pub mod reconnect;

/// Shared connection status.
pub mod status;

pub use client::{PushClient, PushClientError};
pub use codec::{CodecError, PushMessage};
pub use pipeline::PatchPipeline;
pub use reconnect::{Backoff, BackoffConfig};
pub use status::{ConnectionState, PushStatus};
