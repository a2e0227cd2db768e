//! Push Message Codec
//!
//! The push channel carries JSON text frames shaped as an event envelope:
//!
//! ```json
//! {"event": "realtime_update", "data": {"600000": {"RealtimePrice": 9.5, "RealtimeChange": 1.2}}}
//! ```
//!
//! Only `realtime_update` is meaningful to the dashboard; other events are
//! surfaced by name and ignored by the client. In the other direction the
//! client sends `refresh_realtime_data` to ask the server for a fresh push:
//!
//! ```json
//! {"event": "refresh_realtime_data", "data": {"dashboards": ["stock_dashboard"]}}
//! ```

use serde::Deserialize;

use crate::domain::realtime::{PatchError, RealtimePatch};

/// Event name of realtime field updates.
pub const REALTIME_UPDATE_EVENT: &str = "realtime_update";

/// Event name of a client refresh request.
pub const REFRESH_REALTIME_EVENT: &str = "refresh_realtime_data";

/// Errors decoding a push frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame is not a JSON envelope.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// `realtime_update` payload is not a patch.
    #[error("invalid realtime payload: {0}")]
    Patch(#[from] PatchError),

    /// `realtime_update` without a payload.
    #[error("realtime_update frame has no data")]
    MissingData,
}

impl CodecError {
    /// Short reason label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Patch(_) => "payload",
            Self::MissingData => "missing_data",
        }
    }
}

/// A decoded push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    /// Realtime field updates keyed by record id.
    Realtime(RealtimePatch),
    /// Any other event, by name.
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<PushMessage, CodecError> {
    let envelope: Envelope = serde_json::from_str(text.trim())?;
    if envelope.event != REALTIME_UPDATE_EVENT {
        return Ok(PushMessage::Other(envelope.event));
    }
    match envelope.data {
        Some(serde_json::Value::Null) | None => Err(CodecError::MissingData),
        Some(data) => Ok(PushMessage::Realtime(RealtimePatch::from_json(&data)?)),
    }
}

/// Encode a patch as a `realtime_update` frame.
pub fn encode(patch: &RealtimePatch) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&serde_json::json!({
        "event": REALTIME_UPDATE_EVENT,
        "data": patch,
    }))?)
}

/// Encode a refresh request for the given dashboards.
pub fn encode_refresh(dashboards: &[String]) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&serde_json::json!({
        "event": REFRESH_REALTIME_EVENT,
        "data": { "dashboards": dashboards },
    }))?)
}
