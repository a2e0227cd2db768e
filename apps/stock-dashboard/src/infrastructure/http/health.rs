//! Health and metrics handlers.
//!
//! - `GET /health` - JSON status of the table and the push channel
//! - `GET /healthz` - liveness (simple OK)
//! - `GET /readyz` - ready once the table holds data or push is connected
//! - `GET /metrics` - Prometheus text format

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::push::ConnectionState;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Table status.
    pub table: TableInfo,
    /// Push channel status.
    pub push: PushInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Serving, but the last fetch failed or push is down.
    Degraded,
    /// Push retries exhausted and nothing to show.
    Unhealthy,
}

/// Table status.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    /// Profile name.
    pub page_key: String,
    /// Records in the collection.
    pub records: usize,
    /// Rows passing the filters.
    pub visible: usize,
    /// Error of the last failed fetch.
    pub last_error: Option<String>,
    /// When the collection last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Push channel status.
#[derive(Debug, Clone, Serialize)]
pub struct PushInfo {
    /// Connection state.
    pub state: ConnectionState,
    /// Whether frames are being received.
    pub connected: bool,
    /// Realtime frames received.
    pub messages_received: u64,
    /// Reconnect attempts in the current outage.
    pub reconnect_attempts: u32,
    /// Error that ended the last session.
    pub last_error: Option<String>,
}

// =============================================================================
// HTTP Handlers
// =============================================================================

pub(super) async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    if response.table.records > 0 || response.push.connected {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let table = state.service.with_state(|s| {
        let view = s.view();
        TableInfo {
            page_key: view.page_key,
            records: view.total_records,
            visible: view.total_rows,
            last_error: view.last_error,
            updated_at: view.updated_at,
        }
    });
    let push = PushInfo {
        state: state.push.state(),
        connected: state.push.is_connected(),
        messages_received: state.push.messages_received(),
        reconnect_attempts: state.push.reconnect_attempts(),
        last_error: state.push.last_error(),
    };

    HealthResponse {
        status: determine_health_status(&table, &push),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        table,
        push,
    }
}

fn determine_health_status(table: &TableInfo, push: &PushInfo) -> HealthStatus {
    let push_ok = matches!(
        push.state,
        ConnectionState::Disabled | ConnectionState::Connected
    );
    match (table.last_error.is_none(), push_ok) {
        (true, true) => HealthStatus::Healthy,
        _ if push.state == ConnectionState::Stopped && table.records == 0 => {
            HealthStatus::Unhealthy
        }
        _ => HealthStatus::Degraded,
    }
}

// =============================================================================
// Tests
// =============================================================================
