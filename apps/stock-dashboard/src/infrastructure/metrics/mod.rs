//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Fetches**: Backend fetches by outcome and their latency
//! - **Realtime**: Push patches received and records changed
//! - **Table**: Record and visible row counts
//! - **Persistence**: Snapshot saves by outcome
//! - **Push channel**: Reconnection attempts and connection state
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Calling it again returns the already installed handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Fetches
    describe_counter!(
        "stock_dashboard_fetches_total",
        "Total record fetches by outcome"
    );
    describe_histogram!(
        "stock_dashboard_fetch_duration_seconds",
        "Time to fetch records from the backend"
    );

    // Realtime
    describe_counter!(
        "stock_dashboard_patches_received_total",
        "Total realtime patches received from the push channel"
    );
    describe_counter!(
        "stock_dashboard_patches_applied_total",
        "Total coalesced patches merged into the table"
    );
    describe_counter!(
        "stock_dashboard_patches_rejected_total",
        "Total push messages that could not be decoded"
    );

    // Table
    describe_gauge!(
        "stock_dashboard_records",
        "Records in the collection"
    );
    describe_gauge!(
        "stock_dashboard_visible_rows",
        "Rows passing the active filters"
    );

    // Persistence
    describe_counter!(
        "stock_dashboard_snapshot_saves_total",
        "Total snapshot saves by outcome"
    );

    // Push channel
    describe_gauge!(
        "stock_dashboard_push_connected",
        "Whether the push channel is connected (1) or not (0)"
    );
    describe_counter!(
        "stock_dashboard_push_reconnects_total",
        "Total push channel reconnection attempts"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for fetch outcomes.
#[derive(Debug, Clone, Copy)]
pub enum FetchResult {
    /// Response applied to the table.
    Applied,
    /// Response superseded by a newer fetch.
    Stale,
    /// Fetch failed; table reset.
    Failed,
}

impl FetchResult {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Stale => "stale",
            Self::Failed => "failed",
        }
    }
}

/// Record a completed fetch.
pub fn record_fetch(result: FetchResult, duration: Duration) {
    counter!(
        "stock_dashboard_fetches_total",
        "result" => result.as_str()
    )
    .increment(1);
    histogram!("stock_dashboard_fetch_duration_seconds").record(duration.as_secs_f64());
}

/// Record a patch received from the push channel.
pub fn record_patch_received() {
    counter!("stock_dashboard_patches_received_total").increment(1);
}

/// Record a coalesced patch merged into the table.
pub fn record_patch_applied(changed: bool) {
    counter!(
        "stock_dashboard_patches_applied_total",
        "changed" => if changed { "true" } else { "false" }
    )
    .increment(1);
}

/// Record an undecodable push message.
pub fn record_patch_rejected(reason: &'static str) {
    counter!(
        "stock_dashboard_patches_rejected_total",
        "reason" => reason
    )
    .increment(1);
}

/// Update table size gauges.
pub fn set_table_size(records: usize, visible: usize) {
    gauge!("stock_dashboard_records").set(records as f64);
    gauge!("stock_dashboard_visible_rows").set(visible as f64);
}

/// Record a snapshot save attempt.
pub fn record_snapshot_save(success: bool) {
    counter!(
        "stock_dashboard_snapshot_saves_total",
        "result" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

/// Update the push channel connection state.
pub fn set_push_connected(connected: bool) {
    gauge!("stock_dashboard_push_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a push channel reconnection attempt.
pub fn record_push_reconnect() {
    counter!("stock_dashboard_push_reconnects_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
