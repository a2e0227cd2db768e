//! Dashboard HTTP Server
//!
//! JSON API for the rendering layer plus health and metrics endpoints.
//!
//! # Endpoints
//!
//! - `GET /api/view` - current render model
//! - `POST /api/fetch`, `/api/refetch` - load records from the backend
//! - `POST /api/records` - add one record by key
//! - `POST /api/records/save` - save the key list to the backend
//! - `POST /api/sort`, `/api/page`, `/api/per-page`, `/api/filter`
//! - `POST /api/fetch/reset` - clear stored state and fetch into a clean table
//! - `POST /api/realtime` - merge a realtime patch
//! - `POST /api/realtime/refresh` - ask the push server for fresh data
//! - `POST /api/records/{key}/pin|hide|delete`, `POST /api/hidden/clear`
//! - `GET /health`, `/healthz`, `/readyz`, `/metrics`

mod api;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::DashboardService;
use crate::infrastructure::push::{PushClient, PushStatus};

pub use api::{
    AddRecordRequest, AddRecordResponse, ApiError, FetchResponse, PageRequest, PatchResponse,
    PerPageRequest, PerPageValue, RefreshResponse, SaveKeysResponse, SortRequest,
};
pub use health::{HealthResponse, HealthStatus};

// =============================================================================
// State
// =============================================================================

/// Shared state of the HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    service: Arc<DashboardService>,
    push: Arc<PushStatus>,
    push_client: Option<Arc<PushClient>>,
    version: String,
    started_at: Instant,
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(service: Arc<DashboardService>, push: Arc<PushStatus>) -> Self {
        Self {
            service,
            push,
            push_client: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    /// Attach the push client used for refresh requests.
    #[must_use]
    pub fn with_push_client(mut self, client: Arc<PushClient>) -> Self {
        self.push_client = Some(client);
        self
    }

    /// Dashboard service.
    #[must_use]
    pub const fn service(&self) -> &Arc<DashboardService> {
        &self.service
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/view", get(api::view))
        .route("/api/fetch", post(api::fetch))
        .route("/api/fetch/reset", post(api::reset_fetch))
        .route("/api/refetch", post(api::refetch))
        .route("/api/records", post(api::add_record))
        .route("/api/records/save", post(api::save_keys))
        .route("/api/records/{key}/pin", post(api::toggle_pin))
        .route("/api/records/{key}/hide", post(api::toggle_hide))
        .route("/api/records/{key}/delete", post(api::delete))
        .route("/api/hidden/clear", post(api::clear_hidden))
        .route("/api/sort", post(api::click_sort))
        .route("/api/page", post(api::change_page))
        .route("/api/per-page", post(api::set_per_page))
        .route("/api/filter", post(api::set_filter))
        .route("/api/realtime", post(api::apply_patch))
        .route("/api/realtime/refresh", post(api::request_refresh))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// Dashboard HTTP server.
pub struct HttpServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the server stops with an error.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
