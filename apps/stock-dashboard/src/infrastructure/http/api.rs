//! Dashboard API handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::application::ports::{FetchQuery, SourceError};
use crate::application::services::{DashboardError, DashboardView};
use crate::domain::filter::RecordFilter;
use crate::domain::pagination::Pagination;
use crate::domain::realtime::{PatchError, RealtimePatch};
use crate::infrastructure::metrics;
use crate::infrastructure::push::PushClientError;

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A dashboard operation failed.
    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    /// The realtime payload could not be decoded.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// No push channel is configured.
    #[error("push channel is not configured")]
    PushDisabled,

    /// The push channel rejected a request.
    #[error(transparent)]
    Push(#[from] PushClientError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Dashboard(DashboardError::Source(SourceError::MissingParameter(_)))
            | Self::Patch(_) => StatusCode::BAD_REQUEST,
            Self::Dashboard(DashboardError::Source(_)) => StatusCode::BAD_GATEWAY,
            Self::Dashboard(DashboardError::FeatureDisabled(_)) => StatusCode::FORBIDDEN,
            Self::Dashboard(DashboardError::Snapshot(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PushDisabled | Self::Push(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "API request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "API request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// Request / Response Bodies
// =============================================================================

/// Result of a fetch.
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    /// Records in the collection after the fetch.
    pub records: usize,
    /// Render model after the fetch.
    pub view: DashboardView,
}

/// Add one record by key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRecordRequest {
    /// Key of the record to add.
    #[serde(alias = "new_stock_code")]
    pub stock_code: String,
}

/// Result of an add.
#[derive(Debug, Serialize)]
pub struct AddRecordResponse {
    /// Whether the record was appended.
    pub added: bool,
    /// Render model after the add.
    pub view: DashboardView,
}

/// Result of saving the key list.
#[derive(Debug, Serialize)]
pub struct SaveKeysResponse {
    /// Number of keys sent to the backend.
    pub saved: usize,
}

/// Header click.
#[derive(Debug, Deserialize)]
pub struct SortRequest {
    /// Clicked field.
    pub field: String,
    /// Whether a modifier key was held.
    #[serde(default)]
    pub additive: bool,
}

/// Page navigation.
#[derive(Debug, Deserialize)]
pub struct PageRequest {
    /// Signed page offset.
    pub offset: i64,
}

/// Page size as a number or as the raw selector text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PerPageValue {
    /// Numeric page size.
    Number(usize),
    /// Text page size; invalid text yields the default.
    Text(String),
}

/// Page size change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerPageRequest {
    /// Requested page size.
    pub per_page: PerPageValue,
}

impl PerPageRequest {
    /// Effective page size.
    #[must_use]
    pub fn resolve(&self) -> usize {
        match &self.per_page {
            PerPageValue::Number(n) => *n,
            PerPageValue::Text(text) => Pagination::parse_per_page(text),
        }
    }
}

/// Result of a realtime merge.
#[derive(Debug, Serialize)]
pub struct PatchResponse {
    /// Whether any value changed.
    pub changed: bool,
    /// Render model after the merge.
    pub view: DashboardView,
}

/// Result of a refresh request.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Dashboards the refresh was requested for.
    pub dashboards: Vec<String>,
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<AppState>>;

pub(super) async fn view(State(state): Shared) -> Json<DashboardView> {
    Json(state.service.view())
}

pub(super) async fn fetch(
    State(state): Shared,
    Json(query): Json<FetchQuery>,
) -> Result<Json<FetchResponse>, ApiError> {
    let records = state.service.fetch(query).await?;
    Ok(Json(FetchResponse {
        records,
        view: state.service.view(),
    }))
}

pub(super) async fn reset_fetch(
    State(state): Shared,
    Json(query): Json<FetchQuery>,
) -> Result<Json<FetchResponse>, ApiError> {
    let records = state.service.reset_fetch(query).await?;
    Ok(Json(FetchResponse {
        records,
        view: state.service.view(),
    }))
}

pub(super) async fn refetch(State(state): Shared) -> Result<Json<FetchResponse>, ApiError> {
    let records = state.service.refetch().await?;
    Ok(Json(FetchResponse {
        records,
        view: state.service.view(),
    }))
}

pub(super) async fn add_record(
    State(state): Shared,
    Json(request): Json<AddRecordRequest>,
) -> Result<Json<AddRecordResponse>, ApiError> {
    let added = state.service.add_record(request.stock_code.trim()).await?;
    Ok(Json(AddRecordResponse {
        added,
        view: state.service.view(),
    }))
}

pub(super) async fn save_keys(State(state): Shared) -> Result<Json<SaveKeysResponse>, ApiError> {
    let saved = state.service.save_keys().await?;
    Ok(Json(SaveKeysResponse { saved }))
}

pub(super) async fn click_sort(
    State(state): Shared,
    Json(request): Json<SortRequest>,
) -> Json<DashboardView> {
    Json(state.service.click_sort(&request.field, request.additive).await)
}

pub(super) async fn change_page(
    State(state): Shared,
    Json(request): Json<PageRequest>,
) -> Json<DashboardView> {
    Json(state.service.change_page(request.offset).await)
}

pub(super) async fn set_per_page(
    State(state): Shared,
    Json(request): Json<PerPageRequest>,
) -> Json<DashboardView> {
    Json(state.service.set_per_page(request.resolve()).await)
}

pub(super) async fn set_filter(
    State(state): Shared,
    Json(filter): Json<RecordFilter>,
) -> Json<DashboardView> {
    Json(state.service.set_filter(filter).await)
}

pub(super) async fn apply_patch(
    State(state): Shared,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<PatchResponse>, ApiError> {
    let patch = RealtimePatch::from_json(&payload).inspect_err(|_| {
        metrics::record_patch_rejected("payload");
    })?;
    metrics::record_patch_received();
    let changed = state.service.apply_patch(&patch).await;
    Ok(Json(PatchResponse {
        changed,
        view: state.service.view(),
    }))
}

pub(super) async fn request_refresh(
    State(state): Shared,
) -> Result<Json<RefreshResponse>, ApiError> {
    let client = state.push_client.as_ref().ok_or(ApiError::PushDisabled)?;
    let dashboards = vec![state.service.page_key()];
    client.request_refresh(&dashboards)?;
    Ok(Json(RefreshResponse { dashboards }))
}

pub(super) async fn toggle_pin(
    State(state): Shared,
    Path(key): Path<String>,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(state.service.toggle_pin(&key).await?))
}

pub(super) async fn toggle_hide(
    State(state): Shared,
    Path(key): Path<String>,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(state.service.toggle_hide(&key).await?))
}

pub(super) async fn delete(
    State(state): Shared,
    Path(key): Path<String>,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(state.service.delete(&key).await?))
}

pub(super) async fn clear_hidden(State(state): Shared) -> impl IntoResponse {
    Json(state.service.clear_hidden().await)
}
