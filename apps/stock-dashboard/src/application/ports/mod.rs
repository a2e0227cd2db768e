//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `RecordSource`: Backend that produces record collections
//! - `SnapshotStore`: Session persistence of dashboard state

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::state::DashboardSnapshot;
use crate::domain::record::Record;

// =============================================================================
// Fetch Query
// =============================================================================

/// Parameters of a record fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchQuery {
    /// Backend endpoint under `/api/`.
    pub endpoint: String,
    /// Trading date.
    pub date: Option<NaiveDate>,
    /// Sector codes to restrict the fetch to.
    pub sector_codes: Vec<String>,
    /// Single key to add to a watch list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_stock_code: Option<String>,
}

impl FetchQuery {
    /// Query for `endpoint` with no parameters.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the trading date.
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the sector codes.
    #[must_use]
    pub fn with_sectors(mut self, sector_codes: Vec<String>) -> Self {
        self.sector_codes = sector_codes;
        self
    }

    /// Query string pairs in backend order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(date) = self.date {
            pairs.push(("date", date.format("%Y-%m-%d").to_string()));
        }
        if !self.sector_codes.is_empty() {
            pairs.push(("sector_codes", self.sector_codes.join(",")));
        }
        if let Some(code) = &self.new_stock_code {
            pairs.push(("new_stock_code", code.clone()));
        }
        pairs
    }
}

// =============================================================================
// Record Source
// =============================================================================

/// Errors from the record backend.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request could not be sent or the response not read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error text from the backend, if any.
        message: String,
    },

    /// The payload was not a JSON array of records.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A required query parameter was not supplied.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// Port for fetching records from the backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the records matching `query`.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-array payload.
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Record>, SourceError>;

    /// Persist a watch list of record keys on the backend.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or if the backend rejects the list.
    async fn save_keys(&self, keys: &[String]) -> Result<(), SourceError>;
}

// =============================================================================
// Snapshot Store
// =============================================================================

/// Errors persisting dashboard snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Storage I/O failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored snapshot could not be (de)serialized.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Port for session persistence of dashboard state, keyed by page key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<DashboardSnapshot>, SnapshotError>;

    /// Store `snapshot` under `key`, replacing any previous one.
    async fn save(&self, key: &str, snapshot: &DashboardSnapshot) -> Result<(), SnapshotError>;

    /// Remove the snapshot under `key`.
    async fn clear(&self, key: &str) -> Result<(), SnapshotError>;
}
