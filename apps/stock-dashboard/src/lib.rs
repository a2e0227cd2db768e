#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Stock Dashboard - Table State Engine
//!
//! Keeps a tabular market data set filtered, sorted and paginated, and
//! live-patches prices from a push channel. The current page is served to
//! the rendering layer as JSON.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure table logic
//!   - `record`: Records and field value coercion
//!   - `sort`: Multi-key stable sort and header indicators
//!   - `pagination`: Page bounds and navigation
//!   - `realtime`: Realtime patches and the merge
//!   - `filter`: Search, type and streak filters, row membership sets
//!   - `profile`: Per-dashboard column sets and features
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Record source and snapshot store interfaces
//!   - `services`: Dashboard state, service, throttle and coalescer
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `source`: REST record source
//!   - `push`: Realtime WebSocket client and merge pipeline
//!   - `persistence`: File and in-memory snapshot stores
//!   - `http`: JSON API, health checks and metrics
//!   - `config`: Environment configuration
//!
//! # Data Flow
//!
//! ```text
//! REST backend ──fetch──►┐
//!                        ├──► DashboardState ──view──► HTTP API ──► renderer
//! Push WS ──coalesce────►┘          │
//!                                   └──save──► SnapshotStore
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Table logic with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::pagination::Pagination;
pub use domain::profile::DashboardProfile;
pub use domain::realtime::{LiveFields, RealtimePatch, merge};
pub use domain::record::{FieldValue, Record};
pub use domain::sort::{SortDirection, SortIndicator, SortRule, SortRules, sort_records};

// Application
pub use application::ports::{FetchQuery, RecordSource, SnapshotStore, SourceError};
pub use application::services::{DashboardError, DashboardService, DashboardState, DashboardView};

// Infrastructure config
pub use infrastructure::config::{ConfigError, DashboardConfig};

// HTTP server
pub use infrastructure::http::{AppState, HttpServer, ServerError, router};

// Metrics
pub use infrastructure::metrics::init_metrics;
