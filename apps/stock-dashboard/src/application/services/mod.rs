//! Application Services
//!
//! Use cases driving a dashboard: the explicit table state, the async
//! service around it, and the rate limiters used by the realtime path.

/// Table state and render model.
pub mod state;

/// Async dashboard service over the ports.
pub mod dashboard;

/// Leading-edge save throttle.
pub mod throttle;

/// Realtime patch buffering.
pub mod coalescer;

pub use coalescer::{DEFAULT_COALESCE_INTERVAL, PatchCoalescer};
pub use dashboard::{DashboardError, DashboardService};
pub use state::{
    DashboardSnapshot, DashboardState, DashboardView, FeatureDisabled, FetchOutcome, FetchTicket,
    ViewColumn,
};
pub use throttle::{DEFAULT_SAVE_INTERVAL, Throttle};
