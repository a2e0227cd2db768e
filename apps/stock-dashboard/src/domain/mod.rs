//! Domain Layer - Table state types and pure business logic.
//!
//! This layer holds the record model and the algorithms with real
//! invariants (pagination bounds, stable multi-key sort, keyed realtime
//! merge). Nothing here performs I/O.

/// Records and field values.
pub mod record;

/// Multi-key stable sort and header indicators.
pub mod sort;

/// Pagination bounds tracking.
pub mod pagination;

/// Keyed live-field patches.
pub mod realtime;

/// Search, category and streak filters plus row membership sets.
pub mod filter;

/// Per-dashboard configuration.
pub mod profile;
