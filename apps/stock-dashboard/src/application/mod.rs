//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (record backend, snapshot storage).
pub mod ports;

/// Application services for dashboard state and realtime handling.
pub mod services;
