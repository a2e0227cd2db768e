//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the process
//! surfaces: HTTP API, push channel, configuration and observability.

/// Environment configuration.
pub mod config;

/// HTTP API, health and metrics endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Snapshot stores.
pub mod persistence;

/// Realtime push channel.
pub mod push;

/// REST record source.
pub mod source;

/// Logging setup.
pub mod telemetry;
