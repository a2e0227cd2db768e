//! Logging Setup
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `EnvFilter`.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives, combined with the crate defaults
//! - `LOG_ANSI`: set to "false" to disable colored output (default: true)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Default per-target levels.
pub const DEFAULT_DIRECTIVES: &[&str] = &[
    "stock_dashboard=info",
    "tower_http=info",
    "hyper=warn",
    "reqwest=warn",
    "tungstenite=warn",
];

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Colored output.
    pub ansi: bool,
    /// Include event targets.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            ansi: true,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Read configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let ansi = std::env::var("LOG_ANSI")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self {
            ansi,
            ..Self::default()
        }
    }
}

/// `RUST_LOG` directives plus the crate defaults.
#[must_use]
pub fn env_filter() -> EnvFilter {
    DEFAULT_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}

/// Initialize logging from the environment.
pub fn init() -> Result<(), TryInitError> {
    init_with_config(&TelemetryConfig::from_env())
}

/// Initialize logging with an explicit configuration.
pub fn init_with_config(config: &TelemetryConfig) -> Result<(), TryInitError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        for directive in DEFAULT_DIRECTIVES {
            assert!(directive.parse::<Directive>().is_ok(), "{directive}");
        }
    }

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert!(config.ansi);
        assert!(config.with_target);
    }
}
