//! Dashboard Configuration Settings
//!
//! Configuration types for the dashboard service, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::application::services::{DEFAULT_COALESCE_INTERVAL, DEFAULT_SAVE_INTERVAL};
use crate::domain::pagination::DEFAULT_PER_PAGE;
use crate::domain::profile::{DashboardProfile, PROFILE_NAMES};

/// Record backend settings.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Base URL of the backend, e.g. `http://127.0.0.1:5000`.
    pub base_url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Push channel settings.
#[derive(Debug, Clone)]
pub struct PushSettings {
    /// WebSocket URL; push is disabled when absent.
    pub url: Option<Url>,
    /// Interval at which buffered patches are merged.
    pub coalesce_interval: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            url: None,
            coalesce_interval: DEFAULT_COALESCE_INTERVAL,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 5,
        }
    }
}

/// Table state settings.
#[derive(Debug, Clone)]
pub struct TableSettings {
    /// Default page size.
    pub per_page: usize,
    /// Directory for snapshot files; in-memory storage when absent.
    pub snapshot_dir: Option<PathBuf>,
    /// Minimum spacing of saves triggered by realtime updates.
    pub save_throttle: Duration,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            snapshot_dir: None,
            save_throttle: DEFAULT_SAVE_INTERVAL,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP port for the dashboard API, health checks and metrics.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Complete dashboard configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Selected dashboard profile.
    pub profile: DashboardProfile,
    /// Record backend settings.
    pub source: SourceSettings,
    /// Push channel settings.
    pub push: PushSettings,
    /// Table state settings.
    pub table: TableSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl DashboardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let base_url = env
            .get("DASHBOARD_API_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DASHBOARD_API_BASE_URL".to_string()))?;
        if base_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("DASHBOARD_API_BASE_URL".to_string()));
        }
        let base_url = parse_url("DASHBOARD_API_BASE_URL", &base_url, &["http", "https"])?;

        let profile_name = env
            .get("DASHBOARD_PROFILE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| PROFILE_NAMES[0].to_string());
        let profile = DashboardProfile::by_name(profile_name.trim())
            .ok_or(ConfigError::UnknownProfile(profile_name))?;

        let push_url = env
            .get("DASHBOARD_PUSH_URL")
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_url("DASHBOARD_PUSH_URL", &s, &["ws", "wss"]))
            .transpose()?;

        let source = SourceSettings {
            base_url,
            request_timeout: env
                .duration_secs("DASHBOARD_REQUEST_TIMEOUT_SECS", Duration::from_secs(10)),
        };

        let defaults = PushSettings::default();
        let push = PushSettings {
            url: push_url,
            coalesce_interval: env
                .duration_millis("DASHBOARD_PUSH_COALESCE_MS", defaults.coalesce_interval),
            reconnect_delay_initial: env.duration_millis(
                "DASHBOARD_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "DASHBOARD_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "DASHBOARD_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse(
                "DASHBOARD_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let defaults = TableSettings::default();
        let table = TableSettings {
            per_page: Some(env.parse("DASHBOARD_PER_PAGE", defaults.per_page))
                .filter(|n| *n > 0)
                .unwrap_or(defaults.per_page),
            snapshot_dir: env
                .get("DASHBOARD_SNAPSHOT_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            save_throttle: env.duration_millis("DASHBOARD_SAVE_THROTTLE_MS", defaults.save_throttle),
        };

        let server = ServerSettings {
            http_port: env.parse("DASHBOARD_HTTP_PORT", ServerSettings::default().http_port),
        };

        Ok(Self {
            profile,
            source,
            push,
            table,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable holds an unusable URL.
    #[error("environment variable {key} is not a valid {expected} URL: {value}")]
    InvalidUrl {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Accepted schemes.
        expected: String,
    },
    /// No built-in profile has this name.
    #[error("unknown dashboard profile: {0}")]
    UnknownProfile(String),
}

fn parse_url(key: &str, value: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        key: key.to_string(),
        value: value.to_string(),
        expected: schemes.join("/"),
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if schemes.contains(&url.scheme()) {
        Ok(url)
    } else {
        Err(invalid())
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
