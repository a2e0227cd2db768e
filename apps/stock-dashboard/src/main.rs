//! Stock Dashboard Binary
//!
//! Serves the dashboard table state over HTTP and keeps it live from the
//! push channel.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stock-dashboard
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `DASHBOARD_API_BASE_URL`: Backend base URL, e.g. `http://127.0.0.1:5000`
//!
//! ## Optional
//! - `DASHBOARD_PROFILE`: stock_dashboard | custom_stock_dashboard |
//!   limitup_unfilled_orders_dashboard | ma_strategy_dashboard (default: stock_dashboard)
//! - `DASHBOARD_PUSH_URL`: Realtime WebSocket URL (push disabled when unset)
//! - `DASHBOARD_HTTP_PORT`: HTTP port (default: 8080)
//! - `DASHBOARD_PER_PAGE`: Page size (default: 30)
//! - `DASHBOARD_SNAPSHOT_DIR`: Snapshot directory (in-memory when unset)
//! - `RUST_LOG`: Log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stock_dashboard::application::ports::{RecordSource, SnapshotStore};
use stock_dashboard::application::services::{DashboardService, Throttle};
use stock_dashboard::infrastructure::http::{AppState, HttpServer};
use stock_dashboard::infrastructure::persistence::{FileSnapshotStore, InMemorySnapshotStore};
use stock_dashboard::infrastructure::push::{
    BackoffConfig, ConnectionState, PatchPipeline, PushClient, PushStatus,
};
use stock_dashboard::infrastructure::source::HttpRecordSource;
use stock_dashboard::infrastructure::telemetry;
use stock_dashboard::{DashboardConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();
    telemetry::init().context("failed to initialize logging")?;

    tracing::info!("Starting stock dashboard");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = DashboardConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let source: Arc<dyn RecordSource> = Arc::new(HttpRecordSource::new(&config.source)?);
    let store: Arc<dyn SnapshotStore> = match &config.table.snapshot_dir {
        Some(dir) => Arc::new(FileSnapshotStore::new(dir)),
        None => Arc::new(InMemorySnapshotStore::new()),
    };

    let service = Arc::new(DashboardService::new(
        config.profile.clone(),
        config.table.per_page,
        source,
        store,
        Throttle::new(config.table.save_throttle),
    ));

    let restored = match service.restore().await {
        Ok(restored) => restored,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable dashboard state");
            false
        }
    };
    if !restored && !config.profile.requires_date {
        if let Err(e) = service.refetch().await {
            tracing::warn!(error = %e, "Initial fetch failed");
        }
    }

    // Push channel
    let push_status = Arc::new(PushStatus::default());
    let mut pipeline_handle = None;
    let mut push_client = None;
    if let Some(url) = config.push.url.clone() {
        push_status.set_state(ConnectionState::Connecting);
        let (patch_tx, patch_rx) = PatchPipeline::channel();
        let pipeline = PatchPipeline::new(
            Arc::clone(&service),
            config.push.coalesce_interval,
            shutdown_token.clone(),
        );
        pipeline_handle = Some(tokio::spawn(pipeline.run(patch_rx)));

        let client = Arc::new(PushClient::new(
            url,
            BackoffConfig::from_settings(&config.push),
            patch_tx,
            Arc::clone(&push_status),
            shutdown_token.clone(),
        ));
        push_client = Some(Arc::clone(&client));
        tokio::spawn(async move {
            if let Err(e) = client.run().await {
                tracing::error!(error = %e, "Push client error");
            }
        });
    } else {
        tracing::info!("Push channel disabled");
    }

    // HTTP server
    let mut app_state = AppState::new(Arc::clone(&service), push_status);
    if let Some(client) = push_client {
        app_state = app_state.with_push_client(client);
    }
    let app_state = Arc::new(app_state);
    let http_server = HttpServer::new(
        config.server.http_port,
        app_state,
        shutdown_token.clone(),
    );
    let server_handle = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!(page_key = %service.page_key(), "Stock dashboard ready");

    await_shutdown(shutdown_token).await;

    let drain = async {
        if let Some(handle) = pipeline_handle {
            let _ = handle.await;
        } else if let Err(e) = service.persist().await {
            tracing::warn!(error = %e, "Failed to save dashboard state on shutdown");
        }
        let _ = server_handle.await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out"
        );
    }

    tracing::info!("Stock dashboard stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &DashboardConfig) {
    tracing::info!(
        profile = %config.profile.page_key,
        api_base_url = %config.source.base_url,
        http_port = config.server.http_port,
        per_page = config.table.per_page,
        push_enabled = config.push.url.is_some(),
        snapshot_dir = ?config.table.snapshot_dir,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
