//! Push WebSocket Client
//!
//! Holds one connection to the realtime push endpoint, decodes
//! `realtime_update` frames and forwards the patches to the pipeline.
//! Lost connections are retried with [`Backoff`]; the attempt budget is
//! reset after every successful connect. While connected, refresh requests
//! queued with [`PushClient::request_refresh`] are written to the socket.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::{self, CodecError, PushMessage};
use super::reconnect::{Backoff, BackoffConfig};
use super::status::{ConnectionState, PushStatus};
use crate::domain::realtime::RealtimePatch;
use crate::infrastructure::metrics;

/// Outbound frames buffered per connection.
const OUTBOUND_CAPACITY: usize = 16;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a push session.
#[derive(Debug, thiserror::Error)]
pub enum PushClientError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The pipeline receiving patches is gone.
    #[error("patch channel closed")]
    ChannelClosed,

    /// The server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Reconnection budget spent.
    #[error("giving up after {0} reconnection attempts")]
    MaxReconnectAttemptsExceeded(u32),

    /// No open connection to send on, or its queue is full.
    #[error("push channel not connected")]
    NotConnected,

    /// An outbound frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// =============================================================================
// Client
// =============================================================================

/// Realtime push client.
#[derive(Debug)]
pub struct PushClient {
    url: Url,
    backoff: BackoffConfig,
    patch_tx: mpsc::Sender<RealtimePatch>,
    status: Arc<PushStatus>,
    cancel: CancellationToken,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl PushClient {
    /// Create a client forwarding patches into `patch_tx`.
    #[must_use]
    pub fn new(
        url: Url,
        backoff: BackoffConfig,
        patch_tx: mpsc::Sender<RealtimePatch>,
        status: Arc<PushStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url,
            backoff,
            patch_tx,
            status,
            cancel,
            outbound: Mutex::new(None),
        }
    }

    /// Endpoint this client connects to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Shared connection status.
    #[must_use]
    pub fn status(&self) -> Arc<PushStatus> {
        Arc::clone(&self.status)
    }

    /// Ask the server to push fresh realtime data for `dashboards`.
    ///
    /// Fails with `NotConnected` when no connection is open.
    pub fn request_refresh(&self, dashboards: &[String]) -> Result<(), PushClientError> {
        let text = codec::encode_refresh(dashboards)?;
        let sender = self
            .outbound
            .lock()
            .clone()
            .ok_or(PushClientError::NotConnected)?;
        sender
            .try_send(text)
            .map_err(|_| PushClientError::NotConnected)?;
        tracing::info!(?dashboards, "Requested realtime refresh");
        Ok(())
    }

    /// Run until cancelled, the pipeline goes away, or retries run out.
    pub async fn run(self: Arc<Self>) -> Result<(), PushClientError> {
        let mut backoff = Backoff::new(self.backoff.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Push client cancelled");
                self.status.set_state(ConnectionState::Stopped);
                return Ok(());
            }

            let result = self.connect_and_run(&mut backoff).await;
            self.outbound.lock().take();
            metrics::set_push_connected(false);

            match result {
                Ok(()) => {
                    tracing::info!("Push client stopped");
                    self.status.set_state(ConnectionState::Stopped);
                    return Ok(());
                }
                Err(PushClientError::ChannelClosed) => {
                    tracing::info!("Patch pipeline closed, stopping push client");
                    self.status.set_state(ConnectionState::Stopped);
                    return Err(PushClientError::ChannelClosed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, url = %self.url, "Push connection lost");
                    self.status.set_error(e.to_string());

                    let Some(delay) = backoff.next_delay() else {
                        tracing::error!(
                            attempts = backoff.attempts(),
                            "Push reconnection attempts exhausted"
                        );
                        self.status.set_state(ConnectionState::Stopped);
                        return Err(PushClientError::MaxReconnectAttemptsExceeded(
                            backoff.attempts(),
                        ));
                    };
                    metrics::record_push_reconnect();
                    self.status.set_state(ConnectionState::Reconnecting);
                    self.status.increment_reconnect_attempts();
                    tracing::info!(
                        attempt = backoff.attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Reconnecting to push endpoint"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Push client cancelled during reconnect delay");
                            self.status.set_state(ConnectionState::Stopped);
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn connect_and_run(&self, backoff: &mut Backoff) -> Result<(), PushClientError> {
        tracing::info!(url = %self.url, "Connecting to push endpoint");
        if backoff.attempts() == 0 {
            self.status.set_state(ConnectionState::Connecting);
        }
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        *self.outbound.lock() = Some(outbound_tx);

        backoff.reset();
        self.status.set_state(ConnectionState::Connected);
        metrics::set_push_connected(true);
        tracing::info!(url = %self.url, "Push channel connected");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                Some(text) = outbound_rx.recv() => {
                    write.send(Message::text(text)).await?;
                    tracing::debug!("Sent push request");
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await?,
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Push server sent close frame");
                            return Err(PushClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(PushClientError::ConnectionClosed),
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<(), PushClientError> {
        match codec::decode(text) {
            Ok(PushMessage::Realtime(patch)) => {
                metrics::record_patch_received();
                self.status.increment_messages();
                if patch.is_empty() {
                    return Ok(());
                }
                self.patch_tx
                    .send(patch)
                    .await
                    .map_err(|_| PushClientError::ChannelClosed)
            }
            Ok(PushMessage::Other(event)) => {
                tracing::debug!(event = %event, "Ignoring push event");
                Ok(())
            }
            Err(e) => {
                metrics::record_patch_rejected(e.reason());
                tracing::warn!(error = %e, "Dropping malformed push frame");
                Ok(())
            }
        }
    }
}
