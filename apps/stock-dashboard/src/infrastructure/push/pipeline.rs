//! Realtime Patch Pipeline
//!
//! Consumes patches produced by the push client, folds them in a
//! [`PatchCoalescer`] and merges the result into the dashboard once per
//! tick. Each tick also flushes a throttled save that became due.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::services::{DashboardService, PatchCoalescer};
use crate::domain::realtime::RealtimePatch;

/// Capacity of the patch channel between client and pipeline.
pub const PATCH_CHANNEL_CAPACITY: usize = 1024;

/// Coalescing merge loop.
#[derive(Debug)]
pub struct PatchPipeline {
    service: Arc<DashboardService>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PatchPipeline {
    /// Pipeline merging into `service` every `interval`.
    #[must_use]
    pub const fn new(
        service: Arc<DashboardService>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            interval,
            cancel,
        }
    }

    /// Patch channel sized for the pipeline.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<RealtimePatch>, mpsc::Receiver<RealtimePatch>) {
        mpsc::channel(PATCH_CHANNEL_CAPACITY)
    }

    /// Run until cancelled or the sender side is dropped. Whatever is
    /// buffered at that point is still merged and saved.
    pub async fn run(self, mut rx: mpsc::Receiver<RealtimePatch>) {
        let mut coalescer = PatchCoalescer::new();
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                patch = rx.recv() => match patch {
                    Some(patch) => coalescer.push(patch),
                    None => {
                        tracing::debug!("Patch channel closed");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush(&mut coalescer).await;
                    self.service.flush_pending_save().await;
                }
            }
        }

        while let Ok(patch) = rx.try_recv() {
            coalescer.push(patch);
        }
        self.flush(&mut coalescer).await;
        if let Err(e) = self.service.persist().await {
            tracing::warn!(error = %e, "Failed to save dashboard state on shutdown");
        }
    }

    async fn flush(&self, coalescer: &mut PatchCoalescer) {
        let received = coalescer.received();
        let Some(patch) = coalescer.drain() else {
            return;
        };
        let changed = self.service.apply_patch(&patch).await;
        tracing::debug!(received, entries = patch.len(), changed, "Merged realtime batch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockRecordSource, SnapshotStore};
    use crate::application::services::{DashboardSnapshot, Throttle};
    use crate::domain::profile::DashboardProfile;
    use crate::domain::realtime::LiveFields;
    use crate::domain::record::{FieldValue, Record};
    use crate::infrastructure::persistence::InMemorySnapshotStore;

    async fn seeded_service(store: Arc<InMemorySnapshotStore>) -> Arc<DashboardService> {
        let snapshot = DashboardSnapshot {
            records: vec![
                Record::new().with("StockCode", "600000"),
                Record::new().with("StockCode", "600001"),
            ],
            ..DashboardSnapshot::default()
        };
        store.save("stock_dashboard", &snapshot).await.unwrap();
        let service = DashboardService::new(
            DashboardProfile::stock_dashboard(),
            30,
            Arc::new(MockRecordSource::new()),
            store,
            Throttle::new(Duration::from_secs(60)),
        );
        assert!(service.restore().await.unwrap());
        Arc::new(service)
    }

    fn patch(key: &str, price: f64) -> RealtimePatch {
        [(key.to_string(), LiveFields::new(price, 0.5))]
            .into_iter()
            .collect()
    }

    fn price_of(service: &DashboardService, key: &str) -> Option<FieldValue> {
        service.with_state(|state| {
            state
                .records()
                .iter()
                .find(|r| r.key("StockCode").as_deref() == Some(key))
                .and_then(|r| r.get("RealtimePrice").cloned())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn newest_patch_wins_and_is_saved_on_close() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = seeded_service(store.clone()).await;
        let (tx, rx) = PatchPipeline::channel();
        let pipeline = PatchPipeline::new(
            service.clone(),
            Duration::from_millis(250),
            CancellationToken::new(),
        );
        let handle = tokio::spawn(pipeline.run(rx));

        tx.send(patch("600000", 9.0)).await.unwrap();
        tx.send(patch("600000", 9.5)).await.unwrap();
        tx.send(patch("unknown", 1.0)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(price_of(&service, "600000"), Some(FieldValue::Number(9.5)));
        let saved = store.load("stock_dashboard").await.unwrap().unwrap();
        assert_eq!(saved.records.len(), 2);
        assert!(saved.records.iter().all(|r| r.key("StockCode").as_deref() != Some("unknown")));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_patches_are_merged_on_cancel() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = seeded_service(store.clone()).await;
        let (tx, rx) = PatchPipeline::channel();
        let cancel = CancellationToken::new();

        tx.send(patch("600000", 7.0)).await.unwrap();
        tx.send(patch("600001", 8.0)).await.unwrap();
        cancel.cancel();

        PatchPipeline::new(service.clone(), Duration::from_millis(100), cancel)
            .run(rx)
            .await;

        assert_eq!(price_of(&service, "600000"), Some(FieldValue::Number(7.0)));
        assert_eq!(price_of(&service, "600001"), Some(FieldValue::Number(8.0)));
        let saved = store.load("stock_dashboard").await.unwrap().unwrap();
        assert!(
            saved
                .records
                .iter()
                .any(|r| r.get("RealtimePrice") == Some(&FieldValue::Number(8.0)))
        );
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_merge_while_running() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = seeded_service(store).await;
        let (tx, rx) = PatchPipeline::channel();
        let cancel = CancellationToken::new();
        let pipeline = PatchPipeline::new(service.clone(), Duration::from_millis(100), cancel.clone());
        let handle = tokio::spawn(pipeline.run(rx));

        tx.send(patch("600001", 4.2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(price_of(&service, "600001"), Some(FieldValue::Number(4.2)));

        cancel.cancel();
        handle.await.unwrap();
    }
}
