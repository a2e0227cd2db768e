//! Dashboard Service
//!
//! Async façade over [`DashboardState`]. Owns the state lock, talks to the
//! record source and snapshot store ports, and persists after every
//! mutation. Saves caused by realtime traffic go through a [`Throttle`].
//!
//! The state lock is never held across an `.await`. Saves take the async
//! save lock before capturing the snapshot, so stores see snapshots in the
//! order they were taken.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::application::ports::{
    FetchQuery, RecordSource, SnapshotError, SnapshotStore, SourceError,
};
use crate::application::services::state::{
    DashboardSnapshot, DashboardState, DashboardView, FeatureDisabled, FetchOutcome, FetchTicket,
};
use crate::application::services::throttle::Throttle;
use crate::domain::filter::RecordFilter;
use crate::domain::profile::DashboardProfile;
use crate::domain::realtime::RealtimePatch;
use crate::domain::record::Record;
use crate::infrastructure::metrics::{self, FetchResult};

// =============================================================================
// Errors
// =============================================================================

/// Errors from dashboard operations.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The record source failed; the table was reset.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Loading or saving a snapshot failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The requested row action is disabled.
    #[error(transparent)]
    FeatureDisabled(#[from] FeatureDisabled),
}

// =============================================================================
// Service
// =============================================================================

/// Shared handle driving one dashboard.
pub struct DashboardService {
    state: Mutex<DashboardState>,
    source: Arc<dyn RecordSource>,
    store: Arc<dyn SnapshotStore>,
    save_throttle: Mutex<Throttle>,
    save_lock: AsyncMutex<()>,
}

impl std::fmt::Debug for DashboardService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardService")
            .field("page_key", &self.state.lock().profile().page_key)
            .finish_non_exhaustive()
    }
}

impl DashboardService {
    /// Create a service for `profile`.
    #[must_use]
    pub fn new(
        profile: DashboardProfile,
        per_page: usize,
        source: Arc<dyn RecordSource>,
        store: Arc<dyn SnapshotStore>,
        save_throttle: Throttle,
    ) -> Self {
        Self {
            state: Mutex::new(DashboardState::new(profile, per_page)),
            source,
            store,
            save_throttle: Mutex::new(save_throttle),
            save_lock: AsyncMutex::new(()),
        }
    }

    /// Page key of the dashboard.
    #[must_use]
    pub fn page_key(&self) -> String {
        self.state.lock().profile().page_key.clone()
    }

    /// Run `f` with shared access to the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Current render model.
    #[must_use]
    pub fn view(&self) -> DashboardView {
        self.state.lock().view()
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Restore the stored snapshot, if any. Returns whether one was found.
    pub async fn restore(&self) -> Result<bool, DashboardError> {
        let key = self.page_key();
        let Some(snapshot) = self.store.load(&key).await? else {
            tracing::info!(page_key = %key, "No stored dashboard state");
            return Ok(false);
        };
        let mut state = self.state.lock();
        state.restore(snapshot);
        tracing::info!(
            page_key = %key,
            records = state.records().len(),
            sort_rules = state.sort_rules().len(),
            "Restored dashboard state"
        );
        Ok(true)
    }

    /// Save the current state now.
    pub async fn persist(&self) -> Result<(), DashboardError> {
        let _guard = self.save_lock.lock().await;
        let (key, snapshot) = self.capture();
        let result = self.store.save(&key, &snapshot).await;
        metrics::record_snapshot_save(result.is_ok());
        result?;
        tracing::debug!(page_key = %key, records = snapshot.records.len(), "Saved dashboard state");
        Ok(())
    }

    /// Drop the stored state.
    pub async fn clear_snapshot(&self) -> Result<(), DashboardError> {
        let _guard = self.save_lock.lock().await;
        let key = self.page_key();
        self.store.clear(&key).await?;
        Ok(())
    }

    fn capture(&self) -> (String, DashboardSnapshot) {
        let state = self.state.lock();
        (state.profile().page_key.clone(), state.snapshot())
    }

    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            tracing::warn!(error = %e, "Failed to save dashboard state");
        }
    }

    /// Save if the throttle allows, otherwise leave a pending save.
    pub async fn persist_throttled(&self) {
        let fire = self.save_throttle.lock().try_fire(Instant::now());
        if fire {
            self.persist_logged().await;
        }
    }

    /// Flush a pending throttled save once its window has elapsed.
    /// Returns whether a save was performed.
    pub async fn flush_pending_save(&self) -> bool {
        let fire = self.save_throttle.lock().take_pending(Instant::now());
        if fire {
            self.persist_logged().await;
        }
        fire
    }

    // -------------------------------------------------------------------------
    // Fetching
    // -------------------------------------------------------------------------

    /// Fetch and replace the collection. Returns the number of records.
    ///
    /// On failure the table is reset to empty and the error is returned.
    /// A missing required date is rejected before any state changes.
    pub async fn fetch(&self, query: FetchQuery) -> Result<usize, DashboardError> {
        let (ticket, query) = {
            let mut state = self.state.lock();
            let query = fetch_query(&state, query)?;
            (state.begin_fetch(query.clone()), query)
        };
        self.run_fetch(ticket, query).await
    }

    /// Re-run the last fetch query.
    pub async fn refetch(&self) -> Result<usize, DashboardError> {
        let query = self.with_state(|s| s.query().clone());
        self.fetch(query).await
    }

    /// Drop the stored state and fetch into a clean table.
    ///
    /// Sort rules and pagination start over; deleted keys are forgotten on
    /// dashboards that can delete.
    pub async fn reset_fetch(&self, query: FetchQuery) -> Result<usize, DashboardError> {
        let (ticket, query) = {
            let mut state = self.state.lock();
            let query = fetch_query(&state, query)?;
            (state.begin_reset_fetch(query.clone()), query)
        };
        tracing::info!(page_key = %self.page_key(), "Resetting dashboard state");
        if let Err(e) = self.clear_snapshot().await {
            tracing::warn!(error = %e, "Failed to clear stored dashboard state");
        }
        self.run_fetch(ticket, query).await
    }

    async fn run_fetch(
        &self,
        ticket: FetchTicket,
        query: FetchQuery,
    ) -> Result<usize, DashboardError> {
        let started = Instant::now();
        let result = self.source.fetch(&query).await;

        let (outcome, error) = self.complete(&ticket, result);
        self.log_fetch(&query, outcome, started);

        match (outcome, error) {
            (FetchOutcome::Stale, _) => Ok(0),
            (_, Some(e)) => {
                self.persist_logged().await;
                Err(e.into())
            }
            (_, None) => {
                self.persist_logged().await;
                Ok(self.with_state(|s| s.records().len()))
            }
        }
    }

    /// Fetch a single record by key and append it. Returns whether it was added.
    pub async fn add_record(&self, key: &str) -> Result<bool, DashboardError> {
        let (ticket, query) = {
            let mut state = self.state.lock();
            if !state.profile().features.add {
                return Err(FeatureDisabled("add").into());
            }
            let query = FetchQuery {
                new_stock_code: Some(key.to_string()),
                ..state.query().clone()
            };
            (state.begin_add(key), query)
        };

        let started = Instant::now();
        let result = self.source.fetch(&query).await;
        let (outcome, error) = self.complete(&ticket, result);
        self.log_fetch(&query, outcome, started);

        match (outcome, error) {
            (FetchOutcome::Stale, _) => Ok(false),
            (_, Some(e)) => {
                self.persist_logged().await;
                Err(e.into())
            }
            (FetchOutcome::Applied { added }, None) => {
                self.persist_logged().await;
                Ok(added > 0)
            }
            (FetchOutcome::Failed, None) => Ok(false),
        }
    }

    fn complete(
        &self,
        ticket: &FetchTicket,
        result: Result<Vec<Record>, SourceError>,
    ) -> (FetchOutcome, Option<SourceError>) {
        let (records, error) = match result {
            Ok(records) => (records, None),
            Err(e) => (Vec::new(), Some(e)),
        };
        let mut state = self.state.lock();
        let outcome = state.complete_fetch(ticket, error.as_ref().map_or(Ok(records), Err));
        metrics::set_table_size(state.records().len(), state.visible().len());
        (outcome, error)
    }

    /// Save the key list back to the backend. Returns the number of keys.
    pub async fn save_keys(&self) -> Result<usize, DashboardError> {
        let keys = {
            let state = self.state.lock();
            if !state.profile().features.save_keys {
                return Err(FeatureDisabled("save_keys").into());
            }
            state.record_keys()
        };
        self.source.save_keys(&keys).await?;
        tracing::info!(count = keys.len(), "Saved record keys to backend");
        self.persist_logged().await;
        Ok(keys.len())
    }

    fn log_fetch(&self, query: &FetchQuery, outcome: FetchOutcome, started: Instant) {
        let elapsed = started.elapsed();
        let result = match outcome {
            FetchOutcome::Applied { added } => {
                tracing::info!(
                    endpoint = %query.endpoint,
                    date = ?query.date,
                    added,
                    elapsed_ms = elapsed.as_millis(),
                    "Fetch applied"
                );
                FetchResult::Applied
            }
            FetchOutcome::Stale => {
                tracing::debug!(endpoint = %query.endpoint, "Fetch superseded");
                FetchResult::Stale
            }
            FetchOutcome::Failed => {
                let error = self.with_state(|s| s.last_error().map(ToString::to_string));
                tracing::warn!(
                    endpoint = %query.endpoint,
                    error = error.as_deref().unwrap_or("unknown"),
                    "Fetch failed, table reset"
                );
                FetchResult::Failed
            }
        };
        metrics::record_fetch(result, elapsed);
    }

    // -------------------------------------------------------------------------
    // Table interactions
    // -------------------------------------------------------------------------

    /// Header click on `field`.
    pub async fn click_sort(&self, field: &str, additive: bool) -> DashboardView {
        let view = self.mutate(|s| s.click_sort(field, additive));
        self.persist_logged().await;
        view
    }

    /// Move by `offset` pages.
    pub async fn change_page(&self, offset: i64) -> DashboardView {
        let view = self.mutate(|s| {
            s.change_page(offset);
        });
        self.persist_logged().await;
        view
    }

    /// Change the page size.
    pub async fn set_per_page(&self, per_page: usize) -> DashboardView {
        let view = self.mutate(|s| s.set_per_page(per_page));
        self.persist_logged().await;
        view
    }

    /// Replace the filter inputs.
    pub async fn set_filter(&self, filter: RecordFilter) -> DashboardView {
        let view = self.mutate(|s| s.set_filter(filter));
        self.persist_logged().await;
        view
    }

    /// Toggle pinning of `key`.
    pub async fn toggle_pin(&self, key: &str) -> Result<DashboardView, DashboardError> {
        self.try_mutate(|s| s.toggle_pin(key).map(drop)).await
    }

    /// Toggle hiding of `key`.
    pub async fn toggle_hide(&self, key: &str) -> Result<DashboardView, DashboardError> {
        self.try_mutate(|s| s.toggle_hide(key).map(drop)).await
    }

    /// Delete the record keyed `key`.
    pub async fn delete(&self, key: &str) -> Result<DashboardView, DashboardError> {
        self.try_mutate(|s| s.delete(key).map(drop)).await
    }

    /// Show all hidden records.
    pub async fn clear_hidden(&self) -> DashboardView {
        let view = self.mutate(|s| {
            s.clear_hidden();
        });
        self.persist_logged().await;
        view
    }

    /// Merge a realtime patch. Returns whether any value changed.
    pub async fn apply_patch(&self, patch: &RealtimePatch) -> bool {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.apply_patch(patch);
            metrics::set_table_size(state.records().len(), state.visible().len());
            changed
        };
        metrics::record_patch_applied(changed);
        tracing::trace!(entries = patch.len(), changed, "Applied realtime patch");
        if changed {
            self.persist_throttled().await;
        }
        changed
    }

    fn mutate(&self, f: impl FnOnce(&mut DashboardState)) -> DashboardView {
        let mut state = self.state.lock();
        f(&mut state);
        state.view()
    }

    async fn try_mutate(
        &self,
        f: impl FnOnce(&mut DashboardState) -> Result<(), FeatureDisabled>,
    ) -> Result<DashboardView, DashboardError> {
        let view = {
            let mut state = self.state.lock();
            f(&mut state)?;
            state.view()
        };
        self.persist_logged().await;
        Ok(view)
    }
}

/// Validate `query` against the profile and normalize it.
fn fetch_query(state: &DashboardState, query: FetchQuery) -> Result<FetchQuery, DashboardError> {
    let profile = state.profile();
    if profile.requires_date && query.date.is_none() {
        return Err(SourceError::MissingParameter("date").into());
    }
    Ok(FetchQuery {
        endpoint: profile.endpoint.clone(),
        date: query.date,
        sector_codes: if profile.accepts_sectors {
            query.sector_codes
        } else {
            Vec::new()
        },
        new_stock_code: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockRecordSource, MockSnapshotStore};
    use crate::domain::realtime::LiveFields;
    use crate::domain::sort::SortDirection;
    use crate::infrastructure::persistence::InMemorySnapshotStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Store whose first save is slow, recording saves in completion order.
    #[derive(Default)]
    struct SlowFirstSaveStore {
        first_done: AtomicBool,
        saves: Mutex<Vec<DashboardSnapshot>>,
    }

    #[async_trait]
    impl SnapshotStore for SlowFirstSaveStore {
        async fn load(&self, _key: &str) -> Result<Option<DashboardSnapshot>, SnapshotError> {
            Ok(self.saves.lock().last().cloned())
        }

        async fn save(&self, _key: &str, snapshot: &DashboardSnapshot) -> Result<(), SnapshotError> {
            if !self.first_done.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.saves.lock().push(snapshot.clone());
            Ok(())
        }

        async fn clear(&self, _key: &str) -> Result<(), SnapshotError> {
            self.saves.lock().clear();
            Ok(())
        }
    }

    fn stock(code: &str) -> Record {
        Record::new()
            .with("StockCode", code)
            .with("StockName", format!("Stock {code}"))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()
    }

    fn service(
        profile: DashboardProfile,
        source: MockRecordSource,
        store: Arc<InMemorySnapshotStore>,
    ) -> DashboardService {
        DashboardService::new(
            profile,
            30,
            Arc::new(source),
            store,
            Throttle::new(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn fetch_applies_records_and_persists() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .withf(|q| q.endpoint == "stock_data" && q.sector_codes == ["BK1"])
            .returning(|_| Ok(vec![stock("A"), stock("B")]));
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::stock_dashboard(), source, store.clone());

        let query = FetchQuery::new("ignored")
            .with_date(date())
            .with_sectors(vec!["BK1".into()]);
        assert_eq!(service.fetch(query).await.unwrap(), 2);
        assert_eq!(service.view().total_records, 2);

        let saved = store.load("stock_dashboard").await.unwrap().unwrap();
        assert_eq!(saved.records.len(), 2);
        assert_eq!(saved.query.date, Some(date()));
    }

    #[tokio::test]
    async fn missing_date_fails_without_calling_backend() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().never();
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::stock_dashboard(), source, store);

        let err = service.fetch(FetchQuery::default()).await.unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Source(SourceError::MissingParameter("date"))
        ));
    }

    #[tokio::test]
    async fn source_failure_resets_table() {
        let mut source = MockRecordSource::new();
        let mut calls = 0;
        source.expect_fetch().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(vec![stock("A")])
            } else {
                Err(SourceError::Malformed("not an array".into()))
            }
        });
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::custom_stock_dashboard(), source, store);

        assert_eq!(service.fetch(FetchQuery::default()).await.unwrap(), 1);
        assert!(service.fetch(FetchQuery::default()).await.is_err());
        let view = service.view();
        assert_eq!(view.total_records, 0);
        assert!(view.last_error.unwrap().contains("not an array"));
    }

    #[tokio::test]
    async fn add_record_requires_feature() {
        let source = MockRecordSource::new();
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::stock_dashboard(), source, store);
        assert!(matches!(
            service.add_record("A").await,
            Err(DashboardError::FeatureDisabled(_))
        ));
    }

    #[tokio::test]
    async fn add_record_sends_new_stock_code() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .withf(|q| q.new_stock_code.as_deref() == Some("B"))
            .returning(|_| Ok(vec![stock("A"), stock("B")]));
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::custom_stock_dashboard(), source, store);

        assert!(service.add_record("B").await.unwrap());
        assert_eq!(service.with_state(DashboardState::record_keys), ["B"]);
    }

    #[tokio::test]
    async fn save_keys_posts_collection_keys() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .returning(|_| Ok(vec![stock("A"), stock("B")]));
        source
            .expect_save_keys()
            .withf(|keys| keys.to_vec() == vec!["A".to_string(), "B".to_string()])
            .times(1)
            .returning(|_| Ok(()));
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::custom_stock_dashboard(), source, store);

        service.fetch(FetchQuery::default()).await.unwrap();
        assert_eq!(service.save_keys().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn realtime_saves_are_throttled() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().returning(|_| Ok(vec![stock("A")]));
        let mut store = MockSnapshotStore::new();
        // One save for the fetch, one leading-edge save for the first patch.
        store.expect_save().times(2).returning(|_, _| Ok(()));

        let service = DashboardService::new(
            DashboardProfile::custom_stock_dashboard(),
            30,
            Arc::new(source),
            Arc::new(store),
            Throttle::new(Duration::from_secs(60)),
        );
        service.fetch(FetchQuery::default()).await.unwrap();

        for price in [1.0, 2.0, 3.0] {
            let patch: RealtimePatch = [("A".to_string(), LiveFields::new(price, 0.0))]
                .into_iter()
                .collect();
            assert!(service.apply_patch(&patch).await);
        }
        assert!(!service.flush_pending_save().await);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_saves_land_in_capture_order() {
        let store = Arc::new(SlowFirstSaveStore::default());
        let service = DashboardService::new(
            DashboardProfile::custom_stock_dashboard(),
            30,
            Arc::new(MockRecordSource::new()),
            store.clone(),
            Throttle::new(Duration::from_secs(60)),
        );

        let (first, _) = tokio::join!(service.persist(), service.click_sort("StockCode", false));
        first.unwrap();

        let saves = store.saves.lock();
        assert_eq!(saves.len(), 2);
        assert!(saves[0].sort_rules.is_empty());
        assert_eq!(saves[1].sort_rules.len(), 1);
        assert_eq!(saves[1].sort_rules.indicator("StockCode").direction, Some(SortDirection::Asc));
    }

    #[tokio::test]
    async fn reset_fetch_clears_snapshot_and_restores_deleted() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(vec![stock("A"), stock("B")]));
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::custom_stock_dashboard(), source, store.clone());

        service.fetch(FetchQuery::default()).await.unwrap();
        service.delete("A").await.unwrap();
        service.click_sort("StockCode", false).await;
        service.change_page(1).await;
        let saved = store.load("custom_stock_dashboard").await.unwrap().unwrap();
        assert_eq!(saved.deleted.len(), 1);

        assert_eq!(service.reset_fetch(FetchQuery::default()).await.unwrap(), 2);
        assert_eq!(service.with_state(DashboardState::record_keys), ["A", "B"]);
        let view = service.view();
        assert!(view.sort_rules.is_empty());
        assert_eq!(view.pagination.current_page(), 1);

        let saved = store.load("custom_stock_dashboard").await.unwrap().unwrap();
        assert!(saved.deleted.is_empty());
        assert!(saved.sort_rules.is_empty());
    }

    #[tokio::test]
    async fn reset_fetch_validates_before_touching_state() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().times(1).returning(|_| Ok(vec![stock("A")]));
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service(DashboardProfile::stock_dashboard(), source, store);

        service
            .fetch(FetchQuery::default().with_date(date()))
            .await
            .unwrap();
        assert!(matches!(
            service.reset_fetch(FetchQuery::default()).await,
            Err(DashboardError::Source(SourceError::MissingParameter("date")))
        ));
        assert_eq!(service.view().total_records, 1);
    }

    #[tokio::test]
    async fn restore_rebuilds_state_from_store() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().returning(|_| Ok(vec![stock("A"), stock("B")]));
        let store = Arc::new(InMemorySnapshotStore::new());
        let first = service(DashboardProfile::custom_stock_dashboard(), source, store.clone());
        first.fetch(FetchQuery::default()).await.unwrap();
        first.click_sort("StockCode", false).await;
        first.click_sort("StockCode", false).await;

        let second = service(
            DashboardProfile::custom_stock_dashboard(),
            MockRecordSource::new(),
            store,
        );
        assert!(second.restore().await.unwrap());
        let keys: Vec<String> = second
            .view()
            .rows
            .iter()
            .filter_map(|r| r.key("StockCode"))
            .collect();
        assert_eq!(keys, ["B", "A"]);
    }
}
