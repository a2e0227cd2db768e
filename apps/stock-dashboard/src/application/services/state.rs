//! Dashboard State
//!
//! The explicit, single-owner state of one dashboard: the record collection,
//! the derived visible rows and every piece of table state (pagination, sort
//! rules, filter, membership sets). All mutations are synchronous; async
//! callers serialize access with a lock around the whole value.
//!
//! # View pipeline
//!
//! `records -> filter (minus hidden) -> stable sort -> pinned first -> paginate`
//!
//! # Realtime ordering
//!
//! Deleted records are dropped from the collection as soon as they are
//! deleted, so a later patch cannot touch or resurrect them. Patches merge
//! into every remaining record, hidden ones included, and the view is then
//! recomputed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{FetchQuery, SourceError};
use crate::domain::filter::{FilterOptions, KeySet, RecordFilter, apply_filters, pin_first};
use crate::domain::pagination::Pagination;
use crate::domain::profile::{DashboardProfile, Features};
use crate::domain::realtime::{RealtimePatch, merge};
use crate::domain::record::Record;
use crate::domain::sort::{SortIndicator, SortRules, apply_sort_click, sort_records};

// =============================================================================
// Errors
// =============================================================================

/// A row action the profile does not enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} is not enabled for this dashboard")]
pub struct FeatureDisabled(pub &'static str);

// =============================================================================
// Fetch Tickets
// =============================================================================

/// What a completed fetch does to the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Replace the whole collection.
    Replace,
    /// Append the record with this key, if returned and not yet present.
    Add(String),
}

/// Sequence ticket issued when a fetch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    mode: FetchMode,
}

impl FetchTicket {
    /// Sequence number of the fetch.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Mode of the fetch.
    #[must_use]
    pub const fn mode(&self) -> &FetchMode {
        &self.mode
    }
}

/// Result of applying a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced or extended the collection.
    Applied {
        /// Records added by the response.
        added: usize,
    },
    /// A newer fetch was issued meanwhile; the response was ignored.
    Stale,
    /// The fetch failed and the collection was reset.
    Failed,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Persisted session state of a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Pagination state.
    pub pagination: Pagination,
    /// Record collection.
    pub records: Vec<Record>,
    /// Active sort rules.
    pub sort_rules: SortRules,
    /// Filter inputs.
    pub filter: RecordFilter,
    /// Hidden record keys.
    pub hidden: KeySet,
    /// Deleted record keys.
    pub deleted: KeySet,
    /// Pinned record keys.
    pub pinned: KeySet,
    /// Last fetch query.
    pub query: FetchQuery,
    /// When the snapshot was taken.
    pub saved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// View
// =============================================================================

/// Header of one sortable column as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewColumn {
    /// Field name.
    pub field: String,
    /// Base title.
    pub title: String,
    /// Title with sort indicator, e.g. `"Price 1↓"`.
    pub label: String,
    /// Sort indicator.
    pub indicator: SortIndicator,
}

/// Everything the rendering layer needs to draw the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    /// Profile name.
    pub page_key: String,
    /// Rows of the current page.
    pub rows: Vec<Record>,
    /// Pagination state.
    pub pagination: Pagination,
    /// Pager caption.
    pub page_label: String,
    /// Whether a previous page exists.
    pub has_previous: bool,
    /// Whether a next page exists.
    pub has_next: bool,
    /// Sortable columns with indicators.
    pub columns: Vec<ViewColumn>,
    /// Rows passing the filters.
    pub total_rows: usize,
    /// Records in the collection.
    pub total_records: usize,
    /// Number of hidden records.
    pub hidden_count: usize,
    /// Pinned record keys.
    pub pinned: Vec<String>,
    /// Active filter.
    pub filter: RecordFilter,
    /// Available filter choices.
    pub options: FilterOptions,
    /// Active sort rules.
    pub sort_rules: SortRules,
    /// Enabled row actions.
    pub features: Features,
    /// Error of the last failed fetch.
    pub last_error: Option<String>,
    /// When the collection last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Dashboard State
// =============================================================================

/// Complete table state of one dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    profile: DashboardProfile,
    records: Vec<Record>,
    visible: Vec<Record>,
    pagination: Pagination,
    default_per_page: usize,
    sort_rules: SortRules,
    filter: RecordFilter,
    hidden: KeySet,
    deleted: KeySet,
    pinned: KeySet,
    query: FetchQuery,
    options: FilterOptions,
    latest_ticket: u64,
    latest_replace: u64,
    last_error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    /// Empty state for `profile` with the given page size.
    #[must_use]
    pub fn new(profile: DashboardProfile, per_page: usize) -> Self {
        let query = FetchQuery::new(profile.endpoint.clone());
        Self {
            profile,
            records: Vec::new(),
            visible: Vec::new(),
            pagination: Pagination::new(per_page),
            default_per_page: per_page,
            sort_rules: SortRules::new(),
            filter: RecordFilter::default(),
            hidden: KeySet::new(),
            deleted: KeySet::new(),
            pinned: KeySet::new(),
            query,
            options: FilterOptions::default(),
            latest_ticket: 0,
            latest_replace: 0,
            last_error: None,
            updated_at: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Dashboard profile.
    #[must_use]
    pub const fn profile(&self) -> &DashboardProfile {
        &self.profile
    }

    /// Full record collection.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Filtered, sorted rows across all pages.
    #[must_use]
    pub fn visible(&self) -> &[Record] {
        &self.visible
    }

    /// Pagination state.
    #[must_use]
    pub const fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Active sort rules.
    #[must_use]
    pub const fn sort_rules(&self) -> &SortRules {
        &self.sort_rules
    }

    /// Active filter.
    #[must_use]
    pub const fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    /// Hidden keys.
    #[must_use]
    pub const fn hidden(&self) -> &KeySet {
        &self.hidden
    }

    /// Deleted keys.
    #[must_use]
    pub const fn deleted(&self) -> &KeySet {
        &self.deleted
    }

    /// Pinned keys.
    #[must_use]
    pub const fn pinned(&self) -> &KeySet {
        &self.pinned
    }

    /// Last fetch query.
    #[must_use]
    pub const fn query(&self) -> &FetchQuery {
        &self.query
    }

    /// Error of the last failed fetch.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Keys of all records, in collection order.
    #[must_use]
    pub fn record_keys(&self) -> Vec<String> {
        let key_field = &self.profile.key_field;
        self.records.iter().filter_map(|r| r.key(key_field)).collect()
    }

    // -------------------------------------------------------------------------
    // View pipeline
    // -------------------------------------------------------------------------

    /// Recompute the visible rows and pagination bounds.
    pub fn refresh_view(&mut self) {
        let key_field = &self.profile.key_field;
        let mut visible = apply_filters(&self.records, key_field, &self.filter, &self.hidden);
        sort_records(&mut visible, &self.sort_rules, &self.profile.schema);
        pin_first(&mut visible, key_field, &self.pinned);
        self.visible = visible;
        self.pagination.update(self.visible.len());
    }

    fn records_changed(&mut self) {
        self.options = FilterOptions::from_records(&self.records);
        self.filter.reconcile(&self.options);
        self.updated_at = Some(Utc::now());
        self.refresh_view();
    }

    // -------------------------------------------------------------------------
    // Fetching
    // -------------------------------------------------------------------------

    /// Start a fetch that replaces the collection.
    pub fn begin_fetch(&mut self, query: FetchQuery) -> FetchTicket {
        self.query = FetchQuery {
            new_stock_code: None,
            ..query
        };
        let ticket = self.issue_ticket(FetchMode::Replace);
        self.latest_replace = ticket.seq;
        ticket
    }

    /// Start a fetch that adds the record keyed `key`.
    pub fn begin_add(&mut self, key: impl Into<String>) -> FetchTicket {
        self.issue_ticket(FetchMode::Add(key.into()))
    }

    fn issue_ticket(&mut self, mode: FetchMode) -> FetchTicket {
        self.latest_ticket += 1;
        FetchTicket {
            seq: self.latest_ticket,
            mode,
        }
    }

    /// Start a fetch from a clean table: the collection, sort rules and
    /// pagination are reset, and deleted keys are forgotten on dashboards
    /// that can delete. Filter inputs and hidden/pinned keys are kept.
    pub fn begin_reset_fetch(&mut self, query: FetchQuery) -> FetchTicket {
        self.records.clear();
        self.sort_rules = SortRules::new();
        self.pagination = Pagination::new(self.default_per_page);
        if self.profile.features.delete {
            self.deleted.clear();
        }
        self.last_error = None;
        self.records_changed();
        self.begin_fetch(query)
    }

    /// Apply the response of the fetch identified by `ticket`.
    ///
    /// A response is stale once a replacing fetch was started after it;
    /// adds never supersede anything. A failure resets the collection to
    /// empty.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<Record>, &SourceError>,
    ) -> FetchOutcome {
        if ticket.seq < self.latest_replace {
            tracing::debug!(
                seq = ticket.seq,
                latest_replace = self.latest_replace,
                "Discarding stale fetch response"
            );
            return FetchOutcome::Stale;
        }

        let fetched = match result {
            Ok(records) => records,
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.records.clear();
                self.records_changed();
                return FetchOutcome::Failed;
            }
        };
        self.last_error = None;

        let key_field = self.profile.key_field.clone();
        let added = match &ticket.mode {
            FetchMode::Replace => {
                self.records = fetched
                    .into_iter()
                    .filter(|r| !self.deleted.contains_record(r, &key_field))
                    .map(with_live_fields)
                    .collect();
                self.records.len()
            }
            FetchMode::Add(key) => {
                self.deleted.remove(key);
                let exists = self
                    .records
                    .iter()
                    .any(|r| r.key(&key_field).as_deref() == Some(key.as_str()));
                let matching = fetched
                    .into_iter()
                    .find(|r| r.key(&key_field).as_deref() == Some(key.as_str()));
                match matching {
                    Some(record) if !exists => {
                        self.records.push(with_live_fields(record));
                        1
                    }
                    _ => 0,
                }
            }
        };

        self.records_changed();
        FetchOutcome::Applied { added }
    }

    // -------------------------------------------------------------------------
    // Table interactions
    // -------------------------------------------------------------------------

    /// Header click on `field`.
    pub fn click_sort(&mut self, field: &str, additive: bool) {
        apply_sort_click(
            &mut self.visible,
            &mut self.sort_rules,
            field,
            additive,
            &self.profile.schema,
        );
        pin_first(&mut self.visible, &self.profile.key_field, &self.pinned);
        self.pagination.update(self.visible.len());
    }

    /// Move by `offset` pages. Returns whether the page changed.
    pub fn change_page(&mut self, offset: i64) -> bool {
        self.pagination.change_page(offset, |p| {
            tracing::trace!(page = p.current_page(), total = p.total_pages(), "Render page");
        })
    }

    /// Change the page size and go back to page 1.
    pub fn set_per_page(&mut self, per_page: usize) {
        self.pagination.set_per_page(per_page, self.visible.len());
    }

    /// Replace the filter inputs.
    pub fn set_filter(&mut self, filter: RecordFilter) {
        self.filter = filter;
        self.refresh_view();
    }

    /// Merge a realtime patch. Returns whether any value changed.
    pub fn apply_patch(&mut self, patch: &RealtimePatch) -> bool {
        let changed = merge(patch, &mut self.records, &self.profile.key_field);
        if changed {
            self.updated_at = Some(Utc::now());
            self.refresh_view();
        }
        changed
    }

    /// Toggle pinning of `key`. Returns whether it is now pinned.
    pub fn toggle_pin(&mut self, key: &str) -> Result<bool, FeatureDisabled> {
        if !self.profile.features.pin {
            return Err(FeatureDisabled("pin"));
        }
        let pinned = self.pinned.toggle(key);
        self.refresh_view();
        Ok(pinned)
    }

    /// Toggle hiding of `key`. Returns whether it is now hidden.
    pub fn toggle_hide(&mut self, key: &str) -> Result<bool, FeatureDisabled> {
        if !self.profile.features.hide {
            return Err(FeatureDisabled("hide"));
        }
        let hidden = self.hidden.toggle(key);
        self.refresh_view();
        Ok(hidden)
    }

    /// Show all hidden records again. Returns how many were hidden.
    pub fn clear_hidden(&mut self) -> usize {
        let count = self.hidden.len();
        self.hidden.clear();
        self.refresh_view();
        count
    }

    /// Delete the record keyed `key`. Returns whether a record was removed.
    pub fn delete(&mut self, key: &str) -> Result<bool, FeatureDisabled> {
        if !self.profile.features.delete {
            return Err(FeatureDisabled("delete"));
        }
        self.deleted.insert(key);
        let key_field = &self.profile.key_field;
        let before = self.records.len();
        self.records
            .retain(|r| r.key(key_field).as_deref() != Some(key));
        let removed = self.records.len() != before;
        self.records_changed();
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Capture the persistable state.
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            pagination: self.pagination,
            records: self.records.clone(),
            sort_rules: self.sort_rules.clone(),
            filter: self.filter.clone(),
            hidden: self.hidden.clone(),
            deleted: self.deleted.clone(),
            pinned: self.pinned.clone(),
            query: self.query.clone(),
            saved_at: Some(Utc::now()),
        }
    }

    /// Restore a previously captured state.
    pub fn restore(&mut self, snapshot: DashboardSnapshot) {
        let key_field = self.profile.key_field.clone();
        self.pagination = snapshot.pagination.sanitized();
        self.sort_rules = snapshot.sort_rules;
        self.filter = snapshot.filter;
        self.hidden = snapshot.hidden;
        self.deleted = snapshot.deleted;
        self.pinned = snapshot.pinned;
        self.records = snapshot
            .records
            .into_iter()
            .filter(|r| !self.deleted.contains_record(r, &key_field))
            .collect();
        if !snapshot.query.endpoint.is_empty() {
            self.query = snapshot.query;
        }
        self.updated_at = snapshot.saved_at;
        self.options = FilterOptions::from_records(&self.records);
        self.filter.reconcile(&self.options);
        self.refresh_view();
    }

    // -------------------------------------------------------------------------
    // View
    // -------------------------------------------------------------------------

    /// Build the render model of the current page.
    #[must_use]
    pub fn view(&self) -> DashboardView {
        let history_titles = self
            .visible
            .first()
            .map(|r| &r.recent_data)
            .into_iter()
            .flatten()
            .map(|day| day.trading_date.clone());

        let columns = self
            .profile
            .columns
            .iter()
            .map(|c| (c.field.clone(), c.title.clone()))
            .chain(
                self.profile
                    .history_fields()
                    .into_iter()
                    .zip(history_titles.chain(std::iter::repeat(None)))
                    .enumerate()
                    .map(|(i, (field, date))| {
                        (field, date.unwrap_or_else(|| format!("Day {}", i + 1)))
                    }),
            )
            .map(|(field, title)| {
                let indicator = self.sort_rules.indicator(&field);
                ViewColumn {
                    label: indicator.label(&title),
                    field,
                    title,
                    indicator,
                }
            })
            .collect();

        DashboardView {
            page_key: self.profile.page_key.clone(),
            rows: self.pagination.page_slice(&self.visible).to_vec(),
            pagination: self.pagination,
            page_label: self.pagination.label(),
            has_previous: self.pagination.has_previous(),
            has_next: self.pagination.has_next(),
            columns,
            total_rows: self.visible.len(),
            total_records: self.records.len(),
            hidden_count: self.hidden.len(),
            pinned: self.pinned.iter().map(ToString::to_string).collect(),
            filter: self.filter.clone(),
            options: self.options.clone(),
            sort_rules: self.sort_rules.clone(),
            features: self.profile.features,
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }
}

fn with_live_fields(mut record: Record) -> Record {
    record.ensure_live_fields();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::realtime::LiveFields;
    use crate::domain::record::{FieldValue, RecentDay};
    use crate::domain::sort::SortDirection;

    fn stock(code: &str, turnover: f64) -> Record {
        Record::new()
            .with("StockCode", code)
            .with("StockName", format!("Stock {code}"))
            .with("TurnoverAmount", turnover)
    }

    fn codes(records: &[Record]) -> Vec<String> {
        records.iter().filter_map(|r| r.key("StockCode")).collect()
    }

    fn loaded(profile: DashboardProfile, records: Vec<Record>) -> DashboardState {
        let mut state = DashboardState::new(profile, 2);
        let ticket = state.begin_fetch(FetchQuery::new("x"));
        state.complete_fetch(&ticket, Ok(records));
        state
    }

    #[test]
    fn fetch_fills_live_fields_and_paginates() {
        let state = loaded(
            DashboardProfile::stock_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0), stock("C", 3.0)],
        );
        assert_eq!(state.pagination().total_pages(), 2);
        assert_eq!(
            state.records()[0].get("RealtimePrice"),
            Some(&FieldValue::not_available())
        );
        assert_eq!(codes(&state.view().rows), ["A", "B"]);
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut state = DashboardState::new(DashboardProfile::stock_dashboard(), 30);
        let first = state.begin_fetch(FetchQuery::new("stock_data"));
        let second = state.begin_fetch(FetchQuery::new("stock_data"));

        assert_eq!(
            state.complete_fetch(&second, Ok(vec![stock("NEW", 1.0)])),
            FetchOutcome::Applied { added: 1 }
        );
        assert_eq!(
            state.complete_fetch(&first, Ok(vec![stock("OLD", 1.0)])),
            FetchOutcome::Stale
        );
        assert_eq!(codes(state.records()), ["NEW"]);
    }

    #[test]
    fn add_started_during_replace_does_not_supersede_it() {
        let mut state = loaded(DashboardProfile::custom_stock_dashboard(), vec![stock("OLD", 1.0)]);
        let replace = state.begin_fetch(FetchQuery::new("custom_stock_data"));
        let add = state.begin_add("B");

        assert_eq!(
            state.complete_fetch(&replace, Ok(vec![stock("NEW1", 1.0), stock("NEW2", 2.0)])),
            FetchOutcome::Applied { added: 2 }
        );
        assert_eq!(
            state.complete_fetch(&add, Ok(vec![stock("B", 3.0)])),
            FetchOutcome::Applied { added: 1 }
        );
        assert_eq!(codes(state.records()), ["NEW1", "NEW2", "B"]);
    }

    #[test]
    fn add_is_discarded_by_a_later_replace() {
        let mut state = loaded(DashboardProfile::custom_stock_dashboard(), vec![stock("A", 1.0)]);
        let add = state.begin_add("B");
        let replace = state.begin_fetch(FetchQuery::new("custom_stock_data"));

        state.complete_fetch(&replace, Ok(vec![stock("C", 1.0)]));
        assert_eq!(
            state.complete_fetch(&add, Ok(vec![stock("B", 2.0)])),
            FetchOutcome::Stale
        );
        assert_eq!(codes(state.records()), ["C"]);
    }

    #[test]
    fn failed_fetch_resets_records() {
        let mut state = loaded(DashboardProfile::stock_dashboard(), vec![stock("A", 1.0)]);
        let ticket = state.begin_fetch(FetchQuery::new("stock_data"));
        let err = SourceError::Malformed("expected array".into());

        assert_eq!(state.complete_fetch(&ticket, Err(&err)), FetchOutcome::Failed);
        assert!(state.records().is_empty());
        assert_eq!(state.pagination().total_pages(), 1);
        assert_eq!(state.last_error(), Some(err.to_string().as_str()));
    }

    #[test]
    fn sort_click_reorders_visible_rows() {
        let mut state = loaded(
            DashboardProfile::stock_dashboard(),
            vec![stock("A", 3.0), stock("B", 1.0), stock("C", 2.0)],
        );
        state.click_sort("TurnoverAmount", false);
        assert_eq!(codes(state.visible()), ["B", "C", "A"]);
        state.click_sort("TurnoverAmount", false);
        assert_eq!(codes(state.visible()), ["A", "C", "B"]);

        let view = state.view();
        let column = view
            .columns
            .iter()
            .find(|c| c.field == "TurnoverAmount")
            .unwrap();
        assert_eq!(column.label, "Turnover 1↓");
        assert_eq!(column.indicator.direction, Some(SortDirection::Desc));
    }

    #[test]
    fn patch_resorts_by_live_price() {
        let mut state = loaded(
            DashboardProfile::stock_dashboard(),
            vec![stock("A", 0.0), stock("B", 0.0)],
        );
        state.click_sort("RealtimePrice", false);

        let patch: RealtimePatch = [
            ("A".to_string(), LiveFields::new(20.0, 1.0)),
            ("B".to_string(), LiveFields::new(10.0, 1.0)),
        ]
        .into_iter()
        .collect();
        assert!(state.apply_patch(&patch));
        assert_eq!(codes(state.visible()), ["B", "A"]);
        assert!(!state.apply_patch(&patch));
    }

    #[test]
    fn deleted_records_are_not_resurrected() {
        let mut state = loaded(
            DashboardProfile::custom_stock_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0)],
        );
        assert_eq!(state.delete("A"), Ok(true));

        let patch: RealtimePatch = [("A".to_string(), LiveFields::new(1.0, 1.0))]
            .into_iter()
            .collect();
        assert!(!state.apply_patch(&patch));
        assert_eq!(codes(state.records()), ["B"]);

        let ticket = state.begin_fetch(FetchQuery::new("custom_stock_data"));
        state.complete_fetch(&ticket, Ok(vec![stock("A", 1.0), stock("B", 2.0)]));
        assert_eq!(codes(state.records()), ["B"]);
    }

    #[test]
    fn hidden_records_still_receive_patches() {
        let mut state = loaded(
            DashboardProfile::limitup_unfilled_orders_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0)],
        );
        assert_eq!(state.toggle_hide("A"), Ok(true));
        assert_eq!(codes(state.visible()), ["B"]);

        let patch: RealtimePatch = [("A".to_string(), LiveFields::new(9.0, 1.0))]
            .into_iter()
            .collect();
        assert!(state.apply_patch(&patch));
        assert_eq!(state.clear_hidden(), 1);
        assert_eq!(codes(state.visible()), ["A", "B"]);
        assert_eq!(
            state.visible()[0].get("RealtimePrice"),
            Some(&FieldValue::from(9.0))
        );
    }

    #[test]
    fn pinned_rows_come_first_under_any_sort() {
        let mut state = loaded(
            DashboardProfile::limitup_unfilled_orders_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0), stock("C", 3.0)],
        );
        state.toggle_pin("C").unwrap();
        assert_eq!(codes(state.visible()), ["C", "A", "B"]);
        state.click_sort("TurnoverAmount", false);
        state.click_sort("TurnoverAmount", false);
        assert_eq!(codes(state.visible()), ["C", "B", "A"]);
    }

    #[test]
    fn disabled_features_are_rejected() {
        let mut state = loaded(DashboardProfile::stock_dashboard(), vec![stock("A", 1.0)]);
        assert_eq!(state.toggle_pin("A"), Err(FeatureDisabled("pin")));
        assert_eq!(state.delete("A"), Err(FeatureDisabled("delete")));
        assert_eq!(codes(state.records()), ["A"]);
    }

    #[test]
    fn add_appends_only_missing_matching_record() {
        let mut state = loaded(DashboardProfile::custom_stock_dashboard(), vec![stock("A", 1.0)]);

        let ticket = state.begin_add("B");
        let outcome = state.complete_fetch(&ticket, Ok(vec![stock("A", 1.0), stock("B", 2.0)]));
        assert_eq!(outcome, FetchOutcome::Applied { added: 1 });
        assert_eq!(codes(state.records()), ["A", "B"]);

        let ticket = state.begin_add("B");
        let outcome = state.complete_fetch(&ticket, Ok(vec![stock("B", 2.0)]));
        assert_eq!(outcome, FetchOutcome::Applied { added: 0 });
        assert_eq!(state.records().len(), 2);
    }

    #[test]
    fn reset_fetch_forgets_deleted_keys_and_table_state() {
        let mut state = loaded(
            DashboardProfile::custom_stock_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0), stock("C", 3.0)],
        );
        state.delete("A").unwrap();
        state.click_sort("TurnoverAmount", false);
        state.set_per_page(1);
        assert!(state.change_page(1));

        let ticket = state.begin_reset_fetch(FetchQuery::new("custom_stock_data"));
        assert!(state.records().is_empty());
        assert!(state.deleted().is_empty());
        assert!(state.sort_rules().is_empty());
        assert_eq!(state.pagination().current_page(), 1);
        assert_eq!(state.pagination().per_page(), 2);

        state.complete_fetch(&ticket, Ok(vec![stock("A", 1.0), stock("B", 2.0), stock("C", 3.0)]));
        assert_eq!(codes(state.records()), ["A", "B", "C"]);
    }

    #[test]
    fn per_page_change_resets_page() {
        let mut state = loaded(
            DashboardProfile::stock_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0), stock("C", 3.0)],
        );
        assert!(state.change_page(1));
        assert_eq!(codes(&state.view().rows), ["C"]);
        state.set_per_page(10);
        assert_eq!(state.pagination().current_page(), 1);
        assert_eq!(state.view().rows.len(), 3);
    }

    #[test]
    fn snapshot_round_trip_restores_view() {
        let mut state = loaded(
            DashboardProfile::limitup_unfilled_orders_dashboard(),
            vec![stock("A", 1.0), stock("B", 2.0), stock("C", 3.0)],
        );
        state.click_sort("TurnoverAmount", false);
        state.toggle_hide("B").unwrap();
        state.toggle_pin("C").unwrap();
        let json = serde_json::to_string(&state.snapshot()).unwrap();

        let mut restored =
            DashboardState::new(DashboardProfile::limitup_unfilled_orders_dashboard(), 30);
        restored.restore(serde_json::from_str(&json).unwrap());
        assert_eq!(codes(restored.visible()), codes(state.visible()));
        assert_eq!(restored.sort_rules(), state.sort_rules());
        assert_eq!(restored.pagination().per_page(), 2);
    }

    #[test]
    fn history_columns_use_trading_dates() {
        let day = |date: &str| RecentDay {
            trading_date: Some(date.to_string()),
            ..RecentDay::default()
        };
        let state = loaded(
            DashboardProfile::stock_dashboard(),
            vec![stock("A", 1.0).with_history(vec![day("2025-01-03"), day("2025-01-02")])],
        );
        let view = state.view();
        let titles: Vec<&str> = view
            .columns
            .iter()
            .filter(|c| c.field.starts_with("recentChange"))
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, ["2025-01-03", "2025-01-02", "Day 3"]);
    }
}
