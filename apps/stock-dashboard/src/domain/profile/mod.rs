//! Dashboard Profiles
//!
//! Every dashboard runs the same table engine. A profile captures what
//! differs between them: backend endpoint, record key, sortable columns,
//! history slot count, query requirements and enabled row actions.

use serde::Serialize;

use crate::domain::record::fields;
use crate::domain::sort::{HISTORY_FIELD_PREFIX, SortSchema};

/// A sortable table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Record field the column shows and sorts by.
    pub field: String,
    /// Header title.
    pub title: String,
}

impl Column {
    fn new(field: &str, title: &str) -> Self {
        Self {
            field: field.to_string(),
            title: title.to_string(),
        }
    }
}

/// Row actions a dashboard exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    /// Rows can be deleted from the collection.
    pub delete: bool,
    /// Rows can be hidden and shown again.
    pub hide: bool,
    /// Rows can be pinned to the top.
    pub pin: bool,
    /// Single records can be added by key.
    pub add: bool,
    /// The key list can be saved back to the backend.
    pub save_keys: bool,
}

/// Configuration of one dashboard variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardProfile {
    /// Profile name and snapshot key.
    pub page_key: String,
    /// Backend endpoint path under `/api/`.
    pub endpoint: String,
    /// Field holding the record key.
    pub key_field: String,
    /// Sortable columns, excluding history slots.
    pub columns: Vec<Column>,
    /// Number of `recentChange<N>` history columns.
    pub history_columns: usize,
    /// Whether fetches require a trading date.
    pub requires_date: bool,
    /// Whether fetches accept sector codes.
    pub accepts_sectors: bool,
    /// Enabled row actions.
    pub features: Features,
    /// Field comparison rules.
    #[serde(skip)]
    pub schema: SortSchema,
}

/// Names of the built-in profiles.
pub const PROFILE_NAMES: [&str; 4] = [
    "stock_dashboard",
    "custom_stock_dashboard",
    "limitup_unfilled_orders_dashboard",
    "ma_strategy_dashboard",
];

fn base_columns() -> Vec<Column> {
    vec![
        Column::new(fields::STOCK_CODE, "Code"),
        Column::new(fields::STOCK_NAME, "Name"),
        Column::new("PopularityRank", "Popularity"),
        Column::new("TurnoverAmount", "Turnover"),
        Column::new("TurnoverRank", "Turnover Rank"),
        Column::new(fields::REALTIME_CHANGE, "Change %"),
        Column::new(fields::REALTIME_PRICE, "Price"),
        Column::new("ReasonCategory", "Reason"),
    ]
}

impl DashboardProfile {
    /// Sector dashboard: `stock_data` by date and sector codes.
    #[must_use]
    pub fn stock_dashboard() -> Self {
        let mut columns = base_columns();
        columns.push(Column::new("LatestLimitUpDate", "Last Limit-Up"));
        columns.push(Column::new(fields::RECORD_TYPE, "Type"));
        Self {
            page_key: "stock_dashboard".into(),
            endpoint: "stock_data".into(),
            key_field: fields::STOCK_CODE.into(),
            columns,
            history_columns: 3,
            requires_date: true,
            accepts_sectors: true,
            features: Features::default(),
            schema: SortSchema::default(),
        }
    }

    /// Watch list dashboard backed by a saved key list.
    #[must_use]
    pub fn custom_stock_dashboard() -> Self {
        let mut columns = base_columns();
        columns.push(Column::new("YesterdayChange", "Prev Change %"));
        columns.push(Column::new("YesterdayClose", "Prev Close"));
        columns.push(Column::new("LatestLimitUpDate", "Last Limit-Up"));
        Self {
            page_key: "custom_stock_dashboard".into(),
            endpoint: "custom_stock_data".into(),
            key_field: fields::STOCK_CODE.into(),
            columns,
            history_columns: 5,
            requires_date: false,
            accepts_sectors: false,
            features: Features {
                delete: true,
                add: true,
                save_keys: true,
                ..Features::default()
            },
            schema: SortSchema::default(),
        }
    }

    /// Limit-up stocks with unfilled buy orders.
    #[must_use]
    pub fn limitup_unfilled_orders_dashboard() -> Self {
        let mut columns = base_columns();
        columns.extend([
            Column::new(fields::STREAK_DAYS, "Streak"),
            Column::new("FirstLimitUpTime", "First Limit-Up"),
            Column::new("FinalLimitUpTime", "Final Limit-Up"),
            Column::new("OpeningAmount", "Opening Amount"),
            Column::new("LimitUpOrderAmount", "Order Amount"),
            Column::new("LimitUpOpenTimes", "Open Times"),
        ]);
        Self {
            page_key: "limitup_unfilled_orders_dashboard".into(),
            endpoint: "limitup_unfilled_orders_data".into(),
            key_field: fields::STOCK_CODE.into(),
            columns,
            history_columns: 5,
            requires_date: true,
            accepts_sectors: false,
            features: Features {
                hide: true,
                pin: true,
                ..Features::default()
            },
            schema: SortSchema::default(),
        }
    }

    /// Moving-average strategy picks.
    #[must_use]
    pub fn ma_strategy_dashboard() -> Self {
        let mut columns = base_columns();
        columns.push(Column::new("LatestLimitUpDate", "Last Limit-Up"));
        columns.push(Column::new(fields::RECORD_TYPE, "Type"));
        Self {
            page_key: "ma_strategy_dashboard".into(),
            endpoint: "ma_strategy_data".into(),
            key_field: fields::STOCK_CODE.into(),
            columns,
            history_columns: 5,
            requires_date: true,
            accepts_sectors: false,
            features: Features::default(),
            schema: SortSchema::default(),
        }
    }

    /// Look up a built-in profile by name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "stock_dashboard" => Some(Self::stock_dashboard()),
            "custom_stock_dashboard" => Some(Self::custom_stock_dashboard()),
            "limitup_unfilled_orders_dashboard" => Some(Self::limitup_unfilled_orders_dashboard()),
            "ma_strategy_dashboard" => Some(Self::ma_strategy_dashboard()),
            _ => None,
        }
    }

    /// Field names of the history slot columns.
    #[must_use]
    pub fn history_fields(&self) -> Vec<String> {
        (0..self.history_columns)
            .map(|i| format!("{HISTORY_FIELD_PREFIX}{i}"))
            .collect()
    }

    /// All sortable field names, history slots last.
    #[must_use]
    pub fn sortable_fields(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.field.clone())
            .chain(self.history_fields())
            .collect()
    }

    /// Whether `field` is a sortable column of this profile.
    #[must_use]
    pub fn is_sortable(&self, field: &str) -> bool {
        self.columns.iter().any(|c| c.field == field)
            || self
                .schema
                .history_index(field)
                .is_some_and(|i| i < self.history_columns)
    }
}
