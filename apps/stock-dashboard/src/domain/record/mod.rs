//! Record Types
//!
//! A record is one monitored stock: a loose map of named scalar fields as
//! delivered by the backend, plus an optional `recent_data` history of the
//! last few trading days.
//!
//! Fields are kept dynamic because every dashboard variant ships a different
//! column set. Typed access happens at the edges (sort keys, filters, live
//! fields) through the helpers below.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Well-known field names
// =============================================================================

/// Field names shared by all dashboard variants.
pub mod fields {
    /// Business identifier of a stock (the default record key).
    pub const STOCK_CODE: &str = "StockCode";
    /// Display name of a stock.
    pub const STOCK_NAME: &str = "StockName";
    /// Category column used by the type filter.
    pub const RECORD_TYPE: &str = "type";
    /// Consecutive limit-up streak length.
    pub const STREAK_DAYS: &str = "StreakDays";
    /// Live price, patched by the push channel.
    pub const REALTIME_PRICE: &str = "RealtimePrice";
    /// Live change percentage, patched by the push channel.
    pub const REALTIME_CHANGE: &str = "RealtimeChange";
    /// Placeholder the backend uses for unavailable values.
    pub const NOT_AVAILABLE: &str = "N/A";
}

// =============================================================================
// Field Value
// =============================================================================

/// A single field value of a record.
///
/// Anything that is not a scalar is preserved verbatim in [`FieldValue::Other`]
/// so a record survives a snapshot round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// JSON `null`.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(String),
    /// Nested arrays or objects.
    Other(serde_json::Value),
}

impl FieldValue {
    /// Placeholder value for unavailable live data.
    #[must_use]
    pub fn not_available() -> Self {
        Self::Text(fields::NOT_AVAILABLE.to_string())
    }

    /// Whether this value counts as missing: null, empty, or `"N/A"`.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty() || s == fields::NOT_AVAILABLE,
            _ => false,
        }
    }

    /// Coerce to a number for numeric comparison.
    ///
    /// Missing values become negative infinity so they sort lowest.
    /// Unparsable values become `0.0`.
    #[must_use]
    pub fn to_sort_number(&self) -> f64 {
        if self.is_missing() {
            return f64::NEG_INFINITY;
        }
        let parsed = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_leading_float(s),
            _ => None,
        };
        match parsed {
            Some(n) if !n.is_nan() => n,
            _ => 0.0,
        }
    }

    /// Numeric view of the value, if it holds or parses to a finite number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
            _ => None,
        }
    }

    /// Text view of the value, as used for string comparison and search.
    ///
    /// `Null` renders as the empty string.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::Other(v) => v.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Parse the longest numeric prefix of `s`, ignoring leading whitespace.
fn parse_leading_float(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let mut best = None;
    for (idx, ch) in trimmed.char_indices() {
        let end = idx + ch.len_utf8();
        if let Ok(value) = trimmed[..end].parse::<f64>() {
            best = Some(value);
        } else if !matches!(ch, '+' | '-' | '.' | 'e' | 'E') {
            break;
        }
    }
    best
}

// =============================================================================
// Recent History
// =============================================================================

/// One day of a record's recent trading history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentDay {
    /// Trading date (`YYYY-MM-DD`).
    #[serde(rename = "trading_Date", default)]
    pub trading_date: Option<String>,
    /// Opening price.
    #[serde(default)]
    pub open: Option<f64>,
    /// High price.
    #[serde(default)]
    pub high: Option<f64>,
    /// Low price.
    #[serde(default)]
    pub low: Option<f64>,
    /// Closing price.
    #[serde(default)]
    pub close: Option<f64>,
    /// Percent change against the previous close.
    #[serde(default)]
    pub change_percent: Option<f64>,
}

// =============================================================================
// Record
// =============================================================================

/// One monitored stock with its current and historical metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Most recent trading days, newest first.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub recent_data: Vec<RecentDay>,
    /// All other fields, by name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style history setter.
    #[must_use]
    pub fn with_history(mut self, recent_data: Vec<RecentDay>) -> Self {
        self.recent_data = recent_data;
        self
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Set a field value, returning whether the stored value changed.
    pub fn set(&mut self, name: &str, value: FieldValue) -> bool {
        match self.fields.get_mut(name) {
            Some(existing) if *existing == value => false,
            Some(existing) => {
                *existing = value;
                true
            }
            None => {
                self.fields.insert(name.to_string(), value);
                true
            }
        }
    }

    /// Text of a field, empty when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(FieldValue::to_text).unwrap_or_default()
    }

    /// The record's business key read from `key_field`.
    ///
    /// Returns `None` when the key is absent or not a scalar.
    #[must_use]
    pub fn key(&self, key_field: &str) -> Option<String> {
        match self.get(key_field)? {
            FieldValue::Text(s) if !s.is_empty() => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The `index`th history entry, if present.
    #[must_use]
    pub fn history(&self, index: usize) -> Option<&RecentDay> {
        self.recent_data.get(index)
    }

    /// Fill absent live fields with the `"N/A"` placeholder.
    pub fn ensure_live_fields(&mut self) {
        for name in [fields::REALTIME_CHANGE, fields::REALTIME_PRICE] {
            let entry = self
                .fields
                .entry(name.to_string())
                .or_insert(FieldValue::Null);
            if matches!(entry, FieldValue::Null) {
                *entry = FieldValue::not_available();
            }
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<RecentDay>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<RecentDay>>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Tests
// =============================================================================
