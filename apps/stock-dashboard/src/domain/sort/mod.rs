//! Multi-Key Sort Engine
//!
//! Ordered `(field, direction)` rules applied as a stable multi-key sort over
//! a record collection, plus the header indicator projection.
//!
//! # Toggle cycle
//!
//! Clicking a column header cycles its rule `asc -> desc -> removed`. A plain
//! click on an unsorted column replaces all rules; an additive click (shift)
//! appends a new rule so earlier columns keep their priority.
//!
//! # Field extraction
//!
//! Numeric fields are coerced to `f64` with missing values sorting lowest.
//! History slot fields (`recentChange<N>`) read `recent_data[N].change_percent`.
//! Everything else compares as lowercase text.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::record::{FieldValue, Record};

// =============================================================================
// Constants
// =============================================================================

/// Prefix of history slot fields (`recentChange0`, `recentChange1`, ...).
pub const HISTORY_FIELD_PREFIX: &str = "recentChange";

/// Fields compared numerically by every dashboard.
pub const DEFAULT_NUMERIC_FIELDS: [&str; 11] = [
    "PopularityRank",
    "TurnoverAmount",
    "TurnoverRank",
    "YesterdayChange",
    "YesterdayClose",
    "RealtimeChange",
    "RealtimePrice",
    "StreakDays",
    "OpeningAmount",
    "LimitUpOrderAmount",
    "LimitUpOpenTimes",
];

// =============================================================================
// Sort Rules
// =============================================================================

/// Direction of a sort rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

impl SortDirection {
    /// Header arrow for this direction.
    #[must_use]
    pub const fn arrow(self) -> &'static str {
        match self {
            Self::Asc => "↑",
            Self::Desc => "↓",
        }
    }

    /// Apply this direction to an ascending comparison.
    #[must_use]
    pub const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// One `(field, direction)` sort criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRule {
    /// Field name the rule sorts by.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortRule {
    /// Create a rule.
    #[must_use]
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Ordered sort rules, highest priority first.
///
/// Never holds two rules for the same field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SortRule>", into = "Vec<SortRule>")]
pub struct SortRules(Vec<SortRule>);

impl From<Vec<SortRule>> for SortRules {
    fn from(rules: Vec<SortRule>) -> Self {
        let mut deduped: Vec<SortRule> = Vec::with_capacity(rules.len());
        for rule in rules {
            if !deduped.iter().any(|r| r.field == rule.field) {
                deduped.push(rule);
            }
        }
        Self(deduped)
    }
}

impl From<SortRules> for Vec<SortRule> {
    fn from(rules: SortRules) -> Self {
        rules.0
    }
}

impl SortRules {
    /// No rules.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Whether no rule is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of active rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Rules in priority order.
    #[must_use]
    pub fn as_slice(&self) -> &[SortRule] {
        &self.0
    }

    /// Iterate rules in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &SortRule> {
        self.0.iter()
    }

    /// Position of the rule for `field`, if any.
    #[must_use]
    pub fn position(&self, field: &str) -> Option<usize> {
        self.0.iter().position(|r| r.field == field)
    }

    /// Remove all rules.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Apply a header click on `field`.
    ///
    /// An existing rule flips `asc -> desc`, and a `desc` rule is removed.
    /// A new field is appended when `additive` and rules exist, otherwise it
    /// replaces all rules.
    pub fn toggle(&mut self, field: &str, additive: bool) {
        if let Some(idx) = self.position(field) {
            let direction = self.0[idx].direction;
            match direction {
                SortDirection::Asc => self.0[idx].direction = SortDirection::Desc,
                SortDirection::Desc => {
                    self.0.remove(idx);
                }
            }
            return;
        }

        if !additive {
            self.0.clear();
        }
        self.0.push(SortRule::new(field, SortDirection::Asc));
    }

    /// Indicator for a single column.
    #[must_use]
    pub fn indicator(&self, field: &str) -> SortIndicator {
        match self.position(field) {
            Some(idx) => SortIndicator {
                field: field.to_string(),
                active: true,
                direction: Some(self.0[idx].direction),
                ordinal: Some(idx + 1),
            },
            None => SortIndicator {
                field: field.to_string(),
                active: false,
                direction: None,
                ordinal: None,
            },
        }
    }

    /// Indicators for each column, in column order.
    #[must_use]
    pub fn indicators<'a, I>(&self, columns: I) -> Vec<SortIndicator>
    where
        I: IntoIterator<Item = &'a str>,
    {
        columns.into_iter().map(|c| self.indicator(c)).collect()
    }
}

impl<'a> IntoIterator for &'a SortRules {
    type Item = &'a SortRule;
    type IntoIter = std::slice::Iter<'a, SortRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Sort Indicator
// =============================================================================

/// Header state of one sortable column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortIndicator {
    /// Column field name.
    pub field: String,
    /// Whether a rule exists for this column.
    pub active: bool,
    /// Rule direction when active.
    pub direction: Option<SortDirection>,
    /// 1-based priority among active rules.
    pub ordinal: Option<usize>,
}

impl SortIndicator {
    /// Header text, e.g. `"Turnover 2↑"`. Inactive columns show the bare title.
    #[must_use]
    pub fn label(&self, title: &str) -> String {
        match (self.direction, self.ordinal) {
            (Some(direction), Some(ordinal)) if self.active => {
                format!("{title} {ordinal}{}", direction.arrow())
            }
            _ => title.to_string(),
        }
    }
}

// =============================================================================
// Sort Keys
// =============================================================================

/// Comparable value extracted from a record for one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Numeric key; missing values are negative infinity.
    Number(f64),
    /// Lowercased text key.
    Text(String),
}

impl SortKey {
    /// Ascending comparison. Keys of different kinds compare equal.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Decides how each field is extracted and compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSchema {
    numeric_fields: BTreeSet<String>,
    history_prefix: String,
}

impl Default for SortSchema {
    fn default() -> Self {
        Self {
            numeric_fields: DEFAULT_NUMERIC_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            history_prefix: HISTORY_FIELD_PREFIX.to_string(),
        }
    }
}

impl SortSchema {
    /// Add a field to the numeric set.
    #[must_use]
    pub fn with_numeric_field(mut self, field: impl Into<String>) -> Self {
        self.numeric_fields.insert(field.into());
        self
    }

    /// Whether `field` is a history slot field.
    #[must_use]
    pub fn is_history_field(&self, field: &str) -> bool {
        field.starts_with(&self.history_prefix)
    }

    /// History index of a slot field. `None` for non-slot or malformed names.
    #[must_use]
    pub fn history_index(&self, field: &str) -> Option<usize> {
        field.strip_prefix(&self.history_prefix)?.parse().ok()
    }

    /// Whether `field` compares numerically.
    #[must_use]
    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric_fields.contains(field) || self.is_history_field(field)
    }

    /// Extract the comparable key of `field` from `record`.
    #[must_use]
    pub fn sort_key(&self, record: &Record, field: &str) -> SortKey {
        if self.is_history_field(field) {
            let value = self
                .history_index(field)
                .and_then(|idx| record.history(idx))
                .and_then(|day| day.change_percent)
                .map_or(f64::NEG_INFINITY, |v| if v.is_nan() { 0.0 } else { v });
            return SortKey::Number(value);
        }

        let value = record.get(field);
        if self.is_numeric(field) {
            SortKey::Number(value.map_or(f64::NEG_INFINITY, FieldValue::to_sort_number))
        } else {
            SortKey::Text(
                value
                    .map(FieldValue::to_text)
                    .unwrap_or_default()
                    .to_lowercase(),
            )
        }
    }
}

// =============================================================================
// Sorting
// =============================================================================

/// Stable multi-key sort of `records` by `rules`.
///
/// The first rule whose keys differ decides. Full ties keep their relative
/// order. No rules is a no-op.
pub fn sort_records(records: &mut Vec<Record>, rules: &SortRules, schema: &SortSchema) {
    if rules.is_empty() || records.len() < 2 {
        return;
    }

    let mut keyed: Vec<(Vec<SortKey>, Record)> = std::mem::take(records)
        .into_iter()
        .map(|record| {
            let keys = rules
                .iter()
                .map(|rule| schema.sort_key(&record, &rule.field))
                .collect();
            (keys, record)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, rules));
    records.extend(keyed.into_iter().map(|(_, record)| record));
}

fn compare_keys(a: &[SortKey], b: &[SortKey], rules: &SortRules) -> Ordering {
    a.iter()
        .zip(b)
        .zip(rules)
        .map(|((ka, kb), rule)| rule.direction.apply(ka.compare(kb)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Toggle the rule for `field`, then re-sort `records`.
pub fn apply_sort_click(
    records: &mut Vec<Record>,
    rules: &mut SortRules,
    field: &str,
    additive: bool,
    schema: &SortSchema,
) {
    rules.toggle(field, additive);
    tracing::debug!(field, additive, rules = rules.len(), "Sort rules changed");
    sort_records(records, rules, schema);
}

// =============================================================================
// Tests
// =============================================================================
