//! Record Filtering and Membership
//!
//! Search, category and streak filters over a record collection, plus the
//! keyed membership sets (hidden, deleted, pinned) that the dashboards toggle
//! per row.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::record::{FieldValue, Record, fields};

/// Option value that disables a filter.
pub const ALL: &str = "All";

// =============================================================================
// Streak Filter
// =============================================================================

/// Filter on the `StreakDays` field.
///
/// Serialized as `All`, `exact_N`, `gte_N` or `lte_N`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StreakFilter {
    /// No restriction.
    #[default]
    All,
    /// Streak equal to the value.
    Exact(i64),
    /// Streak at least the value.
    AtLeast(i64),
    /// Streak at most the value.
    AtMost(i64),
}

impl StreakFilter {
    /// Whether a record with streak `days` passes. Records with no streak
    /// always pass.
    #[must_use]
    pub fn matches(self, days: Option<i64>) -> bool {
        let Some(days) = days else {
            return true;
        };
        match self {
            Self::All => true,
            Self::Exact(n) => days == n,
            Self::AtLeast(n) => days >= n,
            Self::AtMost(n) => days <= n,
        }
    }

    /// Human label for a filter option.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::All => ALL.to_string(),
            Self::Exact(n) => n.to_string(),
            Self::AtLeast(n) => format!(">= {n}"),
            Self::AtMost(n) => format!("<= {n}"),
        }
    }
}

impl fmt::Display for StreakFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Exact(n) => write!(f, "exact_{n}"),
            Self::AtLeast(n) => write!(f, "gte_{n}"),
            Self::AtMost(n) => write!(f, "lte_{n}"),
        }
    }
}

impl FromStr for StreakFilter {
    type Err = std::convert::Infallible;

    /// Unrecognized values parse as [`StreakFilter::All`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = s.split_once('_').and_then(|(condition, value)| {
            let n = value.trim().parse().ok()?;
            match condition {
                "exact" => Some(Self::Exact(n)),
                "gte" => Some(Self::AtLeast(n)),
                "lte" => Some(Self::AtMost(n)),
                _ => None,
            }
        });
        Ok(parsed.unwrap_or(Self::All))
    }
}

impl Serialize for StreakFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StreakFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn streak_of(record: &Record) -> Option<i64> {
    match record.get(fields::STREAK_DAYS)? {
        FieldValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        FieldValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Record Filter
// =============================================================================

/// Active filter inputs of a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordFilter {
    /// Case-insensitive substring over code and name.
    pub search: String,
    /// Required `type` value; `None` or `"All"` disables.
    pub record_type: Option<String>,
    /// Streak restriction.
    pub streak: StreakFilter,
}

impl RecordFilter {
    /// Whether `record` passes every filter.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.matches_search(record)
            && self.matches_type(record)
            && self.streak.matches(streak_of(record))
    }

    fn matches_search(&self, record: &Record) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [fields::STOCK_CODE, fields::STOCK_NAME]
            .iter()
            .any(|field| record.text(field).to_lowercase().contains(&needle))
    }

    fn matches_type(&self, record: &Record) -> bool {
        match self.record_type.as_deref() {
            None | Some(ALL) => true,
            Some(wanted) => record
                .get(fields::RECORD_TYPE)
                .is_some_and(|v| v.to_text() == wanted),
        }
    }

    /// Fall back to `All` for selections no longer offered by `options`.
    pub fn reconcile(&mut self, options: &FilterOptions) {
        let stale_type = self
            .record_type
            .as_deref()
            .is_some_and(|wanted| wanted != ALL && !options.types.iter().any(|t| t == wanted));
        if stale_type {
            self.record_type = None;
        }
        if self.streak != StreakFilter::All
            && !options.streaks.iter().any(|o| o.value == self.streak)
        {
            self.streak = StreakFilter::All;
        }
    }
}

// =============================================================================
// Key Set
// =============================================================================

/// A set of record keys toggled per row (hidden, deleted, pinned).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySet(BTreeSet<String>);

impl KeySet {
    /// Empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Flip membership of `key`. Returns whether it is now a member.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.0.remove(key) {
            false
        } else {
            self.0.insert(key.to_string());
            true
        }
    }

    /// Add `key`. Returns whether it was newly added.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.0.insert(key.into())
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key)
    }

    /// Remove all keys.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Whether `key` is a member.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Whether the record keyed by `key_field` is a member.
    #[must_use]
    pub fn contains_record(&self, record: &Record, key_field: &str) -> bool {
        record.key(key_field).is_some_and(|k| self.0.contains(&k))
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for KeySet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Filtering
// =============================================================================

/// Records passing `filter` and not in `hidden`, in original order.
#[must_use]
pub fn apply_filters(
    records: &[Record],
    key_field: &str,
    filter: &RecordFilter,
    hidden: &KeySet,
) -> Vec<Record> {
    records
        .iter()
        .filter(|r| !hidden.contains_record(r, key_field) && filter.matches(r))
        .cloned()
        .collect()
}

/// Stable partition putting pinned records first.
pub fn pin_first(records: &mut Vec<Record>, key_field: &str, pinned: &KeySet) {
    if pinned.is_empty() {
        return;
    }
    let (mut head, tail): (Vec<Record>, Vec<Record>) = std::mem::take(records)
        .into_iter()
        .partition(|r| pinned.contains_record(r, key_field));
    head.extend(tail);
    *records = head;
}

// =============================================================================
// Filter Options
// =============================================================================

/// One selectable streak option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakOption {
    /// Option value.
    pub value: StreakFilter,
    /// Display text.
    pub label: String,
}

/// Choices offered by the filter inputs for the current records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Distinct `type` values, sorted.
    pub types: Vec<String>,
    /// `exact_N` options first, then `gte_N`/`lte_N` pairs, by ascending N.
    pub streaks: Vec<StreakOption>,
}

impl FilterOptions {
    /// Collect options from `records`.
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        let types: BTreeSet<String> = records
            .iter()
            .filter_map(|r| r.get(fields::RECORD_TYPE))
            .filter(|v| !matches!(v, FieldValue::Null))
            .map(FieldValue::to_text)
            .collect();
        let days: BTreeSet<i64> = records.iter().filter_map(streak_of).collect();

        let option = |value: StreakFilter| StreakOption {
            label: value.label(),
            value,
        };
        let mut streaks: Vec<StreakOption> =
            days.iter().map(|d| option(StreakFilter::Exact(*d))).collect();
        for d in &days {
            streaks.push(option(StreakFilter::AtLeast(*d)));
            streaks.push(option(StreakFilter::AtMost(*d)));
        }

        Self {
            types: types.into_iter().collect(),
            streaks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn stock(code: &str, name: &str, kind: &str, streak: Option<i64>) -> Record {
        let record = Record::new()
            .with("StockCode", code)
            .with("StockName", name)
            .with("type", kind);
        match streak {
            Some(days) => record.with("StreakDays", days),
            None => record.with("StreakDays", FieldValue::Null),
        }
    }

    fn codes(records: &[Record]) -> Vec<String> {
        records.iter().filter_map(|r| r.key("StockCode")).collect()
    }

    fn sample() -> Vec<Record> {
        vec![
            stock("600000", "Pudong Bank", "bank", Some(1)),
            stock("000001", "Ping An", "bank", Some(3)),
            stock("300750", "CATL", "battery", None),
            stock("002594", "BYD", "auto", Some(2)),
        ]
    }

    #[test_case("exact_3", StreakFilter::Exact(3))]
    #[test_case("gte_2", StreakFilter::AtLeast(2))]
    #[test_case("lte_1", StreakFilter::AtMost(1))]
    #[test_case("All", StreakFilter::All)]
    #[test_case("bogus_1", StreakFilter::All)]
    #[test_case("exact_x", StreakFilter::All)]
    fn parse_streak_filter(raw: &str, expected: StreakFilter) {
        assert_eq!(raw.parse::<StreakFilter>().unwrap(), expected);
    }

    #[test]
    fn streak_filter_round_trips_through_json() {
        let json = serde_json::to_string(&StreakFilter::AtLeast(4)).unwrap();
        assert_eq!(json, r#""gte_4""#);
        let back: StreakFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StreakFilter::AtLeast(4));
    }

    #[test]
    fn search_matches_code_or_name() {
        let filter = RecordFilter {
            search: "ping".into(),
            ..RecordFilter::default()
        };
        assert_eq!(codes(&apply_filters(&sample(), "StockCode", &filter, &KeySet::new())), ["000001"]);

        let filter = RecordFilter {
            search: "3007".into(),
            ..RecordFilter::default()
        };
        assert_eq!(codes(&apply_filters(&sample(), "StockCode", &filter, &KeySet::new())), ["300750"]);
    }

    #[test]
    fn type_filter_and_all() {
        let mut filter = RecordFilter {
            record_type: Some("bank".into()),
            ..RecordFilter::default()
        };
        assert_eq!(
            codes(&apply_filters(&sample(), "StockCode", &filter, &KeySet::new())),
            ["600000", "000001"]
        );
        filter.record_type = Some(ALL.into());
        assert_eq!(apply_filters(&sample(), "StockCode", &filter, &KeySet::new()).len(), 4);
    }

    #[test]
    fn streak_filter_passes_null_streaks() {
        let filter = RecordFilter {
            streak: StreakFilter::AtLeast(2),
            ..RecordFilter::default()
        };
        assert_eq!(
            codes(&apply_filters(&sample(), "StockCode", &filter, &KeySet::new())),
            ["000001", "300750", "002594"]
        );
    }

    #[test]
    fn hidden_records_are_excluded() {
        let hidden: KeySet = ["000001", "002594"].into_iter().collect();
        let visible = apply_filters(&sample(), "StockCode", &RecordFilter::default(), &hidden);
        assert_eq!(codes(&visible), ["600000", "300750"]);
    }

    #[test]
    fn key_set_toggle() {
        let mut set = KeySet::new();
        assert!(set.toggle("A"));
        assert!(set.contains("A"));
        assert!(!set.toggle("A"));
        assert!(set.is_empty());
    }

    #[test]
    fn pin_first_is_stable() {
        let mut records = sample();
        let pinned: KeySet = ["002594", "000001"].into_iter().collect();
        pin_first(&mut records, "StockCode", &pinned);
        assert_eq!(codes(&records), ["000001", "002594", "600000", "300750"]);
    }

    #[test]
    fn options_from_records() {
        let options = FilterOptions::from_records(&sample());
        assert_eq!(options.types, ["auto", "bank", "battery"]);

        let values: Vec<String> = options.streaks.iter().map(|o| o.value.to_string()).collect();
        assert_eq!(
            values,
            ["exact_1", "exact_2", "exact_3", "gte_1", "lte_1", "gte_2", "lte_2", "gte_3", "lte_3"]
        );
        assert_eq!(options.streaks[3].label, ">= 1");
    }

    #[test]
    fn reconcile_drops_stale_selections() {
        let options = FilterOptions::from_records(&sample());
        let mut filter = RecordFilter {
            search: "x".into(),
            record_type: Some("insurance".into()),
            streak: StreakFilter::Exact(9),
        };
        filter.reconcile(&options);
        assert_eq!(filter.record_type, None);
        assert_eq!(filter.streak, StreakFilter::All);
        assert_eq!(filter.search, "x");

        let mut kept = RecordFilter {
            record_type: Some("bank".into()),
            streak: StreakFilter::AtMost(2),
            ..RecordFilter::default()
        };
        kept.reconcile(&options);
        assert_eq!(kept.record_type.as_deref(), Some("bank"));
        assert_eq!(kept.streak, StreakFilter::AtMost(2));
    }
}
