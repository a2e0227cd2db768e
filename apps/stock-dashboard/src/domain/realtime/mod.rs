//! Realtime Merge
//!
//! Sparse keyed updates for the live fields of a record collection.
//!
//! A [`RealtimePatch`] maps record keys to the live fields that changed. It is
//! applied in place by [`merge`], which only overwrites the fields present in
//! each entry. Merging is idempotent and never adds or removes records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::record::{FieldValue, Record, fields};

// =============================================================================
// Errors
// =============================================================================

/// Errors decoding a realtime patch.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The payload is not valid JSON.
    #[error("invalid patch JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object keyed by record id.
    #[error("patch payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

// =============================================================================
// Live Fields
// =============================================================================

/// The live fields of one record carried by a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveFields {
    /// New `RealtimePrice`, if present.
    #[serde(rename = "RealtimePrice", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<FieldValue>,
    /// New `RealtimeChange`, if present.
    #[serde(rename = "RealtimeChange", default, skip_serializing_if = "Option::is_none")]
    pub change: Option<FieldValue>,
}

impl LiveFields {
    /// Build an entry with both fields set.
    #[must_use]
    pub fn new(price: impl Into<FieldValue>, change: impl Into<FieldValue>) -> Self {
        Self {
            price: Some(price.into()),
            change: Some(change.into()),
        }
    }

    /// Whether the entry carries no field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.price.is_none() && self.change.is_none()
    }

    /// Overwrite the present fields on `record`. Returns whether anything changed.
    pub fn apply_to(&self, record: &mut Record) -> bool {
        let mut changed = false;
        if let Some(price) = &self.price {
            changed |= record.set(fields::REALTIME_PRICE, price.clone());
        }
        if let Some(change) = &self.change {
            changed |= record.set(fields::REALTIME_CHANGE, change.clone());
        }
        changed
    }

    /// Lay `newer` over `self`, newer fields winning.
    pub fn overlay(&mut self, newer: Self) {
        if newer.price.is_some() {
            self.price = newer.price;
        }
        if newer.change.is_some() {
            self.change = newer.change;
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let entry = Self {
            price: object.get(fields::REALTIME_PRICE).and_then(scalar),
            change: object.get(fields::REALTIME_CHANGE).and_then(scalar),
        };
        (!entry.is_empty()).then_some(entry)
    }
}

fn scalar(value: &serde_json::Value) -> Option<FieldValue> {
    match value {
        serde_json::Value::Null => Some(FieldValue::Null),
        serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
        serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
        serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

// =============================================================================
// Realtime Patch
// =============================================================================

/// Map of record key to changed live fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealtimePatch {
    entries: HashMap<String, LiveFields>,
}

impl RealtimePatch {
    /// Empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a patch from JSON, skipping malformed entries.
    ///
    /// Only a non-object top level is an error.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PatchError> {
        let object = value.as_object().ok_or(PatchError::NotAnObject(json_kind(value)))?;
        let entries = object
            .iter()
            .filter_map(|(key, entry)| LiveFields::from_json(entry).map(|e| (key.clone(), e)))
            .collect();
        Ok(Self { entries })
    }

    /// Decode a patch from JSON text.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Set the entry for `key`, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, fields: LiveFields) {
        self.entries.insert(key.into(), fields);
    }

    /// Entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&LiveFields> {
        self.entries.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the patch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold a newer patch into this one. Newer fields win per key.
    pub fn coalesce(&mut self, newer: Self) {
        for (key, fields) in newer.entries {
            self.entries.entry(key).or_default().overlay(fields);
        }
    }
}

impl FromIterator<(String, LiveFields)> for RealtimePatch {
    fn from_iter<T: IntoIterator<Item = (String, LiveFields)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Apply `patch` to `records`, matching on `key_field`.
///
/// Records without a matching entry are left untouched. Returns whether any
/// field value changed.
pub fn merge(patch: &RealtimePatch, records: &mut [Record], key_field: &str) -> bool {
    if patch.is_empty() {
        return false;
    }
    let mut changed = false;
    for record in records.iter_mut() {
        let Some(key) = record.key(key_field) else {
            continue;
        };
        if let Some(entry) = patch.get(&key) {
            changed |= entry.apply_to(record);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stock(code: &str, price: f64) -> Record {
        Record::new()
            .with("StockCode", code)
            .with("RealtimePrice", price)
            .with("RealtimeChange", 0.0)
            .with("StockName", "name")
    }

    #[test]
    fn merge_updates_only_present_fields() {
        let mut records = vec![stock("A", 10.0), stock("B", 20.0)];
        let mut patch = RealtimePatch::new();
        patch.insert(
            "A",
            LiveFields {
                price: Some(FieldValue::from(11.0)),
                change: None,
            },
        );

        assert!(merge(&patch, &mut records, "StockCode"));
        assert_eq!(records[0].get("RealtimePrice"), Some(&FieldValue::from(11.0)));
        assert_eq!(records[0].get("RealtimeChange"), Some(&FieldValue::from(0.0)));
        assert_eq!(records[1], stock("B", 20.0));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut records = vec![stock("A", 10.0)];
        let patch: RealtimePatch = [("A".to_string(), LiveFields::new(12.5, 3.1))]
            .into_iter()
            .collect();

        assert!(merge(&patch, &mut records, "StockCode"));
        let once = records.clone();
        assert!(!merge(&patch, &mut records, "StockCode"));
        assert_eq!(records, once);
    }

    #[test]
    fn unmatched_keys_leave_records_unchanged() {
        let mut records = vec![stock("A", 10.0)];
        let patch: RealtimePatch = [("Z".to_string(), LiveFields::new(1.0, 1.0))]
            .into_iter()
            .collect();
        assert!(!merge(&patch, &mut records, "StockCode"));
        assert_eq!(records, vec![stock("A", 10.0)]);
    }

    #[test]
    fn from_json_skips_malformed_entries() {
        let patch = RealtimePatch::from_json(&json!({
            "A": {"RealtimePrice": 10.5, "RealtimeChange": "1.2"},
            "B": "garbage",
            "C": {"RealtimePrice": [1, 2]},
            "D": {"Other": 1},
            "E": {"RealtimeChange": null}
        }))
        .unwrap();

        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get("A"), Some(&LiveFields::new(10.5, "1.2")));
        assert_eq!(
            patch.get("E"),
            Some(&LiveFields {
                price: None,
                change: Some(FieldValue::Null)
            })
        );
    }

    #[test]
    fn from_json_rejects_non_object() {
        let err = RealtimePatch::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, PatchError::NotAnObject("array")));
        assert!(matches!(
            RealtimePatch::parse("not json"),
            Err(PatchError::Json(_))
        ));
    }

    #[test]
    fn coalesce_keeps_newest_fields() {
        let mut older: RealtimePatch = [
            ("A".to_string(), LiveFields::new(1.0, 0.1)),
            ("B".to_string(), LiveFields::new(2.0, 0.2)),
        ]
        .into_iter()
        .collect();
        let mut newer = RealtimePatch::new();
        newer.insert(
            "A",
            LiveFields {
                price: Some(FieldValue::from(1.5)),
                change: None,
            },
        );

        older.coalesce(newer);
        assert_eq!(older.get("A"), Some(&LiveFields::new(1.5, 0.1)));
        assert_eq!(older.get("B"), Some(&LiveFields::new(2.0, 0.2)));
    }
}
