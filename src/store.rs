//! Form state store: the accumulated record and per-step results.
//!
//! Writes are never validated here; validation is deferred to step
//! completion so a step can be edited freely while it is active.

use crate::model::{FieldValue, FormRecord, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Errors from list and row edits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Field {0} does not hold a list")]
    NotAList(String),
    #[error("Field {0} does not hold rows")]
    NotRows(String),
    #[error("Row {index} out of range for {field} ({len} row(s))")]
    RowOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormStore {
    record: FormRecord,
    #[serde(default)]
    results: BTreeMap<String, Value>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite-or-insert.
    pub fn set_field(&mut self, name: &str, value: FieldValue) {
        self.record.insert(name, value);
    }

    /// Owned copy of the record for rendering and validation.
    pub fn snapshot(&self) -> FormRecord {
        self.record.clone()
    }

    /// Borrowed view, for read-only callers inside the crate.
    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    /// Merge a step's derived payload; a re-completed step replaces its entry.
    pub fn merge_step_result(&mut self, step_id: &str, payload: Value) {
        self.results.insert(step_id.to_string(), payload);
    }

    pub fn results(&self) -> &BTreeMap<String, Value> {
        &self.results
    }

    pub fn reset(&mut self) {
        self.record.clear();
        self.results.clear();
    }

    /// Add `item` to the list if absent, remove it if present.
    /// Returns whether the item is selected afterwards.
    pub fn toggle_list_item(&mut self, name: &str, item: &str) -> Result<bool, EditError> {
        let mut items = match self.record.get(name) {
            None | Some(FieldValue::Null) => Vec::new(),
            Some(FieldValue::List(items)) => items.clone(),
            Some(_) => return Err(EditError::NotAList(name.to_string())),
        };

        let selected = match items.iter().position(|i| i == item) {
            Some(pos) => {
                items.remove(pos);
                false
            }
            None => {
                items.push(item.to_string());
                true
            }
        };
        self.record.insert(name, FieldValue::List(items));
        Ok(selected)
    }

    /// Append a row; returns its index.
    pub fn add_row(&mut self, name: &str, row: Row) -> Result<usize, EditError> {
        let mut rows = self.rows_of(name)?;
        rows.push(row);
        let index = rows.len() - 1;
        self.record.insert(name, FieldValue::Rows(rows));
        Ok(index)
    }

    /// Merge `cells` into the row at `index`.
    pub fn update_row(&mut self, name: &str, index: usize, cells: Row) -> Result<(), EditError> {
        let mut rows = self.rows_of(name)?;
        let len = rows.len();
        let row = rows.get_mut(index).ok_or_else(|| EditError::RowOutOfRange {
            field: name.to_string(),
            index,
            len,
        })?;
        row.extend(cells);
        self.record.insert(name, FieldValue::Rows(rows));
        Ok(())
    }

    /// Remove and return the row at `index`.
    pub fn remove_row(&mut self, name: &str, index: usize) -> Result<Row, EditError> {
        let mut rows = self.rows_of(name)?;
        if index >= rows.len() {
            return Err(EditError::RowOutOfRange {
                field: name.to_string(),
                index,
                len: rows.len(),
            });
        }
        let removed = rows.remove(index);
        self.record.insert(name, FieldValue::Rows(rows));
        Ok(removed)
    }

    fn rows_of(&self, name: &str) -> Result<Vec<Row>, EditError> {
        match self.record.get(name) {
            None | Some(FieldValue::Null) => Ok(Vec::new()),
            Some(FieldValue::Rows(rows)) => Ok(rows.clone()),
            Some(FieldValue::List(items)) if items.is_empty() => Ok(Vec::new()),
            Some(_) => Err(EditError::NotRows(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn set_overwrites_and_snapshot_is_detached() {
        let mut store = FormStore::new();
        store.set_field("severity", FieldValue::text("low"));
        store.set_field("severity", FieldValue::text("high"));

        let mut snap = store.snapshot();
        snap.insert("severity", FieldValue::text("tampered"));

        assert_eq!(store.record().get("severity"), Some(&FieldValue::text("high")));
        assert_eq!(store.record().len(), 1);
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut store = FormStore::new();
        store.set_field("bodyParts", FieldValue::list(["Head", "Chest"]));
        let before = store.snapshot();

        assert!(store.toggle_list_item("bodyParts", "Left Hand").unwrap());
        assert!(!store.toggle_list_item("bodyParts", "Left Hand").unwrap());
        assert_eq!(store.snapshot(), before);

        assert!(!store.toggle_list_item("bodyParts", "Head").unwrap());
        assert!(store.toggle_list_item("bodyParts", "Head").unwrap());
        // Re-selected items go to the back: selection order is kept
        assert_eq!(store.record().list("bodyParts"), ["Chest", "Head"]);
    }

    #[test]
    fn toggle_on_missing_field_starts_a_list() {
        let mut store = FormStore::new();
        assert!(store.toggle_list_item("ppe", "Helmet").unwrap());
        assert_eq!(store.record().list("ppe"), ["Helmet"]);

        store.set_field("severity", FieldValue::text("high"));
        assert_eq!(
            store.toggle_list_item("severity", "x"),
            Err(EditError::NotAList("severity".into()))
        );
    }

    #[test]
    fn row_operations() {
        let mut store = FormStore::new();
        assert_eq!(store.add_row("risks", row(&[("hazard", "Fire")])).unwrap(), 0);
        assert_eq!(store.add_row("risks", row(&[("hazard", "Noise")])).unwrap(), 1);

        store
            .update_row("risks", 0, row(&[("status", "controlled")]))
            .unwrap();
        assert_eq!(
            store.record().rows("risks")[0],
            row(&[("hazard", "Fire"), ("status", "controlled")])
        );

        let removed = store.remove_row("risks", 1).unwrap();
        assert_eq!(removed, row(&[("hazard", "Noise")]));
        assert_eq!(store.record().rows("risks").len(), 1);

        assert!(matches!(
            store.remove_row("risks", 5),
            Err(EditError::RowOutOfRange { index: 5, len: 1, .. })
        ));
    }

    #[test]
    fn rows_resume_from_persisted_empty_list() {
        let mut store = FormStore::new();
        store.set_field("attendees", FieldValue::List(vec![]));
        assert_eq!(store.add_row("attendees", row(&[("name", "A")])).unwrap(), 0);
    }

    #[test]
    fn reset_clears_record_and_results() {
        let mut store = FormStore::new();
        store.set_field("photo", FieldValue::text("file:///a.jpg"));
        store.merge_step_result("capture", json!({"ok": true}));
        store.reset();
        assert_eq!(store.snapshot(), FormRecord::new());
        assert!(store.results().is_empty());
    }

    #[test]
    fn merge_replaces_previous_payload() {
        let mut store = FormStore::new();
        store.merge_step_result("ppe", json!({"count": 1}));
        store.merge_step_result("ppe", json!({"count": 3}));
        assert_eq!(store.results()["ppe"], json!({"count": 3}));
    }
}
