//! Row selection with parallel key/value lists.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{Key, Record};

/// Who owns the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// The table reports the full selection on every change.
    #[default]
    Auto,

    /// Per-row and select-all events are applied incrementally.
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionType {
    #[default]
    Checkbox,
    Radio,
}

/// Checked keys and the records they belong to, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet<R> {
    pub checked_keys: Vec<Key>,
    pub checked_values: Vec<R>,
}

impl<R> Default for SelectionSet<R> {
    fn default() -> Self {
        Self {
            checked_keys: Vec::new(),
            checked_values: Vec::new(),
        }
    }
}

impl<R: Record> SelectionSet<R> {
    /// Build from records, skipping those without an id.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut set = Self::default();
        for record in records {
            if let Some(key) = record.id() {
                if !set.checked_keys.contains(&key) {
                    set.checked_keys.push(key);
                    set.checked_values.push(record);
                }
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.checked_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked_keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SelectionTracker<R> {
    mode: SelectionMode,
    selection_type: SelectionType,
    check_used: bool,
    set: SelectionSet<R>,
}

impl<R: Record> SelectionTracker<R> {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            selection_type: SelectionType::Checkbox,
            check_used: false,
            set: SelectionSet::default(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, selection_type: SelectionType) -> Self {
        self.selection_type = selection_type;
        self
    }

    /// When on, rows reporting `used()` cannot be checked.
    #[must_use]
    pub fn with_check_used(mut self, check_used: bool) -> Self {
        self.check_used = check_used;
        self
    }

    #[must_use]
    pub fn with_initial(mut self, records: impl IntoIterator<Item = R>) -> Self {
        self.set = SelectionSet::from_records(records);
        self
    }

    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn checked_keys(&self) -> &[Key] {
        &self.set.checked_keys
    }

    pub fn checked_values(&self) -> &[R] {
        &self.set.checked_values
    }

    pub fn snapshot(&self) -> SelectionSet<R> {
        self.set.clone()
    }

    pub fn is_checked(&self, key: &Key) -> bool {
        self.set.checked_keys.contains(key)
    }

    pub fn can_bulk_action(&self) -> bool {
        !self.set.is_empty()
    }

    pub fn is_selectable(&self, record: &R) -> bool {
        record.id().is_some() && !record.disabled() && !(self.check_used && record.used())
    }

    /// Auto mode: the table's report replaces the selection. Ignored in
    /// Manual mode.
    pub fn on_change(&mut self, rows: Vec<R>) -> bool {
        if self.mode != SelectionMode::Auto {
            trace!(marker = "SELECTION_IGNORED", operation_type = "selection", "Auto change in manual mode");
            return false;
        }
        self.set = SelectionSet::from_records(rows.into_iter().filter(|r| self.is_selectable(r)));
        true
    }

    /// Manual mode: check or uncheck one row. Ignored in Auto mode.
    pub fn toggle(&mut self, record: &R, checked: bool) -> bool {
        if self.mode != SelectionMode::Manual {
            return false;
        }
        if checked {
            self.check(record)
        } else {
            record.id().is_some_and(|key| self.uncheck(&key))
        }
    }

    /// Manual mode: select-all over only the rows that changed.
    pub fn toggle_all(&mut self, checked: bool, change_rows: &[R]) -> bool {
        if self.mode != SelectionMode::Manual {
            return false;
        }
        if checked {
            self.check_all(change_rows);
        } else {
            let keys: Vec<Key> = change_rows.iter().filter_map(Record::id).collect();
            self.uncheck_all(&keys);
        }
        true
    }

    /// Add a record if absent. Radio selection replaces instead.
    pub fn check(&mut self, record: &R) -> bool {
        if !self.is_selectable(record) {
            return false;
        }
        let Some(key) = record.id() else {
            return false;
        };

        if self.selection_type == SelectionType::Radio {
            self.set.checked_keys = vec![key];
            self.set.checked_values = vec![record.clone()];
            return true;
        }

        if self.is_checked(&key) {
            return false;
        }
        self.set.checked_keys.push(key);
        self.set.checked_values.push(record.clone());
        true
    }

    pub fn uncheck(&mut self, key: &Key) -> bool {
        match self.set.checked_keys.iter().position(|k| k == key) {
            Some(index) => {
                self.set.checked_keys.remove(index);
                self.set.checked_values.remove(index);
                true
            }
            None => false,
        }
    }

    /// Union with `rows`, de-duplicated by key.
    pub fn check_all(&mut self, rows: &[R]) {
        if self.selection_type == SelectionType::Radio {
            if let Some(first) = rows.iter().find(|r| self.is_selectable(r)) {
                let first = first.clone();
                self.check(&first);
            }
            return;
        }
        for row in rows {
            self.check(row);
        }
    }

    /// Remove every key in `keys`.
    pub fn uncheck_all(&mut self, keys: &[Key]) {
        let SelectionSet {
            checked_keys,
            checked_values,
        } = std::mem::take(&mut self.set);

        for (key, value) in checked_keys.into_iter().zip(checked_values) {
            if !keys.contains(&key) {
                self.set.checked_keys.push(key);
                self.set.checked_values.push(value);
            }
        }
    }

    /// A table's select-all event. An empty change set on a select-all keeps
    /// the current selection; otherwise the rows become the selection.
    pub fn change_items(&mut self, rows: Vec<R>, select_all: bool) {
        if select_all && rows.is_empty() {
            return;
        }
        self.set = SelectionSet::from_records(rows.into_iter().filter(|r| self.is_selectable(r)));
    }

    pub fn replace(&mut self, set: SelectionSet<R>) {
        self.set = set;
    }

    pub fn clear(&mut self) {
        self.set = SelectionSet::default();
    }
}
