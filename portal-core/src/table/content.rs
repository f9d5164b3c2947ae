//! src/table/content.rs
//! ============================================================================
//! # `ContentTable`: editable child rows of a detail record
//!
//! Rows live in an `Arc<Vec<Row<R>>>`. Readers take a snapshot (an `Arc`
//! clone) and writers go through `Arc::make_mut`, so a snapshot handed to a
//! renderer never changes underneath it. Each row carries a uuid that stays
//! fixed for its lifetime, independent of its position.

use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::FieldErrors;
use crate::model::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq)]
pub struct Row<R> {
    pub key: Uuid,
    pub record: R,
}

impl<R> Row<R> {
    fn new(record: R) -> Self {
        Self {
            key: Uuid::new_v4(),
            record,
        }
    }
}

/// Validates one cell before it is written.
pub type CellValidator<'a> = &'a dyn Fn(&FieldValue) -> Result<(), String>;

/// Validates a whole row before it is written.
pub type RowValidator<'a, R> = &'a dyn Fn(&R) -> Result<(), FieldErrors>;

#[derive(Debug, Clone)]
pub struct ContentTable<R> {
    rows: Arc<Vec<Row<R>>>,
    version: u64,
}

impl<R: Record> Default for ContentTable<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: Record> ContentTable<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            rows: Arc::new(records.into_iter().map(Row::new).collect()),
            version: 0,
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Row<R>>> {
        self.rows.clone()
    }

    /// Bumped on every write.
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> Vec<R> {
        self.rows.iter().map(|row| row.record.clone()).collect()
    }

    pub fn row(&self, key: Uuid) -> Option<&Row<R>> {
        self.rows.iter().find(|row| row.key == key)
    }

    fn position(&self, key: Uuid) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    fn rows_mut(&mut self) -> &mut Vec<Row<R>> {
        self.version += 1;
        Arc::make_mut(&mut self.rows)
    }

    /// Insert at the front.
    pub fn add_row(&mut self, record: R) -> Uuid {
        let row = Row::new(record);
        let key = row.key;
        self.rows_mut().insert(0, row);
        trace!(marker = "CONTENT_ROW_ADDED", operation_type = "content_table", %key, "Row added at front");
        key
    }

    /// Append at the back.
    pub fn add_row_with_data(&mut self, record: R) -> Uuid {
        let row = Row::new(record);
        let key = row.key;
        self.rows_mut().push(row);
        key
    }

    /// Insert right after `index`, or append when `index` is past the end.
    pub fn insert_row(&mut self, index: usize, record: R) -> Uuid {
        let row = Row::new(record);
        let key = row.key;
        let rows = self.rows_mut();
        let at = (index + 1).min(rows.len());
        rows.insert(at, row);
        key
    }

    pub fn delete_row(&mut self, key: Uuid) -> Option<R> {
        let index = self.position(key)?;
        let row = self.rows_mut().remove(index);
        debug!(marker = "CONTENT_ROW_DELETED", operation_type = "content_table", %key, "Row deleted");
        Some(row.record)
    }

    /// Write one cell. A failing validator records its message in the row's
    /// `errors` and leaves the value unchanged. Returns whether the value was
    /// written.
    pub fn change_cell(
        &mut self,
        key: Uuid,
        field: &str,
        value: FieldValue,
        validator: Option<CellValidator<'_>>,
    ) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };

        let verdict = validator.map_or(Ok(()), |validate| validate(&value));
        let record = &mut self.rows_mut()[index].record;
        match verdict {
            Ok(()) => {
                let written = record.set_field(field, value);
                if written {
                    if let Some(mut errors) = record.errors().cloned() {
                        if errors.shift_remove(field).is_some() {
                            record.set_errors(errors);
                        }
                    }
                }
                written
            }
            Err(message) => {
                record.merge_errors(FieldErrors::from([(field.to_string(), message)]));
                false
            }
        }
    }

    /// Replace a whole row. A failing validator merges its messages into the
    /// existing row instead.
    pub fn change_row(&mut self, key: Uuid, record: R, validator: Option<RowValidator<'_, R>>) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };

        let verdict = validator.map_or(Ok(()), |validate| validate(&record));
        let slot = &mut self.rows_mut()[index].record;
        match verdict {
            Ok(()) => {
                *slot = record;
                true
            }
            Err(errors) => {
                slot.merge_errors(errors);
                false
            }
        }
    }

    /// Drop every row and start over from `records`.
    pub fn reset(&mut self, records: Vec<R>) {
        self.rows = Arc::new(records.into_iter().map(Row::new).collect());
        self.version += 1;
    }
}
