//! Records, keys and field values.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;

pub const ID_FIELD: &str = "id";
pub const PARENT_ID_FIELD: &str = "parentId";
pub const NAME_FIELD: &str = "name";
pub const DISABLED_FIELD: &str = "disabled";
pub const USED_FIELD: &str = "used";
pub const HAS_CHILDREN_FIELD: &str = "hasChildren";

/// Unique record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(i64),
    Text(CompactString),
}

impl Key {
    /// Numeric strings become numeric keys; empty input has no key.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(
            raw.parse::<i64>()
                .map_or_else(|_| Self::Text(raw.into()), Self::Number),
        )
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

/// A typed field value.
///
/// Deserialization is untagged: RFC 3339 strings become dates, other strings
/// stay text, and anything structured is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Date(DateTime<Utc>),
    Text(CompactString),
    Key(Key),
    Json(serde_json::Value),
}

impl FieldValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Interpret the value as an identifier. Fractional numbers are not keys.
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Self::Key(k) => Some(k.clone()),
            Self::Number(n) if n.fract() == 0.0 => Some(Key::Number(*n as i64)),
            Self::Text(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Date(_) => 3,
            Self::Text(_) => 4,
            Self::Key(_) => 5,
            Self::Json(_) => 6,
        }
    }

    /// Total order used for sorting: nulls first, then by kind, then by value.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Key(a), Self::Key(b)) => a.cmp(b),
            (Self::Json(a), Self::Json(b)) => a.to_string().cmp(&b.to_string()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Key> for FieldValue {
    fn from(value: Key) -> Self {
        Self::Key(value)
    }
}

/// Per-field validation outcome shown next to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Error,
    Warning,
}

/// Anything the collection machinery can list, filter, select and edit.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> Option<Key>;

    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Overwrite a field. Returns false when the record has no such slot.
    fn set_field(&mut self, _name: &str, _value: FieldValue) -> bool {
        false
    }

    fn errors(&self) -> Option<&FieldErrors>;

    fn set_errors(&mut self, errors: FieldErrors);

    fn warnings(&self) -> Option<&FieldErrors> {
        None
    }

    fn parent_id(&self) -> Option<Key> {
        self.field(PARENT_ID_FIELD).and_then(|v| v.as_key())
    }

    fn title(&self) -> String {
        self.field(NAME_FIELD)
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default()
    }

    fn disabled(&self) -> bool {
        self.field(DISABLED_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn used(&self) -> bool {
        self.field(USED_FIELD).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn has_children(&self) -> bool {
        self.field(HAS_CHILDREN_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Error wins over warning.
    fn validation(&self, field: &str) -> Option<(ValidationState, String)> {
        if let Some(msg) = self.errors().and_then(|e| e.get(field)) {
            return Some((ValidationState::Error, msg.clone()));
        }
        self.warnings()
            .and_then(|w| w.get(field))
            .map(|msg| (ValidationState::Warning, msg.clone()))
    }

    /// Merge messages into the existing error map.
    fn merge_errors(&mut self, errors: FieldErrors) {
        let mut merged = self.errors().cloned().unwrap_or_default();
        merged.extend(errors);
        self.set_errors(merged);
    }
}

/// Schemaless record backed by an ordered field map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Key>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<FieldErrors>,

    #[serde(flatten)]
    pub fields: IndexMap<String, FieldValue>,
}

impl DynamicRecord {
    pub fn new(id: impl Into<Key>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// A record that has not been saved yet.
    pub fn unsaved() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn with_warning(mut self, name: &str, message: &str) -> Self {
        self.warnings
            .get_or_insert_with(FieldErrors::new)
            .insert(name.to_string(), message.to_string());
        self
    }
}

impl Record for DynamicRecord {
    fn id(&self) -> Option<Key> {
        self.id.clone()
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        if name == ID_FIELD {
            return self.id.clone().map(FieldValue::Key);
        }
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        if name == ID_FIELD {
            self.id = value.as_key();
        } else {
            self.fields.insert(name.to_string(), value);
        }
        true
    }

    fn errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }

    fn set_errors(&mut self, errors: FieldErrors) {
        self.errors = Some(errors);
    }

    fn warnings(&self) -> Option<&FieldErrors> {
        self.warnings.as_ref()
    }
}
