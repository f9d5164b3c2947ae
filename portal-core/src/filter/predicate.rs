//! Typed field predicates.
//!
//! Each predicate kind carries only the operators that make sense for it, so
//! a date can never be asked to "contain" something. Every operator listed on
//! a predicate must hold; an empty operator list matches everything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{FieldValue, Key};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdOp {
    Equal(Key),
    NotEqual(Key),
    In(Vec<Key>),
    NotIn(Vec<Key>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberOp {
    Equal(f64),
    NotEqual(f64),
    Less(f64),
    LessEqual(f64),
    Greater(f64),
    GreaterEqual(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOp {
    Equal(String),
    NotEqual(String),
    Contain(String),
    NotContain(String),
    StartWith(String),
    NotStartWith(String),
    EndWith(String),
    NotEndWith(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateOp {
    Equal(DateTime<Utc>),
    NotEqual(DateTime<Utc>),
    Less(DateTime<Utc>),
    LessEqual(DateTime<Utc>),
    Greater(DateTime<Utc>),
    GreaterEqual(DateTime<Utc>),
}

/// A constraint on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ops", rename_all = "camelCase")]
pub enum Predicate {
    Id(Vec<IdOp>),
    Number(Vec<NumberOp>),
    Text(Vec<TextOp>),
    Date(Vec<DateOp>),
}

impl IdOp {
    fn holds(&self, key: &Key) -> bool {
        match self {
            Self::Equal(k) => key == k,
            Self::NotEqual(k) => key != k,
            Self::In(keys) => keys.contains(key),
            Self::NotIn(keys) => !keys.contains(key),
        }
    }
}

impl NumberOp {
    fn holds(self, n: f64) -> bool {
        match self {
            Self::Equal(v) => n == v,
            Self::NotEqual(v) => n != v,
            Self::Less(v) => n < v,
            Self::LessEqual(v) => n <= v,
            Self::Greater(v) => n > v,
            Self::GreaterEqual(v) => n >= v,
        }
    }
}

impl TextOp {
    fn holds(&self, s: &str) -> bool {
        match self {
            Self::Equal(v) => s == v,
            Self::NotEqual(v) => s != v,
            Self::Contain(v) => s.contains(v.as_str()),
            Self::NotContain(v) => !s.contains(v.as_str()),
            Self::StartWith(v) => s.starts_with(v.as_str()),
            Self::NotStartWith(v) => !s.starts_with(v.as_str()),
            Self::EndWith(v) => s.ends_with(v.as_str()),
            Self::NotEndWith(v) => !s.ends_with(v.as_str()),
        }
    }
}

impl DateOp {
    fn holds(self, d: DateTime<Utc>) -> bool {
        match self {
            Self::Equal(v) => d == v,
            Self::NotEqual(v) => d != v,
            Self::Less(v) => d < v,
            Self::LessEqual(v) => d <= v,
            Self::Greater(v) => d > v,
            Self::GreaterEqual(v) => d >= v,
        }
    }
}

impl Predicate {
    pub fn id(op: IdOp) -> Self {
        Self::Id(vec![op])
    }

    pub fn number(op: NumberOp) -> Self {
        Self::Number(vec![op])
    }

    pub fn text(op: TextOp) -> Self {
        Self::Text(vec![op])
    }

    pub fn date(op: DateOp) -> Self {
        Self::Date(vec![op])
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Id(ops) => ops.is_empty(),
            Self::Number(ops) => ops.is_empty(),
            Self::Text(ops) => ops.is_empty(),
            Self::Date(ops) => ops.is_empty(),
        }
    }

    /// Evaluate against a field value. A missing value, or one of the wrong
    /// kind, fails any non-empty predicate.
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };

        match self {
            Self::Id(ops) => value
                .as_key()
                .is_some_and(|key| ops.iter().all(|op| op.holds(&key))),
            Self::Number(ops) => value
                .as_f64()
                .is_some_and(|n| ops.iter().all(|op| op.holds(n))),
            Self::Text(ops) => value
                .as_text()
                .is_some_and(|s| ops.iter().all(|op| op.holds(s))),
            Self::Date(ops) => value
                .as_date()
                .is_some_and(|d| ops.iter().all(|op| op.holds(d))),
        }
    }
}
