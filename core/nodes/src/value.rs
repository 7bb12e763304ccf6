//! Init-Record Values
//!
//! An [`InitRecord`] is the opaque key/value bag that accompanies every node
//! to the execution engine. The core only interprets a handful of fields
//! (`class`, `tags`, `node_groups`, and the fields it writes during resolve);
//! everything else is carried through untouched.
//!
//! ## Equality Contract
//!
//! Re-binding a node with an identical definition is a no-op, so record
//! equality has to be well defined for every value type:
//!
//! - floats and the parts of complex numbers compare by bit pattern, which
//!   makes every value equal to itself (`NaN` included) and keeps `0.0` and
//!   `-0.0` apart
//! - lists compare element by element, in order
//! - records compare as maps: same key set, equal values, field order ignored

use core::fmt;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use itertools::Itertools;
use num_complex::Complex64;
use serde::Serialize;

/// A single init-record value.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    List(Vec<Value>),
    Record(InitRecord),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(s) = self {
            Some(s)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        if let Value::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&InitRecord> {
        if let Value::Record(record) = self {
            Some(record)
        } else {
            None
        }
    }

    /// String items of a string or a list of strings; `None` for anything else.
    #[must_use]
    pub fn string_items(&self) -> Option<Vec<&str>> {
        match self {
            Value::Str(s) => Some(vec![s.as_str()]),
            Value::List(items) => items.iter().map(Value::as_str).collect(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Complex(a), Value::Complex(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Complex(c) => write!(f, "({:?}{:+?}j)", c.re, c.im),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Record(record) => write!(f, "{record}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<Complex64> for Value {
    fn from(value: Complex64) -> Self {
        Value::Complex(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<InitRecord> for Value {
    fn from(value: InitRecord) -> Self {
        Value::Record(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered key/value bag describing one node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InitRecord {
    fields: IndexMap<String, Value>,
}

impl InitRecord {
    pub const CLASS: &'static str = "class";
    pub const TAGS: &'static str = "tags";
    pub const NODE_GROUPS: &'static str = "node_groups";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.get(Self::CLASS).and_then(Value::as_str)
    }

    /// Tags attached to the node; empty when the field is missing.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.get(Self::TAGS)
            .and_then(Value::string_items)
            .unwrap_or_default()
    }
}

impl Display for InitRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.fields
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .join(", ")
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for InitRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
