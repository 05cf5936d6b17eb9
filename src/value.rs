//! Values held by entity properties.
//!
//! The same [`Value`] type carries both sides of a property: the raw input a
//! record arrived with, and the in-memory value its transform produced.
//! A [`Record`] is a plain property-name keyed map of values, used for raw
//! input and for the output of `to_array`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// A plain record: property name to value.
pub type Record = BTreeMap<String, Value>;

/// A property value, raw or transformed.
///
/// Transforms decide which variants a property accepts; `Null` stands for an
/// absent raw key and passes through every stock transform.
///
/// ```
/// use kyromap::{EntityId, Value};
///
/// let owner = Value::from(EntityId::from(3));
/// assert!(owner.is_entity());
/// assert_eq!(owner.to_string(), "entity:3");
/// assert!(Value::from(None::<i64>).is_null());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
    /// Id of another entity, produced by the `reference` transform.
    Entity(EntityId),
    /// UTC instant, produced by the `timestamp` transform.
    Timestamp(DateTime<Utc>),
    /// Parsed JSON, produced by the `json` transform.
    Structured(serde_json::Value),
    /// No value.
    #[default]
    Null,
}

impl Value {
    /// True for [`Value::Bool`].
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// True for [`Value::Int`].
    #[must_use]
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// True for [`Value::Float`].
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// True for [`Value::String`].
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// True for [`Value::Entity`].
    #[must_use]
    pub const fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }

    /// True for [`Value::Timestamp`].
    #[must_use]
    pub const fn is_timestamp(&self) -> bool {
        matches!(self, Self::Timestamp(_))
    }

    /// True for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The integer, if this is an [`Value::Int`].
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The referenced id, if this is a [`Value::Entity`].
    #[must_use]
    pub const fn as_entity(&self) -> Option<&EntityId> {
        match self {
            Self::Entity(v) => Some(v),
            _ => None,
        }
    }

    /// The parsed JSON, if this is a [`Value::Structured`].
    #[must_use]
    pub const fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// Short name of the variant, used in transform errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Entity(_) => "entity",
            Self::Timestamp(_) => "timestamp",
            Self::Structured(_) => "structured",
            Self::Null => "null",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Entity(v) => write!(f, "entity:{v}"),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            Self::Structured(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self {
        Self::Entity(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Builds a [`Record`] from `key => value` pairs.
///
/// ```
/// use kyromap::{record, Value};
///
/// let raw = record! { "id" => 7, "name" => "Ann" };
/// assert_eq!(raw.get("name"), Some(&Value::from("Ann")));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(
            record.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        record
    }};
}
