//! Stock transform pairs.
//!
//! Each [`Transform`] couples a raw-to-value function with its reverse, and
//! `Null` passes through both directions unchanged. The scalar pairs check
//! the raw type instead of coercing, which keeps
//! `reverse(transform(x)) == x` for every value they accept.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::entity::EntityId;
use crate::error::TransformError;
use crate::schema::TransformFn;
use crate::value::Value;

/// A transform and its reverse.
#[derive(Clone)]
pub struct Transform {
    forward: TransformFn,
    reverse: TransformFn,
}

impl Transform {
    /// Couples a transform with its reverse.
    pub fn new<F, R>(forward: F, reverse: R) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
        R: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        Self {
            forward: Arc::new(forward),
            reverse: Arc::new(reverse),
        }
    }

    /// Raw to in-memory value.
    pub fn apply(&self, raw: &Value) -> Result<Value, TransformError> {
        (self.forward)(raw)
    }

    /// In-memory value back to raw.
    pub fn reverse(&self, value: &Value) -> Result<Value, TransformError> {
        (self.reverse)(value)
    }

    pub(crate) fn into_parts(self) -> (TransformFn, TransformFn) {
        (self.forward, self.reverse)
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").finish_non_exhaustive()
    }
}

fn mismatch(expected: &'static str, actual: &Value) -> TransformError {
    TransformError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

fn same_kind(expected: &'static str, accept: fn(&Value) -> bool) -> Transform {
    let check = move |v: &Value| {
        if v.is_null() || accept(v) {
            Ok(v.clone())
        } else {
            Err(mismatch(expected, v))
        }
    };
    Transform::new(check, check)
}

/// Passes every value through unchanged.
#[must_use]
pub fn identity() -> Transform {
    Transform::new(|v| Ok(v.clone()), |v| Ok(v.clone()))
}

/// Accepts integers. Numeric strings are rejected, not parsed.
#[must_use]
pub fn integer() -> Transform {
    same_kind("int", Value::is_int)
}

/// Accepts floats.
#[must_use]
pub fn float() -> Transform {
    same_kind("float", Value::is_float)
}

/// Accepts booleans.
#[must_use]
pub fn boolean() -> Transform {
    same_kind("bool", Value::is_bool)
}

/// Accepts strings.
#[must_use]
pub fn string() -> Transform {
    same_kind("string", Value::is_string)
}

/// RFC 3339 string to [`Value::Timestamp`]; reversed to the canonical UTC form
/// (`2024-01-02T03:04:05Z`, fractional seconds only when present).
#[must_use]
pub fn timestamp() -> Transform {
    Transform::new(
        |raw| match raw {
            Value::Null => Ok(Value::Null),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| TransformError::invalid(format!("invalid timestamp '{s}': {e}"))),
            other => Err(mismatch("RFC 3339 string", other)),
        },
        |value| match value {
            Value::Null => Ok(Value::Null),
            Value::Timestamp(ts) => Ok(Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
            other => Err(mismatch("timestamp", other)),
        },
    )
}

/// Raw id to [`Value::Entity`]; reversed to the id's raw form.
///
/// Holding the referenced id (rather than the entity) lets a caller resolve
/// it later with `get` or `get_reference`.
#[must_use]
pub fn reference() -> Transform {
    Transform::new(
        |raw| match raw {
            Value::Null => Ok(Value::Null),
            other => EntityId::try_from(other).map(Value::Entity),
        },
        |value| match value {
            Value::Null => Ok(Value::Null),
            Value::Entity(id) => Ok(id.to_value()),
            other => Err(mismatch("entity", other)),
        },
    )
}

/// JSON text to [`Value::Structured`]; reversed to compact JSON text.
#[must_use]
pub fn json() -> Transform {
    Transform::new(
        |raw| match raw {
            Value::Null => Ok(Value::Null),
            Value::String(s) => serde_json::from_str(s)
                .map(Value::Structured)
                .map_err(|e| TransformError::invalid(format!("invalid JSON: {e}"))),
            other => Err(mismatch("JSON string", other)),
        },
        |value| match value {
            Value::Null => Ok(Value::Null),
            Value::Structured(json) => serde_json::to_string(json)
                .map(Value::String)
                .map_err(|e| TransformError::invalid(e.to_string())),
            other => Err(mismatch("structured", other)),
        },
    )
}
