/// Bound-argument values and data-type collision handling
use crate::types::{FieldDataType, TelemetryFieldKey};
use serde::Serialize;
use std::fmt;

/// A value bound to a positional placeholder in emitted SQL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    String(String),
    Float(f64),
    Bool(bool),
    Array(Vec<TelemetryValue>),
}

impl TelemetryValue {
    pub fn is_float(&self) -> bool {
        matches!(self, TelemetryValue::Float(_))
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::String(s) => write!(f, "{}", s),
            TelemetryValue::Float(n) => write!(f, "{}", n),
            TelemetryValue::Bool(b) => write!(f, "{}", b),
            TelemetryValue::Array(vs) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for TelemetryValue {
    fn from(s: &str) -> Self {
        TelemetryValue::String(s.to_string())
    }
}

impl From<f64> for TelemetryValue {
    fn from(n: f64) -> Self {
        TelemetryValue::Float(n)
    }
}

impl From<bool> for TelemetryValue {
    fn from(b: bool) -> Self {
        TelemetryValue::Bool(b)
    }
}

/// Reconcile a field reference with a value of a mismatched data type.
///
/// A logical name often arrives with more than one stored type (a caller
/// sent `http.status_code` both as a number and as a string over time).
/// Rather than fail the query, the field reference or the value is
/// rewritten so the comparison still makes sense: a numeric value against
/// a string field reads through `toFloat64OrNull`, a string value against
/// a numeric or boolean field reads through `toString`, and a boolean
/// value against a string field is compared as its text form.
pub fn collision_handled_field(
    key: &TelemetryFieldKey,
    value: TelemetryValue,
    field: String,
) -> (String, TelemetryValue) {
    match key.field_data_type {
        FieldDataType::String => match &value {
            TelemetryValue::Float(_) => (format!("toFloat64OrNull({})", field), value),
            TelemetryValue::Array(vs) if vs.iter().all(|v| v.is_float()) => {
                (format!("toFloat64OrNull({})", field), value)
            }
            TelemetryValue::Bool(b) => (field, TelemetryValue::String(b.to_string())),
            _ => (field, value),
        },
        FieldDataType::Float64 | FieldDataType::Int64 | FieldDataType::Number => match &value {
            TelemetryValue::String(_) => (format!("toString({})", field), value),
            _ => (field, value),
        },
        FieldDataType::Bool => match &value {
            TelemetryValue::String(_) => (format!("toString({})", field), value),
            _ => (field, value),
        },
        _ => (field, value),
    }
}
