//! Values carried by filters, change summaries, and update payloads.
//!
//! Filter comparison is deliberately *shallow*: only scalar variants take
//! part in it. `Structured` values ride along in payloads but never compare
//! equal during filter narrowing or duplicate detection.

use serde::{Deserialize, Serialize};

/// A value attached to a filter key or payload field.
///
/// # Examples
///
/// ```
/// use statewatch::Value;
///
/// let a = Value::String("counter".to_string());
/// let b = Value::from("counter");
/// assert!(a.scalar_eq(&b));
/// assert!(!Value::Int(1).scalar_eq(&Value::Float(1.0)));
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Structured(serde_json::Value),
    Null,
}

impl Value {
    /// Returns true if this is a scalar variant (anything but `Structured`).
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::Structured(_))
    }

    /// Returns true if this is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the contained bool, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained integer, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained string, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Shallow scalar equality used for filter comparison.
    ///
    /// Two values are equal only when both are the same scalar variant with
    /// equal contents. `Int(1)` and `Float(1.0)` are not equal; `Structured`
    /// values are never equal, even when deep-equal.
    #[must_use]
    pub fn scalar_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
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

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}
