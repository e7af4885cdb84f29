use std::fmt;

use catchdb_error::{CatchError, Result};

/// A dynamically-typed column value read from or bound to the database.
///
/// Only the storage classes that catch and environment tables use are
/// represented: NULL, INTEGER, REAL and TEXT.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A UTF-8 text string.
    Text(String),
}

impl Value {
    /// Whether this is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Storage-class name, as reported by SQL `typeof()`.
    #[must_use]
    pub const fn typeof_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Float(_) => "real",
            Self::Text(_) => "text",
        }
    }

    /// Numeric view of the value. NULL reads as NaN ("not measured").
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Null => Ok(f64::NAN),
            Self::Integer(i) => Ok(*i as f64),
            Self::Float(f) => Ok(*f),
            Self::Text(_) => Err(CatchError::TypeMismatch {
                expected: "real",
                actual: self.typeof_str(),
            }),
        }
    }

    /// Integer view of the value.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            other => Err(CatchError::TypeMismatch {
                expected: "integer",
                actual: other.typeof_str(),
            }),
        }
    }

    /// Text view of the value.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(CatchError::TypeMismatch {
                expected: "text",
                actual: other.typeof_str(),
            }),
        }
    }

    /// Real value for binding; NaN binds as NULL.
    #[must_use]
    pub fn real(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Float(value)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:.2}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
