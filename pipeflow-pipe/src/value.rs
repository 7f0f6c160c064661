use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// One unit of data carried by a pipe, positionally aligned with the
/// pipe's [FieldList](crate::FieldList).
pub type Row = Vec<Value>;

/// The name to value view of a [Row].
pub type Record = IndexMap<String, Value>;

/// A scalar value.
///
/// It is (de)serialized untagged, so `null`, `true`, `3`, `2.5` and
/// `"text"` in a description map to the respective variants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Integers are widened, so any numeric value can be read as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Integer(value) => Some(value as f64),
            Self::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// The lowercase name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => value.fmt(f),
            Self::Integer(value) => value.fmt(f),
            Self::Float(value) => value.fmt(f),
            Self::String(value) => value.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(from: bool) -> Self {
        Self::Bool(from)
    }
}

impl From<i32> for Value {
    fn from(from: i32) -> Self {
        Self::Integer(from.into())
    }
}

impl From<i64> for Value {
    fn from(from: i64) -> Self {
        Self::Integer(from)
    }
}

impl From<u32> for Value {
    fn from(from: u32) -> Self {
        Self::Integer(from.into())
    }
}

impl From<f64> for Value {
    fn from(from: f64) -> Self {
        Self::Float(from)
    }
}

impl From<&str> for Value {
    fn from(from: &str) -> Self {
        Self::String(from.to_owned())
    }
}

impl From<String> for Value {
    fn from(from: String) -> Self {
        Self::String(from)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(from: Option<T>) -> Self {
        from.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Build a [Row] from expressions convertible into [Value].
///
/// ```
/// use pipeflow_pipe::{row, Value};
///
/// let row = row![1, "one", None::<i64>];
/// assert_eq!(row, vec![Value::Integer(1), Value::from("one"), Value::Null]);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_values_from_json5() {
        let values: Vec<Value> = json5::from_str(r#"[null, true, 3, 2.5, "text"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Integer(3),
                Value::Float(2.5),
                Value::String("text".into()),
            ]
        );
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(Value::Integer(4).as_f64(), Some(4.0));
        assert_eq!(Value::Float(4.5).as_i64(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert!(Value::from(None::<bool>).is_null());
    }
}
