use indexmap::IndexMap;
use pipeflow_pipe::{FieldList, Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Attribute values keyed by attribute name, as written in a node
/// description.
pub type Attributes = IndexMap<String, AttrValue>;

/// The value of a node attribute: a scalar or a (nested) list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Value(Value),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            Self::Value(_) => None,
            Self::List(list) => Some(list),
        }
    }

    /// Read a list of strings as a field list.
    pub fn to_fields(&self) -> Option<FieldList> {
        let names: Option<Vec<_>> = self
            .as_list()?
            .iter()
            .map(|item| item.as_value()?.as_str().map(str::to_owned))
            .collect();
        FieldList::new(names?).ok()
    }

    /// Read a list of scalar lists as rows.
    pub fn to_rows(&self) -> Option<Vec<Row>> {
        self.as_list()?
            .iter()
            .map(|row| {
                row.as_list()?
                    .iter()
                    .map(|cell| cell.as_value().cloned())
                    .collect()
            })
            .collect()
    }
}

impl From<Value> for AttrValue {
    fn from(from: Value) -> Self {
        Self::Value(from)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(from: Vec<AttrValue>) -> Self {
        Self::List(from)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(from: $ty) -> Self {
                    Self::Value(from.into())
                }
            }
        )*
    };
}

impl_from_scalar!(bool, i32, i64, f64, &str, String);

impl From<&FieldList> for AttrValue {
    fn from(fields: &FieldList) -> Self {
        Self::List(fields.names().map(AttrValue::from).collect())
    }
}

impl From<&[Row]> for AttrValue {
    fn from(rows: &[Row]) -> Self {
        let rows = rows
            .iter()
            .map(|row| Self::List(row.iter().cloned().map(Self::Value).collect()))
            .collect();
        Self::List(rows)
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Value(value) => value.fmt(f),
            Self::List(list) => {
                let items: Vec<_> = list.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// The declared type of a node attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Bool,
    Integer,
    /// Integers are accepted as well.
    Float,
    String,
    /// A list of unique field names.
    Fields,
    /// A list of lists of scalars.
    Rows,
    List,
    Any,
}

impl AttributeKind {
    /// Returns true if `value` can be assigned to an attribute of this
    /// kind. Null is accepted by every kind and means "unset".
    pub fn accepts(&self, value: &AttrValue) -> bool {
        use AttributeKind as K;

        if value.is_null() {
            return true;
        }

        match (self, value) {
            (K::Any, _) => true,
            (K::Bool, AttrValue::Value(Value::Bool(_))) => true,
            (K::Integer, AttrValue::Value(Value::Integer(_))) => true,
            (K::Float, AttrValue::Value(Value::Integer(_) | Value::Float(_))) => true,
            (K::String, AttrValue::Value(Value::String(_))) => true,
            (K::List, AttrValue::List(_)) => true,
            (K::Fields, AttrValue::List(_)) => value.to_fields().is_some(),
            (K::Rows, AttrValue::List(_)) => value.to_rows().is_some(),
            _ => false,
        }
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Fields => "fields",
            Self::Rows => "rows",
            Self::List => "list",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// Declaration of one configurable node attribute.
///
/// Protected attributes can only be set by trusted code, for example a
/// stream description loaded by the application, and are rejected when
/// a node is configured in protected mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub protected: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            protected: false,
            description: String::new(),
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> AttrValue {
        json5::from_str(text).unwrap()
    }

    #[test]
    fn kinds_accept_matching_values() {
        assert!(AttributeKind::Integer.accepts(&parse("3")));
        assert!(!AttributeKind::Integer.accepts(&parse("3.5")));
        assert!(AttributeKind::Float.accepts(&parse("3")));
        assert!(AttributeKind::String.accepts(&parse("null")));
        assert!(!AttributeKind::Bool.accepts(&parse(r#""yes""#)));
        assert!(AttributeKind::Any.accepts(&parse("[1, [2]]")));
    }

    #[test]
    fn fields_and_rows() {
        let fields = parse(r#"["id", "name"]"#);
        assert!(AttributeKind::Fields.accepts(&fields));
        assert_eq!(fields.to_fields().unwrap().len(), 2);
        assert!(!AttributeKind::Fields.accepts(&parse(r#"["id", "id"]"#)));
        assert!(!AttributeKind::Fields.accepts(&parse("[1]")));

        let rows = parse(r#"[[1, "a"], [2, null]]"#);
        assert!(AttributeKind::Rows.accepts(&rows));
        assert_eq!(rows.to_rows().unwrap()[1], vec![Value::Integer(2), Value::Null]);
        assert!(!AttributeKind::Rows.accepts(&parse("[1, 2]")));
    }
}
