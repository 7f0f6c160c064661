use crate::error::Error;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Ordered sequence of unique field names describing the rows of a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldList(IndexSet<String>);

impl FieldList {
    /// Create a field list, failing if a name appears twice.
    pub fn new<I, S>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for name in names {
            let name = name.into();
            if set.contains(&name) {
                return Err(Error::duplicate_field(name));
            }
            set.insert(name);
        }
        Ok(Self(set))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over field names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// The position of `name` within a row.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.get_index_of(name)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl TryFrom<Vec<String>> for FieldList {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<FieldList> for Vec<String> {
    fn from(fields: FieldList) -> Self {
        fields.0.into_iter().collect()
    }
}

impl Display for FieldList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<_> = self.names().collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let fields = FieldList::new(["id", "name", "amount"]).unwrap();
        assert_eq!(fields.names().collect::<Vec<_>>(), ["id", "name", "amount"]);
        assert_eq!(fields.index_of("amount"), Some(2));
        assert_eq!(fields.to_string(), "[id, name, amount]");
    }

    #[test]
    fn rejects_duplicates() {
        let err = FieldList::new(["id", "name", "id"]).unwrap_err();
        assert!(matches!(err, Error::DuplicateField { field } if field == "id"));
    }

    #[test]
    fn deserialize_checks_uniqueness() {
        let fields: FieldList = json5::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(json5::from_str::<FieldList>(r#"["a", "a"]"#).is_err());
    }
}
