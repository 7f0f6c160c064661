use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt, fmt::Display, str::FromStr};

/// Node name that consists of ASCII alphanumeric and '-', '_' characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ident(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid name `{0}`, expect ASCII alphanumeric, '-' or '_' characters")]
pub struct InvalidIdent(pub String);

impl Ident {
    /// Create an identifier from a string. Returns `None` if the name
    /// is empty or contains other characters.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let ok = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_".contains(c));
        ok.then_some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Ident {
    type Error = InvalidIdent;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Ident::new(name.clone()).ok_or(InvalidIdent(name))
    }
}

impl From<Ident> for String {
    fn from(ident: Ident) -> Self {
        ident.0
    }
}

impl FromStr for Ident {
    type Err = InvalidIdent;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ident::new(name).ok_or_else(|| InvalidIdent(name.to_owned()))
    }
}

impl Borrow<str> for Ident {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
