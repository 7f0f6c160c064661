use crate::ident::{Ident, InvalidIdent};

/// Provide the fallible conversion to [Ident] on the implemented type.
pub trait IntoIdent {
    fn into_ident(self) -> Result<Ident, InvalidIdent>;
}

impl IntoIdent for String {
    fn into_ident(self) -> Result<Ident, InvalidIdent> {
        Ident::try_from(self)
    }
}

impl IntoIdent for &String {
    fn into_ident(self) -> Result<Ident, InvalidIdent> {
        self.parse()
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> Result<Ident, InvalidIdent> {
        self.parse()
    }
}

impl IntoIdent for Ident {
    fn into_ident(self) -> Result<Ident, InvalidIdent> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> Result<Ident, InvalidIdent> {
        Ok(self.clone())
    }
}
