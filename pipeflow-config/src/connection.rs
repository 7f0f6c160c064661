use crate::{ident::Ident, pipe::PipeOverride};
use serde::{Deserialize, Serialize};

/// A pipe from the output of one node to the input of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The producing node.
    pub from: Ident,
    /// The consuming node.
    pub to: Ident,
    /// Settings overriding the stream-wide pipe settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipe: Option<PipeOverride>,
}

impl Connection {
    pub fn new(from: Ident, to: Ident) -> Self {
        Self {
            from,
            to,
            pipe: None,
        }
    }

    pub fn endpoints(&self) -> (&Ident, &Ident) {
        (&self.from, &self.to)
    }
}
