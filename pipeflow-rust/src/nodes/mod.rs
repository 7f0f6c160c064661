//! In-memory nodes registered with every [Registry](crate::Registry).

mod append;
mod head;
mod source;
mod target;

pub use append::*;
pub use head::*;
pub use source::*;
pub use target::*;
