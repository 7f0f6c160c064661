//! Declarative descriptions of streams and node attributes.
//!
//! A stream description is a JSON5 document naming the nodes of a
//! stream, the node type and attributes of each node, and the pipes
//! connecting them. It deserializes into [StreamConfig].
//!
//! ```json5
//! {
//!     // The version number is mandatory.
//!     version: "0.1.0",
//!
//!     // Default pipe settings, optional.
//!     pipe: { buffer_size: 1000, queue_size: 1 },
//!
//!     // Named nodes. `type` selects the node implementation, the
//!     // remaining keys are node attributes.
//!     nodes: {
//!         numbers: { type: "row_list_source", fields: ["n"], rows: [[1], [2], [3]] },
//!         first: { type: "head", size: 2 },
//!         sink: { type: "row_list_target" },
//!     },
//!
//!     // Pipes between nodes, optionally with their own settings.
//!     connections: [
//!         { from: "numbers", to: "first" },
//!         { from: "first", to: "sink", pipe: { buffer_size: 10 } },
//!     ],
//! }
//! ```

mod attribute;
mod connection;
mod ident;
mod into_ident;
mod pipe;
mod stream;

pub use attribute::*;
pub use connection::*;
pub use ident::*;
pub use into_ident::*;
pub use pipe::*;
pub use stream::*;
