//! Row streams between processing nodes running on threads.
//!
//! A [Stream] is a graph of named [Node]s. Each connection is a
//! [Pipe] that moves rows in batches from one producer node to one
//! consumer node. Nodes are either added by hand or instantiated from a
//! JSON5 stream description through the node types of a [Registry].
//!
//! # Node lifecycle
//!
//! The runner initializes every node in topological order, so that the
//! field list of each pipe is known before any row moves. Then each node
//! runs on its own thread. When a node returns, fails, panics, or finds
//! that every output was stopped, its outputs are flushed and its inputs
//! are stopped, which lets neighbours finish in turn. Finally the node is
//! finalized.
//!
//! # Stream Description Format
//!
//! ```json5
//! {
//!     // The version number is mandatory.
//!     version: "0.1.0",
//!
//!     // Nodes by name. `type` picks the registered node type, other
//!     // keys are node attributes.
//!     nodes: {
//!         numbers: { type: "row_list_source", fields: ["n"], rows: [[1], [2], [3]] },
//!         first: { type: "head", size: 2 },
//!         sink: { type: "row_list_target" },
//!     },
//!
//!     connections: [
//!         { from: "numbers", to: "first" },
//!         { from: "first", to: "sink", pipe: { buffer_size: 10 } },
//!     ],
//! }
//! ```
//!
//! # Usage
//!
//! ```
//! use pipeflow::{Registry, RowListTarget, Stream};
//!
//! let registry = Registry::collect()?;
//! let file = concat!(env!("CARGO_MANIFEST_DIR"), "/../pipeflow-config/config-examples/head.json5");
//! let mut stream = Stream::open(file, &registry)?;
//! stream.run()?;
//!
//! let sink = stream.node_as::<RowListTarget>("sink").unwrap();
//! assert_eq!(sink.sink().len(), 2);
//! # anyhow::Ok(())
//! ```

mod error;
mod node;
mod nodes;
mod registry;
mod stream;

pub use error::*;
pub use node::*;
pub use nodes::*;
pub use registry::*;
pub use stream::*;

pub use pipeflow_config as config;
pub use pipeflow_config::{AttrValue, AttributeKind, AttributeSpec, Attributes, Ident, PipeConfig};
pub use pipeflow_pipe::{row, FieldList, Pipe, PipeId, Record, Row, Value};
