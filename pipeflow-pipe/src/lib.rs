//! Batching, bounded single-producer/single-consumer pipes.
//!
//! A [Pipe] connects exactly one producing node to exactly one
//! consuming node. Rows written with [Pipe::put] are collected into a
//! batch, and full batches are moved into a bounded queue. The queue
//! depth is the only backpressure mechanism: a producer that runs
//! ahead of its consumer blocks when handing over a batch.
//!
//! The producer ends the stream with [Pipe::flush]. The consumer may
//! give up early with [Pipe::stop], after which every write is
//! silently dropped.
//!
//! ```
//! use pipeflow_pipe::{row, Pipe};
//! use std::thread;
//!
//! let pipe = Pipe::new(2, 1);
//!
//! let producer = {
//!     let pipe = pipe.clone();
//!     thread::spawn(move || {
//!         for n in 1..=5 {
//!             pipe.put(row![n]);
//!         }
//!         pipe.flush();
//!     })
//! };
//!
//! let observed: Vec<_> = pipe.rows().collect();
//! producer.join().unwrap();
//! assert_eq!(observed, (1..=5).map(|n| row![n]).collect::<Vec<_>>());
//! ```

mod error;
mod fields;
mod pipe;
mod value;

pub use error::Error;
pub use fields::FieldList;
pub use pipe::*;
pub use value::{Record, Row, Value};
