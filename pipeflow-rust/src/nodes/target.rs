use crate::{
    error::Result,
    node::{Node, NodeBase},
    registry::{NodeType, Registration},
};
use parking_lot::Mutex;
use pipeflow_pipe::{Record, Row};
use std::{any::Any, sync::Arc};

/// Shared storage of the rows a [RowListTarget] received.
#[derive(Debug, Clone, Default)]
pub struct RowSink {
    rows: Arc<Mutex<Vec<Row>>>,
}

impl RowSink {
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// A copy of the rows received so far.
    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }

    pub fn take(&self) -> Vec<Row> {
        std::mem::take(&mut *self.rows.lock())
    }

    fn push(&self, row: Row) {
        self.rows.lock().push(row);
    }
}

/// Collects the rows of its input into a [RowSink].
#[derive(Debug, Clone)]
pub struct RowListTarget {
    base: NodeBase,
    sink: RowSink,
    records: Vec<Record>,
    keep_records: bool,
}

impl Default for RowListTarget {
    fn default() -> Self {
        Self::new(RowSink::default())
    }
}

impl RowListTarget {
    /// A target writing into `sink`.
    pub fn new(sink: RowSink) -> Self {
        Self {
            base: NodeBase::target(),
            sink,
            records: vec![],
            keep_records: false,
        }
    }

    pub fn sink(&self) -> &RowSink {
        &self.sink
    }

    /// Also keep the received rows as records. Requires the input field
    /// list.
    pub fn with_records(mut self) -> Self {
        self.keep_records = true;
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl Node for RowListTarget {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn run(&mut self) -> Result<()> {
        let input = self.base.input()?;

        if self.keep_records {
            for record in input.records()? {
                self.sink.push(record.values().cloned().collect());
                self.records.push(record);
            }
        } else {
            for row in input.rows() {
                self.sink.push(row);
            }
        }
        Ok(())
    }
}

impl NodeType for RowListTarget {
    const NAME: &'static str = "RowListTarget";
    const DESCRIPTION: &'static str = "Collects rows in memory";
}

inventory::submit!(Registration::of::<RowListTarget>());
