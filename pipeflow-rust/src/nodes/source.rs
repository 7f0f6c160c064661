use crate::{
    error::{Error, Result},
    node::{Node, NodeBase},
    registry::{NodeType, Registration},
};
use pipeflow_config::{AttrValue, AttributeKind, AttributeSpec};
use pipeflow_pipe::{FieldList, Row};
use std::any::Any;

/// Emits a fixed list of rows.
#[derive(Debug, Clone)]
pub struct RowListSource {
    base: NodeBase,
    fields: Option<FieldList>,
    rows: Vec<Row>,
}

impl Default for RowListSource {
    fn default() -> Self {
        Self {
            base: NodeBase::source(),
            fields: None,
            rows: vec![],
        }
    }
}

impl RowListSource {
    pub fn new(fields: FieldList, rows: Vec<Row>) -> Self {
        Self {
            fields: Some(fields),
            rows,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

impl Node for RowListSource {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn attributes(&self) -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::new("fields", AttributeKind::Fields).describe("names of the row fields"),
            AttributeSpec::new("rows", AttributeKind::Rows)
                .protected()
                .describe("rows to emit"),
        ]
    }

    fn set_attribute(&mut self, name: &str, value: &AttrValue) -> Result<()> {
        match name {
            "fields" => self.fields = value.to_fields(),
            "rows" => self.rows = value.to_rows().unwrap_or_default(),
            _ => {}
        }
        Ok(())
    }

    fn output_fields(&self) -> Result<FieldList> {
        self.fields.clone().ok_or(Error::SourceFieldsRequired)
    }

    fn run(&mut self) -> Result<()> {
        for row in &self.rows {
            self.base.put(row.clone())?;
        }
        Ok(())
    }
}

impl NodeType for RowListSource {
    const NAME: &'static str = "RowListSource";
    const DESCRIPTION: &'static str = "Emits rows given as an attribute";
}

inventory::submit!(Registration::of::<RowListSource>());
