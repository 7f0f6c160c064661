use crate::{
    error::Result,
    node::{Node, NodeBase},
    registry::{NodeType, Registration},
};
use log::debug;
use pipeflow_config::{AttrValue, AttributeKind, AttributeSpec};
use std::any::Any;

const DEFAULT_SIZE: usize = 10;

/// Passes the first `size` rows, then stops its input.
#[derive(Debug, Clone)]
pub struct Head {
    base: NodeBase,
    size: usize,
}

impl Default for Head {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl Head {
    pub fn new(size: usize) -> Self {
        Self {
            base: NodeBase::transform(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Node for Head {
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
        vec![AttributeSpec::new("size", AttributeKind::Integer).describe("number of rows to pass")]
    }

    fn set_attribute(&mut self, name: &str, value: &AttrValue) -> Result<()> {
        if name == "size" {
            self.size = value
                .as_value()
                .and_then(|value| value.as_i64())
                .map_or(DEFAULT_SIZE, |size| size.max(0) as usize);
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let input = self.base.input()?;

        if self.size > 0 {
            for (count, row) in input.rows().enumerate() {
                self.base.put(row)?;
                if count + 1 >= self.size {
                    break;
                }
            }
        }

        debug!("head passed its rows, stopping {}", input);
        input.stop();
        Ok(())
    }
}

impl NodeType for Head {
    const NAME: &'static str = "Head";
    const DESCRIPTION: &'static str = "Passes the first rows of its input";
}

inventory::submit!(Registration::of::<Head>());
