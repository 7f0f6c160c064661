use crate::{
    error::{Error, Result},
    node::{Node, NodeBase},
    registry::{NodeType, Registration},
};
use pipeflow_config::AttributeSpec;
use pipeflow_pipe::FieldList;
use std::any::Any;

/// Concatenates its inputs in the order they were connected.
///
/// Every input must carry the same field names; the output uses the
/// field list of the first input.
#[derive(Debug, Clone)]
pub struct Append {
    base: NodeBase,
}

impl Default for Append {
    fn default() -> Self {
        Self {
            base: NodeBase::transform(),
        }
    }
}

impl Node for Append {
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
        vec![]
    }

    fn output_fields(&self) -> Result<FieldList> {
        let mut inputs = self.base.inputs().iter();
        let first = inputs.next().ok_or_else(|| Error::not_single_input(0))?;
        let fields = first
            .fields()
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| Error::input_fields_unset(first.id()))?;

        for input in inputs {
            let other = input
                .fields()
                .ok_or_else(|| Error::input_fields_unset(input.id()))?;
            if other != fields {
                return Err(Error::fields_mismatch(input.id(), fields, other));
            }
        }

        Ok(fields.clone())
    }

    fn run(&mut self) -> Result<()> {
        for input in self.base.inputs() {
            for row in input.rows() {
                self.base.put(row)?;
            }
        }
        Ok(())
    }
}

impl NodeType for Append {
    const NAME: &'static str = "Append";
    const DESCRIPTION: &'static str = "Concatenates rows of all inputs";
}

inventory::submit!(Registration::of::<Append>());

#[cfg(test)]
mod tests {
    use super::*;
    use pipeflow_pipe::Pipe;

    fn input(names: &[&str]) -> Pipe {
        let pipe = Pipe::default();
        pipe.set_fields(FieldList::new(names.iter().copied()).unwrap())
            .unwrap();
        pipe
    }

    #[test]
    fn fields_of_first_input() {
        let mut append = Append::default();
        append.base_mut().add_input(input(&["id", "name"])).unwrap();
        append.base_mut().add_input(input(&["id", "name"])).unwrap();
        assert_eq!(append.output_field_names().unwrap(), ["id", "name"]);
    }

    #[test]
    fn rejects_different_fields() {
        let mut append = Append::default();
        append.base_mut().add_input(input(&["id", "name"])).unwrap();
        let odd = input(&["id"]);
        append.base_mut().add_input(odd.clone()).unwrap();

        match append.output_fields() {
            Err(Error::FieldsMismatch {
                pipe,
                expected,
                found,
            }) => {
                assert_eq!(pipe, odd.id());
                assert_eq!(expected.to_vec(), ["id", "name"]);
                assert_eq!(found.to_vec(), ["id"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
