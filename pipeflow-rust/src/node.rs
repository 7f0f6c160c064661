use crate::error::{Error, NodeFinished, Result};
use log::debug;
use pipeflow_config::{AttrValue, AttributeSpec, Attributes};
use pipeflow_pipe::{FieldList, Pipe, Record, Row};
use serde::{Deserialize, Serialize};
use std::{any::Any, fmt};

/// The position of a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Produces rows and has no inputs.
    Source,
    /// Consumes and produces rows.
    Transform,
    /// Consumes rows and has no outputs.
    Target,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Source => "source",
            Self::Transform => "transform",
            Self::Target => "target",
        };
        f.write_str(name)
    }
}

/// The pipes and annotation every node carries.
///
/// The role is fixed when the base is created: a source base refuses
/// inputs and a target base refuses outputs.
#[derive(Debug, Clone)]
pub struct NodeBase {
    role: Role,
    inputs: Vec<Pipe>,
    outputs: Vec<Pipe>,
    description: Option<String>,
}

impl Default for NodeBase {
    fn default() -> Self {
        Self::transform()
    }
}

impl NodeBase {
    fn new(role: Role) -> Self {
        Self {
            role,
            inputs: vec![],
            outputs: vec![],
            description: None,
        }
    }

    pub fn source() -> Self {
        Self::new(Role::Source)
    }

    pub fn transform() -> Self {
        Self::new(Role::Transform)
    }

    pub fn target() -> Self {
        Self::new(Role::Target)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn inputs(&self) -> &[Pipe] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Pipe] {
        &self.outputs
    }

    pub fn add_input(&mut self, pipe: Pipe) -> Result<()> {
        if self.role == Role::Source {
            return Err(Error::InputOnSource);
        }
        if self.inputs.iter().any(|input| Pipe::same(input, &pipe)) {
            return Err(Error::input_already_connected(pipe.id()));
        }
        self.inputs.push(pipe);
        Ok(())
    }

    pub fn add_output(&mut self, pipe: Pipe) -> Result<()> {
        if self.role == Role::Target {
            return Err(Error::OutputOnTarget);
        }
        if self.outputs.iter().any(|output| Pipe::same(output, &pipe)) {
            return Err(Error::output_already_connected(pipe.id()));
        }
        self.outputs.push(pipe);
        Ok(())
    }

    pub(crate) fn detach_input(&mut self, pipe: &Pipe) {
        self.inputs.retain(|input| !Pipe::same(input, pipe));
    }

    /// The only input pipe. Fails if the node has none or several.
    pub fn input(&self) -> Result<&Pipe> {
        match self.inputs.as_slice() {
            [input] => Ok(input),
            inputs => Err(Error::not_single_input(inputs.len())),
        }
    }

    /// The field list of the only input pipe, if it is set.
    pub fn input_fields(&self) -> Result<Option<&FieldList>> {
        Ok(self.input()?.fields())
    }

    /// The output fields a node passes on when it does not reshape rows:
    /// those of its only input.
    pub fn default_output_fields(&self) -> Result<FieldList> {
        match self.role {
            Role::Source => Err(Error::SourceFieldsRequired),
            Role::Target => Err(Error::TargetOutputFields),
            Role::Transform => {
                let input = self.input()?;
                input
                    .fields()
                    .filter(|fields| !fields.is_empty())
                    .cloned()
                    .ok_or_else(|| Error::input_fields_unset(input.id()))
            }
        }
    }

    /// Write a row to every output that is still open and return the
    /// number of outputs written to.
    ///
    /// Returns [NodeFinished] when no output is open, including when the
    /// node has no outputs at all. A node should let the signal escape
    /// its `run` rather than keep producing.
    pub fn put(&self, row: Row) -> Result<usize, NodeFinished> {
        let mut delivered = 0;
        let mut pending: Option<&Pipe> = None;

        for output in self.outputs.iter().filter(|output| !output.is_closed()) {
            if let Some(previous) = pending.replace(output) {
                previous.put(row.clone());
                delivered += 1;
            }
        }

        // the last open output takes the row by value
        let last = pending.ok_or(NodeFinished)?;
        last.put(row);
        Ok(delivered + 1)
    }

    /// Record flavour of [put](NodeBase::put). Every open output converts
    /// the record with its own field list.
    pub fn put_record(&self, record: &Record) -> Result<usize> {
        let mut delivered = 0;
        for output in self.outputs.iter().filter(|output| !output.is_closed()) {
            output.put_record(record)?;
            delivered += 1;
        }

        if delivered == 0 {
            return Err(Error::Finished);
        }
        Ok(delivered)
    }
}

/// A processing unit with input and output pipes.
///
/// The runner calls [initialize](Node::initialize) once, then
/// [run](Node::run) on a dedicated thread, then
/// [finalize](Node::finalize), which runs even if `run` failed or
/// panicked. Between `run` and `finalize` the runner flushes every
/// output and stops every input.
///
/// Sources are built on [NodeBase::source] and must override
/// [output_fields](Node::output_fields). Targets are built on
/// [NodeBase::target].
pub trait Node: Send {
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Allow callers to reach the concrete node, e.g. after a run.
    fn as_any(&self) -> &dyn Any;

    /// The attributes [configure](Node::configure) can set.
    fn attributes(&self) -> Vec<AttributeSpec> {
        vec![]
    }

    /// Assign a declared attribute. The value has already been checked
    /// against the declared kind.
    fn set_attribute(&mut self, name: &str, value: &AttrValue) -> Result<()> {
        let _ = value;
        debug!("attribute `{}` has no setter, ignoring", name);
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn run(&mut self) -> Result<()>;

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    /// The field list of the rows this node writes.
    fn output_fields(&self) -> Result<FieldList> {
        self.base().default_output_fields()
    }

    fn output_field_names(&self) -> Result<Vec<String>> {
        Ok(self.output_fields()?.to_vec())
    }

    /// Apply attribute values against the declared attributes.
    ///
    /// Unknown keys are ignored. `type` is skipped and `description`
    /// sets the node description. In `protected` mode, protected
    /// attributes are refused. Nothing is applied if any value is
    /// refused.
    fn configure(&mut self, attributes: &Attributes, protected: bool) -> Result<()> {
        let specs = self.attributes();
        let mut accepted = vec![];

        for (name, value) in attributes {
            match name.as_str() {
                "type" => continue,
                "description" => {
                    let description = value.as_value().filter(|value| {
                        value.is_null() || value.as_str().is_some()
                    });
                    if description.is_none() {
                        return Err(Error::attribute_type(
                            name,
                            pipeflow_config::AttributeKind::String,
                            value,
                        ));
                    }
                    accepted.push((name, value));
                    continue;
                }
                _ => {}
            }

            let Some(spec) = specs.iter().find(|spec| spec.name == *name) else {
                debug!("ignoring unknown attribute `{}`", name);
                continue;
            };

            if protected && spec.protected {
                return Err(Error::protected_attribute(name));
            }
            if !spec.kind.accepts(value) {
                return Err(Error::attribute_type(name, spec.kind, value));
            }
            accepted.push((name, value));
        }

        for (name, value) in accepted {
            if name == "description" {
                let description = value.as_value().and_then(|value| value.as_str());
                self.base_mut()
                    .set_description(description.map(str::to_owned));
            } else {
                self.set_attribute(name, value)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeflow_config::AttributeKind;
    use pipeflow_pipe::row;

    struct Probe {
        base: NodeBase,
        limit: Option<i64>,
        secret: Option<String>,
    }

    impl Probe {
        fn new(base: NodeBase) -> Self {
            Self {
                base,
                limit: None,
                secret: None,
            }
        }
    }

    impl Node for Probe {
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
                AttributeSpec::new("limit", AttributeKind::Integer),
                AttributeSpec::new("secret", AttributeKind::String).protected(),
            ]
        }

        fn set_attribute(&mut self, name: &str, value: &AttrValue) -> Result<()> {
            let value = value.as_value();
            match name {
                "limit" => self.limit = value.and_then(|value| value.as_i64()),
                "secret" => self.secret = value.and_then(|value| value.as_str()).map(Into::into),
                _ => {}
            }
            Ok(())
        }

        fn run(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn put_reaches_open_outputs_only() {
        let mut base = NodeBase::transform();
        let outputs: Vec<_> = (0..3).map(|_| Pipe::new(10, 0)).collect();
        for pipe in &outputs {
            base.add_output(pipe.clone()).unwrap();
        }

        assert_eq!(base.put(row![1]), Ok(3));

        outputs[0].stop();
        assert_eq!(base.put(row![2]), Ok(2));

        outputs[2].stop();
        assert_eq!(base.put(row![3]), Ok(1));

        outputs[1].stop();
        assert_eq!(base.put(row![4]), Err(NodeFinished));

        outputs[1].flush();
        assert!(outputs[1].rows().next().is_none());
    }

    #[test]
    fn put_skips_stopped_output() {
        let mut base = NodeBase::transform();
        let first = Pipe::new(10, 0);
        let second = Pipe::new(10, 0);
        base.add_output(first.clone()).unwrap();
        base.add_output(second.clone()).unwrap();

        first.stop();
        assert_eq!(base.put(row!["only second"]), Ok(1));
        second.flush();

        assert_eq!(second.rows().collect::<Vec<_>>(), vec![row!["only second"]]);
        assert_eq!(first.queued_batches(), 0);
    }

    #[test]
    fn put_without_outputs_signals_completion() {
        let base = NodeBase::transform();
        assert_eq!(base.put(row![1]), Err(NodeFinished));
        assert!(base.put_record(&Record::new()).unwrap_err().is_finished());
    }

    #[test]
    fn rejects_double_connection() {
        let mut base = NodeBase::transform();
        let pipe = Pipe::default();

        base.add_input(pipe.clone()).unwrap();
        assert!(matches!(
            base.add_input(pipe.clone()),
            Err(Error::InputAlreadyConnected { .. })
        ));

        base.add_output(pipe.clone()).unwrap();
        assert!(matches!(
            base.add_output(pipe),
            Err(Error::OutputAlreadyConnected { .. })
        ));
    }

    #[test]
    fn roles_restrict_wiring() {
        let mut source = NodeBase::source();
        assert!(matches!(
            source.add_input(Pipe::default()),
            Err(Error::InputOnSource)
        ));
        assert!(source.add_output(Pipe::default()).is_ok());
        assert!(matches!(
            source.default_output_fields(),
            Err(Error::SourceFieldsRequired)
        ));

        let mut target = NodeBase::target();
        assert!(matches!(
            target.add_output(Pipe::default()),
            Err(Error::OutputOnTarget)
        ));
        assert!(target.add_input(Pipe::default()).is_ok());
        assert!(matches!(
            target.default_output_fields(),
            Err(Error::TargetOutputFields)
        ));
    }

    #[test]
    fn single_input_convenience() {
        let mut base = NodeBase::transform();
        assert!(matches!(base.input(), Err(Error::NotSingleInput { count: 0 })));

        let pipe = Pipe::default();
        base.add_input(pipe.clone()).unwrap();
        assert!(Pipe::same(base.input().unwrap(), &pipe));

        base.add_input(Pipe::default()).unwrap();
        assert!(matches!(base.input(), Err(Error::NotSingleInput { count: 2 })));
        assert!(base.default_output_fields().is_err());
    }

    #[test]
    fn output_fields_follow_single_input() {
        let mut node = Probe::new(NodeBase::transform());
        let pipe = Pipe::default();
        node.base_mut().add_input(pipe.clone()).unwrap();

        assert!(matches!(
            node.output_fields(),
            Err(Error::InputFieldsUnset { .. })
        ));

        pipe.set_fields(FieldList::new(["a", "b"]).unwrap()).unwrap();
        assert_eq!(node.output_field_names().unwrap(), ["a", "b"]);
        assert_eq!(node.base().input_fields().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn configure_applies_declared_attributes() {
        let mut node = Probe::new(NodeBase::transform());
        node.configure(
            &attrs(&[
                ("type", "probe".into()),
                ("limit", 5.into()),
                ("unknown", true.into()),
                ("description", "probing".into()),
            ]),
            true,
        )
        .unwrap();

        assert_eq!(node.limit, Some(5));
        assert_eq!(node.base().description(), Some("probing"));

        // each call applies its own keys only
        node.configure(&attrs(&[("secret", "s3".into())]), false)
            .unwrap();
        assert_eq!(node.limit, Some(5));
        assert_eq!(node.secret.as_deref(), Some("s3"));
    }

    #[test]
    fn configure_refuses_protected_and_mistyped() {
        let mut node = Probe::new(NodeBase::transform());

        let err = node
            .configure(&attrs(&[("limit", 1.into()), ("secret", "x".into())]), true)
            .unwrap_err();
        assert!(matches!(err, Error::ProtectedAttribute { attribute } if attribute == "secret"));
        assert_eq!(node.limit, None);

        let err = node
            .configure(&attrs(&[("limit", "many".into())]), false)
            .unwrap_err();
        assert!(matches!(err, Error::AttributeType { .. }));
    }
}
