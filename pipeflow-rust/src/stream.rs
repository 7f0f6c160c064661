use crate::{
    error::{Error, Result, Stage},
    node::{Node, Role},
    registry::Registry,
};
use derivative::Derivative;
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use pipeflow_config::{Ident, IntoIdent, PipeConfig, StreamConfig};
use pipeflow_pipe::Pipe;
use std::{
    fs::File,
    io::{self, BufWriter},
    panic::{self, AssertUnwindSafe},
    path::Path,
    thread,
};

/// A pipe between two named nodes.
#[derive(Debug, Clone)]
pub struct Link {
    from: Ident,
    to: Ident,
    pipe: Pipe,
}

impl Link {
    pub fn from(&self) -> &Ident {
        &self.from
    }

    pub fn to(&self) -> &Ident {
        &self.to
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Slot {
    #[derivative(Debug = "ignore")]
    node: Box<dyn Node>,
    identifier: Option<String>,
}

/// A graph of named nodes connected by pipes.
///
/// Nodes are added with [add_node](Stream::add_node) and wired with
/// [connect](Stream::connect), or the whole stream is built from a
/// [StreamConfig]. [run](Stream::run) executes every node on its own
/// thread and returns when all of them are done. The nodes stay in the
/// stream afterwards and can be inspected with
/// [node_as](Stream::node_as).
#[derive(Debug, Default)]
pub struct Stream {
    nodes: IndexMap<Ident, Slot>,
    links: Vec<Link>,
    initialized: bool,
    ran: bool,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a stream description in JSON5 format and build it with the
    /// node types of `registry`.
    pub fn open<F>(file: F, registry: &Registry) -> Result<Self>
    where
        F: AsRef<Path>,
    {
        let config = StreamConfig::open(file)?;
        Self::from_config(&config, registry)
    }

    /// Construct a stream from a description. Node attributes are
    /// applied without protection.
    pub fn from_config(config: &StreamConfig, registry: &Registry) -> Result<Self> {
        config.validate()?;
        let mut stream = Self::new();

        for (name, node_config) in &config.nodes {
            let mut attributes = node_config.attributes.clone();
            if let Some(description) = &node_config.description {
                attributes.insert("description".into(), description.as_str().into());
            }

            let node = registry.create(&node_config.node_type, &attributes, false)?;
            stream.insert(name.clone(), node, Some(node_config.node_type.clone()))?;
        }

        for conn in &config.connections {
            stream.connect_with(&conn.from, &conn.to, config.pipe_config(conn))?;
        }

        Ok(stream)
    }

    /// Add a node under a unique name.
    pub fn add_node<N, T>(&mut self, name: N, node: T) -> Result<()>
    where
        N: IntoIdent,
        T: Node + 'static,
    {
        self.add_boxed(name, Box::new(node))
    }

    pub fn add_boxed<N>(&mut self, name: N, node: Box<dyn Node>) -> Result<()>
    where
        N: IntoIdent,
    {
        self.insert(name.into_ident()?, node, None)
    }

    fn insert(&mut self, name: Ident, node: Box<dyn Node>, identifier: Option<String>) -> Result<()> {
        if self.nodes.contains_key(&name) {
            return Err(Error::DuplicateNode { node: name });
        }
        self.nodes.insert(name, Slot { node, identifier });
        Ok(())
    }

    /// Connect two nodes with a pipe of default settings.
    pub fn connect<F, T>(&mut self, from: F, to: T) -> Result<Pipe>
    where
        F: IntoIdent,
        T: IntoIdent,
    {
        self.connect_with(from, to, PipeConfig::default())
    }

    /// Connect two nodes with a new pipe and return the pipe.
    pub fn connect_with<F, T>(&mut self, from: F, to: T, config: PipeConfig) -> Result<Pipe>
    where
        F: IntoIdent,
        T: IntoIdent,
    {
        let from = from.into_ident()?;
        let to = to.into_ident()?;

        if self.ran {
            return Err(Error::AlreadyRun);
        }
        if from == to {
            return Err(Error::SelfConnection { node: from });
        }
        if !self.nodes.contains_key(&from) {
            return Err(Error::node_not_found(&from));
        }

        let pipe = config.build();
        let target = self
            .nodes
            .get_mut(&to)
            .ok_or_else(|| Error::node_not_found(&to))?;
        target.node.base_mut().add_input(pipe.clone())?;

        let source = self
            .nodes
            .get_mut(&from)
            .ok_or_else(|| Error::node_not_found(&from))?;
        if let Err(err) = source.node.base_mut().add_output(pipe.clone()) {
            if let Some(target) = self.nodes.get_mut(&to) {
                target.node.base_mut().detach_input(&pipe);
            }
            return Err(err);
        }

        debug!("connected '{}' -> '{}' with {}", from, to, pipe);
        self.links.push(Link {
            from,
            to,
            pipe: pipe.clone(),
        });
        Ok(pipe)
    }

    pub fn node(&self, name: &str) -> Option<&dyn Node> {
        self.nodes.get(name).map(|slot| &*slot.node)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut (dyn Node + 'static)> {
        self.nodes.get_mut(name).map(|slot| &mut *slot.node)
    }

    /// Get a node as its concrete type.
    pub fn node_as<T>(&self, name: &str) -> Option<&T>
    where
        T: Node + 'static,
    {
        self.node(name)?.as_any().downcast_ref()
    }

    /// The registered identifier a node was built from, if any.
    pub fn node_type(&self, name: &str) -> Option<&str> {
        self.nodes.get(name)?.identifier.as_deref()
    }

    /// Get the names and nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = (&Ident, &dyn Node)> + '_ {
        self.nodes.iter().map(|(name, slot)| (name, &*slot.node))
    }

    pub fn connections(&self) -> &[Link] {
        &self.links
    }

    /// The node names in topological order. Among nodes that are ready
    /// at the same time, the one declared first comes first.
    pub fn sorted_nodes(&self) -> Result<Vec<Ident>> {
        let mut pending: IndexMap<&Ident, usize> =
            self.nodes.keys().map(|name| (name, 0)).collect();
        for link in &self.links {
            if let Some(count) = pending.get_mut(&link.to) {
                *count += 1;
            }
        }

        let mut order = Vec::with_capacity(pending.len());
        while let Some(&first) = pending.keys().next() {
            let Some(index) = pending.values().position(|&count| count == 0) else {
                // every pending node has a pending upstream node, so
                // walking upstream long enough lands on the cycle
                let mut node = first;
                for _ in 0..pending.len() {
                    if let Some(link) = self
                        .links
                        .iter()
                        .find(|link| link.to == *node && pending.contains_key(&link.from))
                    {
                        node = &link.from;
                    }
                }
                return Err(Error::Cycle { node: node.clone() });
            };

            if let Some((name, _)) = pending.shift_remove_index(index) {
                for link in self.links.iter().filter(|link| link.from == *name) {
                    if let Some(count) = pending.get_mut(&link.to) {
                        *count -= 1;
                    }
                }
                order.push(name.clone());
            }
        }

        Ok(order)
    }

    /// Initialize every node in topological order and set the field
    /// list of each output pipe.
    ///
    /// If a node fails, every node whose `initialize` succeeded is
    /// finalized in reverse order and the stream cannot be run anymore.
    /// [run](Stream::run) calls it when it was not called before.
    pub fn initialize(&mut self) -> Result<()> {
        if self.ran {
            return Err(Error::AlreadyRun);
        }
        if self.initialized {
            return Ok(());
        }

        let order = self.sorted_nodes()?;
        let mut done: Vec<&Ident> = Vec::with_capacity(order.len());

        for name in &order {
            let result = self.initialize_node(name).and_then(|()| {
                done.push(name);
                self.set_output_fields(name)
            });

            if let Err(err) = result {
                error!("{}", err);
                self.ran = true;
                for name in done.into_iter().rev() {
                    self.finalize_node(name);
                }
                return Err(err);
            }
        }

        self.initialized = true;
        Ok(())
    }

    fn initialize_node(&mut self, name: &Ident) -> Result<()> {
        let slot = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| Error::node_not_found(name))?;

        slot.node
            .initialize()
            .map_err(|err| Error::node_failed(name, Stage::Initialize, err))
    }

    fn set_output_fields(&self, name: &Ident) -> Result<()> {
        let node = self.node(name.as_str()).ok_or_else(|| Error::node_not_found(name))?;
        if node.base().role() == Role::Target || node.base().outputs().is_empty() {
            return Ok(());
        }

        let fields = node
            .output_fields()
            .map_err(|err| Error::node_failed(name, Stage::Initialize, err))?;
        debug!("node '{}' writes fields {}", name, fields);
        for output in node.base().outputs() {
            output
                .set_fields(fields.clone())
                .map_err(|err| Error::node_failed(name, Stage::Initialize, err.into()))?;
        }
        Ok(())
    }

    fn finalize_node(&mut self, name: &Ident) {
        let Some(slot) = self.nodes.get_mut(name) else {
            return;
        };
        if let Err(err) = slot.node.finalize() {
            error!("{}", Error::node_failed(name, Stage::Finalize, err));
        }
    }

    /// Run the stream to completion.
    ///
    /// Every node runs on its own thread named after the node. Whatever
    /// `run` of a node returns, its outputs are flushed, its inputs are
    /// stopped and it is finalized. Failures of all nodes are logged and
    /// the first one is returned. A stream runs once.
    pub fn run(&mut self) -> Result<()> {
        if self.ran {
            return Err(Error::AlreadyRun);
        }
        self.initialize()?;
        self.ran = true;

        info!("running stream with {} nodes", self.nodes.len());

        // a node is taken out of its cell by its thread, or by the
        // runner if the thread could not be spawned
        let cells: Vec<_> = self
            .nodes
            .iter_mut()
            .map(|(name, slot)| (name, Mutex::new(Some(&mut *slot.node))))
            .collect();

        let results: Vec<Result<()>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(cells.len());
            let mut results = vec![];

            for (name, cell) in &cells {
                let name: &Ident = name;
                let spawned = thread::Builder::new()
                    .name(name.to_string())
                    .spawn_scoped(scope, move || {
                        let node = cell.lock().take();
                        match node {
                            Some(node) => supervise(name, node),
                            None => Ok(()),
                        }
                    });

                match spawned {
                    Ok(handle) => handles.push((name, handle)),
                    Err(err) => {
                        let failed = Error::node_failed(name, Stage::Run, err.into());
                        let node = cell.lock().take();
                        if let Some(node) = node {
                            results.push(shut_down(name, node, Err(failed)));
                        }
                    }
                }
            }

            for (name, handle) in handles {
                let result = match handle.join() {
                    Ok(result) => result,
                    Err(payload) => Err(Error::panicked(name, payload)),
                };
                results.push(result);
            }

            results
        });

        let mut first = None;
        for err in results.into_iter().filter_map(Result::err) {
            error!("{}", err);
            first.get_or_insert(err);
        }

        match first {
            Some(err) => {
                warn!("stream failed");
                Err(err)
            }
            None => {
                info!("stream finished");
                Ok(())
            }
        }
    }

    /// Render the stream in GraphViz DOT format.
    pub fn to_dot(&self) -> Result<String> {
        let mut buf = vec![];
        dot::render(self, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Save the stream graph to the GraphViz DOT file.
    pub fn save_dot_file<F>(&self, file: F) -> io::Result<()>
    where
        F: AsRef<Path>,
    {
        let mut writer = BufWriter::new(File::create(file)?);
        dot::render(self, &mut writer)?;
        Ok(())
    }
}

/// Run one node and shut it down, whatever the run returned.
fn supervise(name: &Ident, node: &mut dyn Node) -> Result<()> {
    debug!("node '{}' started", name);

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| node.run())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) if err.is_finished() => {
            debug!("node '{}' has no open outputs left", name);
            Ok(())
        }
        Ok(Err(err)) => Err(Error::node_failed(name, Stage::Run, err)),
        Err(payload) => Err(Error::panicked(name, payload)),
    };

    shut_down(name, node, outcome)
}

/// Flush the outputs, stop the inputs and finalize the node. The run
/// outcome takes precedence over a finalize failure.
fn shut_down(name: &Ident, node: &mut dyn Node, outcome: Result<()>) -> Result<()> {
    for output in node.base().outputs() {
        output.flush();
    }
    for input in node.base().inputs() {
        input.stop();
    }

    let finalized = node
        .finalize()
        .map_err(|err| Error::node_failed(name, Stage::Finalize, err));
    debug!("node '{}' finished", name);

    match (outcome, finalized) {
        (Err(err), Err(late)) => {
            error!("{}", late);
            Err(err)
        }
        (outcome, finalized) => outcome.and(finalized),
    }
}

mod graphviz {
    use super::*;
    use dot::{Edges, GraphWalk, Id, LabelText, Labeller, Nodes};
    use pipeflow_pipe::PipeId;
    use std::borrow::Cow;

    #[derive(Clone)]
    pub(crate) struct Edge {
        from: usize,
        to: usize,
        pipe: PipeId,
    }

    impl<'a> Labeller<'a, usize, Edge> for Stream {
        fn graph_id(&'a self) -> Id<'a> {
            Id::new("stream").expect("`stream` is a valid graph id")
        }

        fn node_id(&'a self, node: &usize) -> Id<'a> {
            Id::new(format!("node{}", node)).expect("generated node ids are valid")
        }

        fn node_label(&'a self, node: &usize) -> LabelText<'a> {
            let label = match self.nodes.get_index(*node) {
                Some((name, Slot {
                    identifier: Some(identifier),
                    ..
                })) => format!("{} ({})", name, identifier),
                Some((name, _)) => name.to_string(),
                None => String::new(),
            };
            LabelText::LabelStr(label.into())
        }

        fn node_shape(&'a self, _node: &usize) -> Option<LabelText<'a>> {
            Some(LabelText::LabelStr("box".into()))
        }

        fn edge_label(&'a self, edge: &Edge) -> LabelText<'a> {
            LabelText::LabelStr(edge.pipe.to_string().into())
        }
    }

    impl<'a> GraphWalk<'a, usize, Edge> for Stream {
        fn nodes(&'a self) -> Nodes<'a, usize> {
            Cow::Owned((0..self.nodes.len()).collect())
        }

        fn edges(&'a self) -> Edges<'a, Edge> {
            let edges: Vec<_> = self
                .links
                .iter()
                .filter_map(|link| {
                    Some(Edge {
                        from: self.nodes.get_index_of(&link.from)?,
                        to: self.nodes.get_index_of(&link.to)?,
                        pipe: link.pipe.id(),
                    })
                })
                .collect();
            Cow::Owned(edges)
        }

        fn source(&'a self, edge: &Edge) -> usize {
            edge.from
        }

        fn target(&'a self, edge: &Edge) -> usize {
            edge.to
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        node::NodeBase,
        nodes::{Head, RowListSource, RowListTarget},
    };
    use pipeflow_pipe::{row, FieldList};
    use std::any::Any;

    #[derive(Default)]
    struct Finalizing {
        base: NodeBase,
        finalized: bool,
    }

    impl Node for Finalizing {
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
            Ok(())
        }

        fn finalize(&mut self) -> Result<()> {
            self.finalized = true;
            Ok(())
        }
    }

    fn source(rows: usize) -> RowListSource {
        let fields = FieldList::new(["n"]).unwrap();
        RowListSource::new(fields, (0..rows as i64).map(|n| row![n]).collect())
    }

    #[test]
    fn sorted_by_dependency_then_declaration() {
        let mut stream = Stream::new();
        stream.add_node("sink", RowListTarget::default()).unwrap();
        stream.add_node("head", Head::new(1)).unwrap();
        stream.add_node("numbers", source(3)).unwrap();
        stream.connect("numbers", "head").unwrap();
        stream.connect("head", "sink").unwrap();

        let order: Vec<_> = stream
            .sorted_nodes()
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(order, ["numbers", "head", "sink"]);
    }

    #[test]
    fn detects_cycles() {
        let mut stream = Stream::new();
        stream.add_node("a", Head::new(1)).unwrap();
        stream.add_node("b", Head::new(1)).unwrap();
        stream.connect("a", "b").unwrap();
        stream.connect("b", "a").unwrap();

        assert!(matches!(stream.sorted_nodes(), Err(Error::Cycle { .. })));
        assert!(matches!(stream.run(), Err(Error::Cycle { .. })));
    }

    #[test]
    fn wiring_errors() {
        let mut stream = Stream::new();
        stream.add_node("numbers", source(1)).unwrap();
        stream.add_node("sink", RowListTarget::default()).unwrap();

        assert!(matches!(
            stream.add_node("sink", RowListTarget::default()),
            Err(Error::DuplicateNode { .. })
        ));
        assert!(matches!(
            stream.connect("numbers", "nowhere"),
            Err(Error::NodeNotFound { .. })
        ));
        assert!(matches!(
            stream.connect("sink", "sink"),
            Err(Error::SelfConnection { .. })
        ));
        assert!(matches!(
            stream.connect("sink", "numbers"),
            Err(Error::InputOnSource)
        ));
        assert!(matches!(
            stream.connect("bad name", "sink"),
            Err(Error::InvalidName(_))
        ));

        // a refused output leaves no dangling input behind
        stream.add_node("first", Head::new(1)).unwrap();
        assert!(matches!(
            stream.connect("sink", "first"),
            Err(Error::OutputOnTarget)
        ));
        assert!(stream.node("first").unwrap().base().inputs().is_empty());
        assert!(stream.connections().is_empty());
    }

    #[test]
    fn runs_once() {
        let mut stream = Stream::new();
        stream.add_node("numbers", source(2)).unwrap();
        stream.add_node("sink", RowListTarget::default()).unwrap();
        stream.connect("numbers", "sink").unwrap();

        stream.run().unwrap();
        assert!(matches!(stream.run(), Err(Error::AlreadyRun)));
        assert!(matches!(
            stream.connect("numbers", "sink"),
            Err(Error::AlreadyRun)
        ));

        let sink = stream.node_as::<RowListTarget>("sink").unwrap();
        assert_eq!(sink.sink().rows(), vec![row![0], row![1]]);
    }

    #[test]
    fn node_that_never_ran_is_shut_down() {
        let name: Ident = "stalled".parse().unwrap();
        let mut node = Finalizing::default();
        let input = Pipe::new(10, 0);
        let output = Pipe::new(10, 0);
        node.base_mut().add_input(input.clone()).unwrap();
        node.base_mut().add_output(output.clone()).unwrap();

        let failed = Error::node_failed(&name, Stage::Run, Error::AlreadyRun);
        let result = shut_down(&name, &mut node, Err(failed));

        assert!(matches!(result, Err(Error::NodeFailed { stage: Stage::Run, .. })));
        assert!(node.finalized);
        assert!(input.is_closed());
        assert!(output.is_finished());
    }
}
