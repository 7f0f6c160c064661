use pipeflow_config::{AttributeKind, AttrValue, Ident, InvalidIdent};
use pipeflow_pipe::{FieldList, PipeId};
use std::{any::Any, fmt, io};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The completion signal: every output of the node is closed, so
/// nobody wants its data anymore.
///
/// It is returned by [NodeBase::put](crate::NodeBase::put) and turns into
/// [Error::Finished] with `?`, so it escapes [Node::run](crate::Node::run)
/// and the runner treats it like a normal return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("all outputs of the node are closed")]
pub struct NodeFinished;

/// The lifecycle phase a node failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialize,
    Run,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::Run => "run",
            Self::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("all outputs of the node are closed")]
    Finished,
    #[error("{pipe} is already connected as an input")]
    InputAlreadyConnected { pipe: PipeId },
    #[error("{pipe} is already connected as an output")]
    OutputAlreadyConnected { pipe: PipeId },
    #[error("source nodes do not accept input pipes")]
    InputOnSource,
    #[error("target nodes do not accept output pipes")]
    OutputOnTarget,
    #[error("single input requested, but the node has {count} inputs")]
    NotSingleInput { count: usize },
    #[error("source nodes must provide their own output fields")]
    SourceFieldsRequired,
    #[error("target nodes have no output fields")]
    TargetOutputFields,
    #[error("cannot derive output fields: the fields of {pipe} are not set")]
    InputFieldsUnset { pipe: PipeId },
    #[error("{pipe} carries fields {found}, expected {expected}")]
    FieldsMismatch {
        pipe: PipeId,
        expected: FieldList,
        found: FieldList,
    },
    #[error("node `{node}` not found")]
    NodeNotFound { node: String },
    #[error("node `{node}` is declared more than once")]
    DuplicateNode { node: Ident },
    #[error("node `{node}` cannot be connected to itself")]
    SelfConnection { node: Ident },
    #[error("the stream has a cycle through node `{node}`")]
    Cycle { node: Ident },
    #[error("the stream was already run or failed to initialize")]
    AlreadyRun,
    #[error("no node type is registered as `{identifier}`")]
    UnknownNodeType { identifier: String },
    #[error("node type `{identifier}` is registered more than once")]
    DuplicateNodeType { identifier: String },
    #[error("attribute `{attribute}` is protected")]
    ProtectedAttribute { attribute: String },
    #[error("attribute `{attribute}` expects {expected}, got `{value}`")]
    AttributeType {
        attribute: String,
        expected: AttributeKind,
        value: String,
    },
    #[error("node `{node}` failed to {stage}: {source}")]
    NodeFailed {
        node: Ident,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
    #[error("node `{node}` panicked: {message}")]
    Panicked { node: Ident, message: String },
    #[error(transparent)]
    InvalidName(#[from] InvalidIdent),
    #[error(transparent)]
    Pipe(#[from] pipeflow_pipe::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("internal error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<NodeFinished> for Error {
    fn from(_: NodeFinished) -> Self {
        Self::Finished
    }
}

impl Error {
    /// Returns true for the completion signal, which is not a failure.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn input_already_connected(pipe: PipeId) -> Self {
        Self::InputAlreadyConnected { pipe }
    }

    pub fn output_already_connected(pipe: PipeId) -> Self {
        Self::OutputAlreadyConnected { pipe }
    }

    pub fn not_single_input(count: usize) -> Self {
        Self::NotSingleInput { count }
    }

    pub fn input_fields_unset(pipe: PipeId) -> Self {
        Self::InputFieldsUnset { pipe }
    }

    pub fn fields_mismatch(pipe: PipeId, expected: &FieldList, found: &FieldList) -> Self {
        Self::FieldsMismatch {
            pipe,
            expected: expected.clone(),
            found: found.clone(),
        }
    }

    pub fn node_not_found(node: impl fmt::Display) -> Self {
        Self::NodeNotFound {
            node: node.to_string(),
        }
    }

    pub fn unknown_node_type(identifier: impl Into<String>) -> Self {
        Self::UnknownNodeType {
            identifier: identifier.into(),
        }
    }

    pub fn duplicate_node_type(identifier: impl Into<String>) -> Self {
        Self::DuplicateNodeType {
            identifier: identifier.into(),
        }
    }

    pub fn protected_attribute(attribute: impl Into<String>) -> Self {
        Self::ProtectedAttribute {
            attribute: attribute.into(),
        }
    }

    pub fn attribute_type(
        attribute: impl Into<String>,
        expected: AttributeKind,
        value: &AttrValue,
    ) -> Self {
        Self::AttributeType {
            attribute: attribute.into(),
            expected,
            value: value.to_string(),
        }
    }

    pub fn node_failed(node: &Ident, stage: Stage, source: Error) -> Self {
        Self::NodeFailed {
            node: node.clone(),
            stage,
            source: Box::new(source),
        }
    }

    pub(crate) fn panicked(node: &Ident, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self::Panicked {
            node: node.clone(),
            message,
        }
    }
}
