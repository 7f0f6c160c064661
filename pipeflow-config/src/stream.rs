use crate::{AttrValue, Attributes, Connection, Ident, PipeConfig};
use anyhow::{ensure, Result};
use indexmap::IndexMap;
use itertools::chain;
use serde::{Deserialize, Serialize};
use serde_loader::Json5Path;
use serde_semver::SemverReq;
use std::{collections::HashSet, path::Path};

#[derive(Debug, Clone, PartialEq, Eq, Hash, SemverReq)]
#[version("0.1.0")]
pub struct Version;

/// The serialized/deserialized stream description.
///
/// The description is valid if
/// - Node names are valid identifiers.
/// - Every node names a node type.
/// - Connection endpoints refer to declared nodes.
/// - No node is connected to itself, and no pair of nodes is connected twice.
///
/// Whether the node types exist, whether their attributes fit, and
/// whether the graph is acyclic is checked when the stream is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Format version
    pub version: Version,
    /// Default settings of every pipe.
    #[serde(default)]
    pub pipe: PipeConfig,
    /// Node declarations in declaration order.
    pub nodes: IndexMap<Ident, NodeConfig>,
    /// Pipes between declared nodes.
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// A node declaration: the node type and its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// The registered node type identifier.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Free-form annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// All other keys.
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl NodeConfig {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            description: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

impl StreamConfig {
    /// Open and validate a stream description in JSON5 format.
    pub fn open<F>(file: F) -> Result<Self>
    where
        F: AsRef<Path>,
    {
        let config: Self = Json5Path::open_and_take(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the description for dangling or repeated connections.
    pub fn validate(&self) -> Result<()> {
        self.nodes.iter().try_for_each(|(name, node)| {
            ensure!(
                !node.node_type.is_empty(),
                "node '{}' does not name a node type",
                name
            );
            Ok(())
        })?;

        // check that connections refer to declared nodes
        self.connections
            .iter()
            .flat_map(|conn| chain!([&conn.from], [&conn.to]))
            .try_for_each(|name| {
                ensure!(
                    self.nodes.contains_key(name),
                    "'{}' is not a declared node",
                    name
                );
                Ok(())
            })?;

        let mut pairs = HashSet::new();
        self.connections.iter().try_for_each(|conn| {
            ensure!(
                conn.from != conn.to,
                "node '{}' is connected to itself",
                conn.from
            );
            ensure!(
                pairs.insert(conn.endpoints()),
                "'{}' is connected to '{}' more than once",
                conn.from,
                conn.to
            );
            Ok(())
        })?;

        Ok(())
    }

    /// The effective settings of the pipe created for `conn`.
    pub fn pipe_config(&self, conn: &Connection) -> PipeConfig {
        conn.pipe
            .map_or(self.pipe, |overrides| overrides.apply(self.pipe))
    }
}
