use crate::{
    error::{Error, Result},
    node::{Node, Role},
};
use indexmap::IndexMap;
use log::debug;
use pipeflow_config::{AttributeSpec, Attributes};
use serde::Serialize;

/// A node type that can be built by name.
pub trait NodeType: Node + Default + 'static {
    /// The implementation name, e.g. `"RowListSource"`.
    const NAME: &'static str;
    /// Overrides the identifier derived from [NAME](NodeType::NAME).
    const IDENTIFIER: Option<&'static str> = None;
    const DESCRIPTION: &'static str = "";
}

fn build<T: NodeType>() -> Box<dyn Node> {
    Box::new(T::default())
}

/// Link-time registration of a node type.
///
/// ```ignore
/// inventory::submit!(pipeflow::Registration::of::<RowListSource>());
/// ```
pub struct Registration {
    pub name: &'static str,
    pub identifier: Option<&'static str>,
    pub description: &'static str,
    /// Creates an unconfigured node.
    pub factory: fn() -> Box<dyn Node>,
}

inventory::collect!(Registration);

impl Registration {
    pub const fn of<T: NodeType>() -> Self {
        Self {
            name: T::NAME,
            identifier: T::IDENTIFIER,
            description: T::DESCRIPTION,
            factory: build::<T>,
        }
    }

    /// The explicit identifier, or the one derived from the name.
    pub fn identifier(&self) -> String {
        match self.identifier {
            Some(identifier) => identifier.to_string(),
            None => to_identifier(self.name),
        }
    }
}

/// Turn an implementation name into a node type identifier.
///
/// The name is decamelized to snake case and a trailing `_node` is
/// removed: `CSVSourceNode` becomes `csv_source`.
pub fn to_identifier(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut ident = String::with_capacity(name.len() + 4);

    for (index, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && index > 0 {
            let prev = chars[index - 1];
            let next_lower = chars.get(index + 1).map_or(false, |next| next.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary && prev != '_' {
                ident.push('_');
            }
        }
        ident.extend(ch.to_lowercase());
    }

    match ident.strip_suffix("_node") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => ident,
    }
}

/// Description of a registered node type.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub identifier: String,
    pub name: &'static str,
    pub description: &'static str,
    pub role: Role,
    pub attributes: Vec<AttributeSpec>,
}

struct Entry {
    name: &'static str,
    description: &'static str,
    factory: fn() -> Box<dyn Node>,
}

/// Node factories keyed by identifier.
#[derive(Default)]
pub struct Registry {
    entries: IndexMap<String, Entry>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every node type submitted through [inventory].
    pub fn collect() -> Result<Self> {
        let mut registry = Self::new();
        for registration in inventory::iter::<Registration> {
            registry.insert(
                registration.identifier(),
                Entry {
                    name: registration.name,
                    description: registration.description,
                    factory: registration.factory,
                },
            )?;
        }
        Ok(registry)
    }

    /// Register a node type explicitly.
    pub fn register<T: NodeType>(&mut self) -> Result<()> {
        let registration = Registration::of::<T>();
        self.insert(
            registration.identifier(),
            Entry {
                name: registration.name,
                description: registration.description,
                factory: registration.factory,
            },
        )
    }

    fn insert(&mut self, identifier: String, entry: Entry) -> Result<()> {
        if self.entries.contains_key(&identifier) {
            return Err(Error::duplicate_node_type(identifier));
        }
        debug!("registered node type `{}` ({})", identifier, entry.name);
        self.entries.insert(identifier, entry);
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn info(&self, identifier: &str) -> Option<NodeInfo> {
        let (identifier, entry) = self.entries.get_key_value(identifier)?;
        let node = (entry.factory)();

        Some(NodeInfo {
            identifier: identifier.clone(),
            name: entry.name,
            description: entry.description,
            role: node.base().role(),
            attributes: node.attributes(),
        })
    }

    /// Build a node and configure it with `attributes`.
    pub fn create(
        &self,
        identifier: &str,
        attributes: &Attributes,
        protected: bool,
    ) -> Result<Box<dyn Node>> {
        let entry = self
            .entries
            .get(identifier)
            .ok_or_else(|| Error::unknown_node_type(identifier))?;
        let mut node = (entry.factory)();
        node.configure(attributes, protected)?;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{node::NodeBase, nodes::Head};
    use pipeflow_config::AttrValue;
    use std::any::Any;

    #[derive(Default)]
    struct Discard {
        base: NodeBase,
    }

    impl Node for Discard {
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
    }

    impl NodeType for Discard {
        const NAME: &'static str = "DiscardNode";
    }

    #[test]
    fn identifiers_from_names() {
        assert_eq!(to_identifier("CSVSourceNode"), "csv_source");
        assert_eq!(to_identifier("RowListSource"), "row_list_source");
        assert_eq!(to_identifier("Head"), "head");
        assert_eq!(to_identifier("Node"), "node");
        assert_eq!(to_identifier("SQLTableTarget"), "sql_table_target");
        assert_eq!(to_identifier("Base64DecodeNode"), "base64_decode");
    }

    #[test]
    fn explicit_registration() {
        let mut registry = Registry::new();
        registry.register::<Discard>().unwrap();
        assert!(registry.contains("discard"));
        assert!(matches!(
            registry.register::<Discard>(),
            Err(Error::DuplicateNodeType { .. })
        ));

        let info = registry.info("discard").unwrap();
        assert_eq!(info.name, "DiscardNode");
        assert_eq!(info.role, Role::Transform);
    }

    #[test]
    fn collected_builtins() {
        let registry = Registry::collect().unwrap();
        let identifiers: Vec<_> = registry.identifiers().collect();
        for expect in ["row_list_source", "head", "append", "row_list_target"] {
            assert!(identifiers.contains(&expect), "missing {}", expect);
        }

        let info = registry.info("row_list_source").unwrap();
        assert_eq!(info.role, Role::Source);
        assert!(info.attributes.iter().any(|attr| attr.name == "rows" && attr.protected));
    }

    #[test]
    fn create_configures_node() {
        let registry = Registry::collect().unwrap();
        let attributes: Attributes = [("size".to_string(), AttrValue::from(3))]
            .into_iter()
            .collect();

        let node = registry.create("head", &attributes, true).unwrap();
        let head = node.as_any().downcast_ref::<Head>().unwrap();
        assert_eq!(head.size(), 3);

        assert!(matches!(
            registry.create("tail", &attributes, true),
            Err(Error::UnknownNodeType { .. })
        ));
    }
}
