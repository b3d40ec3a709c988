//! Catalog node model
//!
//! Buildable resources and source tables share a base field set and differ in
//! their config shape and dependency semantics, so a node is a closed enum over
//! the two variants.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{NodeConfig, SourceConfig};
use crate::resource::ResourceType;

/// Node identifier (unique_id, e.g. `model.my_project.users`)
pub type NodeId = String;

/// Declared dependencies of a buildable node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    /// unique_ids of other catalog nodes
    #[serde(default)]
    pub nodes: IndexSet<NodeId>,

    /// unique_ids of referenced macros
    #[serde(default)]
    pub macros: IndexSet<String>,
}

impl DependsOn {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.macros.is_empty()
    }
}

/// Fields every node carries
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBase {
    pub unique_id: NodeId,
    pub resource_type: ResourceType,
    pub package_name: String,
    pub name: String,
    /// Path segments used for fqn-style selection
    pub fqn: Vec<String>,
    /// Location relative to the resource-type root
    pub path: String,
    /// Location relative to the project root
    pub original_file_path: String,
    /// Declared tags plus tags inherited through config
    pub tags: Vec<String>,
}

/// A model, seed, snapshot, analysis or test
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNode {
    pub base: NodeBase,
    pub alias: String,
    pub config: NodeConfig,
    pub depends_on: DependsOn,
}

/// One table of a declared source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub base: NodeBase,
    pub source_name: String,
    pub config: SourceConfig,
}

/// A resolved catalog node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Parsed(ParsedNode),
    Source(SourceTable),
}

impl Node {
    pub fn base(&self) -> &NodeBase {
        match self {
            Self::Parsed(node) => &node.base,
            Self::Source(source) => &source.base,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.base().unique_id
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn resource_type(&self) -> ResourceType {
        self.base().resource_type
    }

    pub fn package_name(&self) -> &str {
        &self.base().package_name
    }

    pub fn fqn(&self) -> &[String] {
        &self.base().fqn
    }

    pub fn tags(&self) -> &[String] {
        &self.base().tags
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Parsed(node) => node.config.enabled,
            Self::Source(source) => source.config.enabled,
        }
    }

    /// Ephemeral models are pass-through: in the graph, not directly built
    pub fn is_ephemeral(&self) -> bool {
        match self {
            Self::Parsed(node) => {
                node.base.resource_type == ResourceType::Model && node.config.is_ephemeral()
            }
            Self::Source(_) => false,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Declared dependencies; sources have none
    pub fn depends_on(&self) -> Option<&DependsOn> {
        match self {
            Self::Parsed(node) => Some(&node.depends_on),
            Self::Source(_) => None,
        }
    }

    /// Resolved config value at a (possibly nested) key
    pub fn config_value(&self, path: &[&str]) -> Option<Value> {
        match self {
            Self::Parsed(node) => node.config.lookup(path),
            Self::Source(source) => source.config.lookup(path),
        }
    }
}
