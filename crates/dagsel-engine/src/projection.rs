//! Listing projections of selected nodes

use dagsel_core::{DependsOn, Node, NodeConfig, OutputShape, ResourceType, SourceConfig};
use dagsel_dbt::Catalog;
use serde::Serialize;
use serde_json::Value;

use crate::selection::Selection;

/// One listed node
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Text(String),
    Json(Value),
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Serialize)]
struct NodeRecord<'a> {
    name: &'a str,
    package_name: &'a str,
    depends_on: &'a DependsOn,
    tags: &'a [String],
    config: &'a NodeConfig,
    alias: &'a str,
    resource_type: ResourceType,
}

#[derive(Serialize)]
struct SourceRecord<'a> {
    config: &'a SourceConfig,
    package_name: &'a str,
    name: &'a str,
    source_name: &'a str,
    resource_type: ResourceType,
    tags: &'a [String],
}

/// Project the selection in catalog order
pub fn project(
    catalog: &Catalog,
    selection: &Selection,
    shape: OutputShape,
) -> Result<Vec<Projection>, serde_json::Error> {
    selection
        .nodes(catalog)
        .into_iter()
        .map(|node| project_node(node, shape))
        .collect()
}

pub fn project_node(node: &Node, shape: OutputShape) -> Result<Projection, serde_json::Error> {
    let projection = match shape {
        OutputShape::Name => Projection::Text(display_name(node)),
        OutputShape::Selector => Projection::Text(selector(node)),
        OutputShape::Path => Projection::Text(node.base().original_file_path.clone()),
        OutputShape::Json => Projection::Json(record(node)?),
    };

    Ok(projection)
}

/// Node name; `source_name.table` for sources
pub fn display_name(node: &Node) -> String {
    match node {
        Node::Source(source) => format!("{}.{}", source.source_name, source.base.name),
        Node::Parsed(parsed) => parsed.base.name.clone(),
    }
}

/// A `--select` token selecting exactly this node
pub fn selector(node: &Node) -> String {
    match node {
        Node::Source(source) => format!(
            "source:{}.{}.{}",
            source.base.package_name, source.source_name, source.base.name
        ),
        Node::Parsed(parsed) => parsed.base.fqn.join("."),
    }
}

fn record(node: &Node) -> Result<Value, serde_json::Error> {
    match node {
        Node::Parsed(parsed) => serde_json::to_value(NodeRecord {
            name: &parsed.base.name,
            package_name: &parsed.base.package_name,
            depends_on: &parsed.depends_on,
            tags: &parsed.base.tags,
            config: &parsed.config,
            alias: &parsed.alias,
            resource_type: parsed.base.resource_type,
        }),
        Node::Source(source) => serde_json::to_value(SourceRecord {
            config: &source.config,
            package_name: &source.base.package_name,
            name: &source.base.name,
            source_name: &source.source_name,
            resource_type: source.base.resource_type,
            tags: &source.base.tags,
        }),
    }
}
