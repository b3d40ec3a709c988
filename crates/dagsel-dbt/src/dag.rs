//! Dependency graph (DAG) construction and traversal
//!
//! Builds forward and reverse dependency edges from the catalog for
//! ancestor/descendant queries with an optional depth bound.

use dagsel_core::{ErrorCode, NodeId};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::catalog::Catalog;

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Node -> nodes it depends on (parents)
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Node -> nodes that depend on it (children)
    children: HashMap<NodeId, Vec<NodeId>>,

    /// Node -> macros it references
    macros: HashMap<NodeId, Vec<String>>,

    /// Macro -> nodes referencing it
    macro_users: HashMap<String, Vec<NodeId>>,

    /// All nodes in catalog order
    nodes: Vec<NodeId>,
}

impl DependencyGraph {
    /// Build a dependency graph from the enabled nodes of a catalog
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, GraphError> {
        let mut graph = Self::default();

        for node in catalog.all() {
            let node_id = node.unique_id().to_string();
            graph.nodes.push(node_id.clone());

            let Some(depends_on) = node.depends_on() else {
                continue;
            };

            for dep_id in &depends_on.nodes {
                if !catalog.contains(dep_id) {
                    return Err(GraphError::DanglingEdge {
                        from: dep_id.clone(),
                        to: node_id,
                    });
                }

                graph.parents.entry(node_id.clone()).or_default().push(dep_id.clone());
                graph.children.entry(dep_id.clone()).or_default().push(node_id.clone());
            }

            for macro_id in &depends_on.macros {
                graph.macros.entry(node_id.clone()).or_default().push(macro_id.clone());
                graph.macro_users.entry(macro_id.clone()).or_default().push(node_id.clone());
            }
        }

        if let Err(cycle) = graph.topological_sort() {
            return Err(GraphError::CyclicDependency { nodes: cycle });
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.parents.values().map(Vec::len).sum::<usize>(),
            "dependency graph built"
        );

        Ok(graph)
    }

    /// All nodes in the graph, in catalog order
    pub fn all_nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Immediate parents (dependencies) of a node
    pub fn parents(&self, node_id: &str) -> &[NodeId] {
        self.parents.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Immediate children (dependents) of a node
    pub fn children(&self, node_id: &str) -> &[NodeId] {
        self.children.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Macros a node references
    pub fn macro_dependencies(&self, node_id: &str) -> &[String] {
        self.macros.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Nodes referencing a macro
    pub fn macro_dependents(&self, macro_id: &str) -> &[NodeId] {
        self.macro_users.get(macro_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Upstream nodes within `max_depth` hops (`None` = unbounded)
    ///
    /// The start node itself is never part of the result.
    pub fn ancestors(&self, node_id: &str, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        Self::traverse(&self.parents, node_id, max_depth)
    }

    /// Downstream nodes within `max_depth` hops (`None` = unbounded)
    pub fn descendants(&self, node_id: &str, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        Self::traverse(&self.children, node_id, max_depth)
    }

    /// Breadth-first walk over one edge direction
    fn traverse(
        edges: &HashMap<NodeId, Vec<NodeId>>,
        start: &str,
        max_depth: Option<usize>,
    ) -> BTreeSet<NodeId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((start, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            let Some(next) = edges.get(current) else {
                continue;
            };

            for neighbor in next {
                if neighbor != start && visited.insert(neighbor.clone()) {
                    queue.push_back((neighbor.as_str(), depth + 1));
                }
            }
        }

        visited
    }

    /// Topological order of all nodes (parents first)
    ///
    /// On failure returns the nodes that sit on or behind a cycle, sorted.
    pub fn topological_sort(&self) -> Result<Vec<NodeId>, Vec<NodeId>> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|node| (node.as_str(), self.parents(node).len()))
            .collect();

        // Seed in catalog order so the result is deterministic
        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|node| in_degree.get(node) == Some(&0))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        // Kahn's algorithm
        while let Some(node) = queue.pop_front() {
            result.push(node.to_string());

            for child in self.children(node) {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Ok(result)
        } else {
            let mut remaining: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(node, _)| node.to_string())
                .collect();
            remaining.sort();
            Err(remaining)
        }
    }
}

/// Graph construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Dependency cycle detected between: {}", nodes.join(", "))]
    CyclicDependency { nodes: Vec<NodeId> },

    #[error("Edge from unknown node '{from}' to '{to}'")]
    DanglingEdge { from: NodeId, to: NodeId },
}

impl GraphError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CyclicDependency { .. } => ErrorCode::CyclicDependency,
            Self::DanglingEdge { .. } => ErrorCode::DanglingReference,
        }
    }
}
