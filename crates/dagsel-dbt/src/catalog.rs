//! Node catalog construction
//!
//! Turns declarations into resolved, immutable nodes keyed by unique_id.
//! Construction is all-or-nothing: any duplicate id, bad reference or config
//! type error aborts the build and no partial catalog is returned.

use dagsel_core::{
    ConfigError, ConfigLayer, ConfigResolver, ErrorCode, Node, NodeBase, NodeId, ParsedNode,
    ProjectConfig, ResourceType, SourceTable,
};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};

use crate::declarations::{Declarations, NodeDeclaration, SourceDeclaration};

/// Resolved nodes in discovery order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Enabled nodes: what selection and the graph see
    nodes: IndexMap<NodeId, Node>,

    /// Nodes disabled via config, kept for dependency-integrity checks
    disabled: IndexMap<NodeId, Node>,

    /// Every package that declared at least one resource
    packages: BTreeSet<String>,
}

impl Catalog {
    /// Build the catalog from a declarations document
    pub fn build(declarations: &Declarations) -> Result<Self, CatalogError> {
        let mut catalog = Catalog::default();
        let mut locations: HashMap<NodeId, String> = HashMap::new();

        for decl in &declarations.nodes {
            let node = build_node(&declarations.project, decl)?;
            catalog.insert(node, decl.original_file_path(), &mut locations)?;
        }

        for decl in &declarations.sources {
            let source = build_source(&declarations.project, decl)?;
            catalog.insert(source, decl.original_file_path(), &mut locations)?;
        }

        let index = ReferenceIndex::from_catalog(&catalog);
        for decl in &declarations.nodes {
            catalog.resolve_references(&index, decl)?;
        }

        catalog.check_dependencies()?;

        tracing::info!(
            nodes = catalog.nodes.len(),
            disabled = catalog.disabled.len(),
            packages = catalog.packages.len(),
            "catalog built"
        );

        Ok(catalog)
    }

    fn insert(
        &mut self,
        node: Node,
        location: &str,
        locations: &mut HashMap<NodeId, String>,
    ) -> Result<(), CatalogError> {
        let unique_id = node.unique_id().to_string();

        if let Some(first) = locations.insert(unique_id.clone(), location.to_string()) {
            return Err(CatalogError::DuplicateIdentifier {
                unique_id,
                first,
                second: location.to_string(),
            });
        }

        self.packages.insert(node.package_name().to_string());

        if node.is_enabled() {
            self.nodes.insert(unique_id, node);
        } else {
            tracing::debug!(unique_id = %unique_id, "node disabled via config");
            self.disabled.insert(unique_id, node);
        }

        Ok(())
    }

    /// Resolve `ref`/`source` calls of an enabled node into depends_on entries
    fn resolve_references(
        &mut self,
        index: &ReferenceIndex,
        decl: &NodeDeclaration,
    ) -> Result<(), CatalogError> {
        if decl.refs.is_empty() && decl.sources.is_empty() {
            return Ok(());
        }

        let owner = decl.unique_id();
        if !self.nodes.contains_key(&owner) {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(decl.refs.len() + decl.sources.len());
        for reference in &decl.refs {
            resolved.push(index.resolve_ref(&owner, &decl.package_name, reference)?);
        }
        for reference in &decl.sources {
            resolved.push(index.resolve_source(&owner, &decl.package_name, reference)?);
        }

        if let Some(Node::Parsed(node)) = self.nodes.get_mut(&owner) {
            node.depends_on.nodes.extend(resolved);
        }

        Ok(())
    }

    /// Every depends_on entry of an enabled node must name an enabled node
    fn check_dependencies(&self) -> Result<(), CatalogError> {
        for node in self.nodes.values() {
            let Some(depends_on) = node.depends_on() else {
                continue;
            };

            for dep in &depends_on.nodes {
                if self.nodes.contains_key(dep) {
                    continue;
                }

                let node = node.unique_id().to_string();
                let reference = dep.clone();
                return Err(if self.disabled.contains_key(dep) {
                    CatalogError::DisabledReference { node, reference }
                } else {
                    CatalogError::DanglingReference { node, reference }
                });
            }
        }

        Ok(())
    }

    /// Get an enabled node by unique_id
    pub fn get(&self, unique_id: &str) -> Result<&Node, CatalogError> {
        self.nodes
            .get(unique_id)
            .ok_or_else(|| CatalogError::NotFound(unique_id.to_string()))
    }

    /// Get an enabled node, if present
    pub fn find(&self, unique_id: &str) -> Option<&Node> {
        self.nodes.get(unique_id)
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.nodes.contains_key(unique_id)
    }

    /// Enabled nodes in discovery order
    pub fn all(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Disabled nodes in discovery order
    pub fn disabled(&self) -> impl Iterator<Item = &Node> {
        self.disabled.values()
    }

    /// Discovery position of an enabled node
    pub fn position(&self, unique_id: &str) -> Option<usize> {
        self.nodes.get_index_of(unique_id)
    }

    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One candidate target of a `ref`/`source` call
#[derive(Debug, Clone)]
struct IndexEntry {
    package: String,
    unique_id: NodeId,
    enabled: bool,
}

/// Name lookup tables for reference resolution, built once per catalog
#[derive(Debug, Default)]
struct ReferenceIndex {
    /// Refable node name -> candidates, enabled first, each in discovery order
    refs: IndexMap<String, Vec<IndexEntry>>,

    /// `(source_name, table)` -> candidates
    sources: IndexMap<(String, String), Vec<IndexEntry>>,
}

impl ReferenceIndex {
    fn from_catalog(catalog: &Catalog) -> Self {
        let mut index = Self::default();

        let enabled = catalog.nodes.values().map(|node| (node, true));
        let disabled = catalog.disabled.values().map(|node| (node, false));

        for (node, enabled) in enabled.chain(disabled) {
            let entry = IndexEntry {
                package: node.package_name().to_string(),
                unique_id: node.unique_id().to_string(),
                enabled,
            };

            match node {
                Node::Source(source) => index
                    .sources
                    .entry((source.source_name.clone(), source.base.name.clone()))
                    .or_default()
                    .push(entry),
                Node::Parsed(_) if node.resource_type().is_refable() => {
                    index.refs.entry(node.name().to_string()).or_default().push(entry)
                }
                Node::Parsed(_) => {}
            }
        }

        index
    }

    fn resolve_ref(&self, owner: &str, owner_package: &str, reference: &[String]) -> Result<NodeId, CatalogError> {
        let (package, name) = match reference {
            [name] => (None, name),
            [package, name] => (Some(package.as_str()), name),
            _ => {
                return Err(CatalogError::InvalidReference {
                    node: owner.to_string(),
                    kind: "ref",
                    reference: reference.to_vec(),
                })
            }
        };

        let candidates = self.refs.get(name).map(Vec::as_slice).unwrap_or_default();
        Self::pick(owner, owner_package, package, reference, candidates)
    }

    fn resolve_source(&self, owner: &str, owner_package: &str, reference: &[String]) -> Result<NodeId, CatalogError> {
        let [source_name, table] = reference else {
            return Err(CatalogError::InvalidReference {
                node: owner.to_string(),
                kind: "source",
                reference: reference.to_vec(),
            });
        };

        let candidates = self
            .sources
            .get(&(source_name.clone(), table.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Self::pick(owner, owner_package, None, reference, candidates)
    }

    /// Prefer an enabled match in the owner's own package, then any enabled match
    fn pick(
        owner: &str,
        owner_package: &str,
        package: Option<&str>,
        reference: &[String],
        candidates: &[IndexEntry],
    ) -> Result<NodeId, CatalogError> {
        let in_package = |entry: &&IndexEntry| package.map_or(true, |p| entry.package == p);

        let enabled = || candidates.iter().filter(in_package).filter(|e| e.enabled);
        let found = enabled()
            .find(|e| e.package == owner_package)
            .or_else(|| enabled().next());

        if let Some(entry) = found {
            return Ok(entry.unique_id.clone());
        }

        let node = owner.to_string();
        let reference = reference.join(".");
        if candidates.iter().filter(in_package).any(|e| !e.enabled) {
            Err(CatalogError::DisabledReference { node, reference })
        } else {
            Err(CatalogError::DanglingReference { node, reference })
        }
    }
}

fn build_node(project: &ProjectConfig, decl: &NodeDeclaration) -> Result<Node, CatalogError> {
    let unique_id = decl.unique_id();
    let fqn = decl.fqn();

    let mut chain = project.scope_chain(decl.resource_type, &fqn);
    chain.push(ConfigLayer::new(decl.config.clone()).with_replace(&decl.replace_config));

    let config = ConfigResolver::resolve(decl.resource_type, &unique_id, &chain)?;
    let alias = config
        .alias
        .clone()
        .or_else(|| decl.alias.clone())
        .unwrap_or_else(|| decl.name.clone());
    let tags = merge_tags(&decl.tags, &config.tags);

    Ok(Node::Parsed(ParsedNode {
        base: NodeBase {
            unique_id,
            resource_type: decl.resource_type,
            package_name: decl.package_name.clone(),
            name: decl.name.clone(),
            fqn,
            path: decl.path.clone(),
            original_file_path: decl.original_file_path().to_string(),
            tags,
        },
        alias,
        config,
        depends_on: decl.depends_on.clone(),
    }))
}

fn build_source(project: &ProjectConfig, decl: &SourceDeclaration) -> Result<Node, CatalogError> {
    let unique_id = decl.unique_id();
    let fqn = decl.fqn();

    let mut chain = project.scope_chain(ResourceType::Source, &fqn);
    chain.push(ConfigLayer::new(decl.config.clone()));

    let config = ConfigResolver::resolve_source(&unique_id, &chain)?;
    let tags = merge_tags(&decl.tags, &config.tags);

    Ok(Node::Source(SourceTable {
        base: NodeBase {
            unique_id,
            resource_type: ResourceType::Source,
            package_name: decl.package_name.clone(),
            name: decl.name.clone(),
            fqn,
            path: decl.path.clone(),
            original_file_path: decl.original_file_path().to_string(),
            tags,
        },
        source_name: decl.source_name.clone(),
        config,
    }))
}

/// Declared tags first, then inherited ones, without duplicates
fn merge_tags(declared: &[String], inherited: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    declared
        .iter()
        .chain(inherited)
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Catalog construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Duplicate unique_id '{unique_id}': declared in {first} and in {second}")]
    DuplicateIdentifier {
        unique_id: NodeId,
        first: String,
        second: String,
    },

    #[error("'{node}' depends on '{reference}', which was not found")]
    DanglingReference { node: NodeId, reference: String },

    #[error("'{node}' depends on '{reference}', which is disabled")]
    DisabledReference { node: NodeId, reference: String },

    #[error("'{node}' has a malformed {kind} reference {reference:?}")]
    InvalidReference {
        node: NodeId,
        kind: &'static str,
        reference: Vec<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Node '{0}' not found in catalog")]
    NotFound(NodeId),
}

impl CatalogError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateIdentifier { .. } => ErrorCode::DuplicateIdentifier,
            Self::DanglingReference { .. } => ErrorCode::DanglingReference,
            Self::DisabledReference { .. } => ErrorCode::DisabledReference,
            Self::InvalidReference { .. } => ErrorCode::InvalidReference,
            Self::Config(e) => e.code(),
            Self::NotFound(_) => ErrorCode::NodeNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn declarations(value: serde_json::Value) -> Declarations {
        serde_json::from_value(value).unwrap()
    }

    fn model(name: &str) -> serde_json::Value {
        json!({
            "resource_type": "model",
            "package_name": "test",
            "name": name,
            "path": format!("{}.sql", name),
            "original_file_path": format!("models/{}.sql", name),
        })
    }

    #[test]
    fn builds_in_discovery_order() {
        let decls = declarations(json!({
            "nodes": [model("b"), model("a")],
            "sources": [{"package_name": "test", "source_name": "raw", "name": "users", "path": "models/schema.yml"}]
        }));
        let catalog = Catalog::build(&decls).unwrap();

        let ids: Vec<&str> = catalog.all().map(|n| n.unique_id()).collect();
        assert_eq!(ids, vec!["model.test.b", "model.test.a", "source.test.raw.users"]);
        assert_eq!(catalog.position("model.test.a"), Some(1));
        assert!(catalog.packages().contains("test"));
    }

    #[test]
    fn duplicate_identifiers_are_fatal() {
        let mut second = model("a");
        second["original_file_path"] = json!("models/sub/a.sql");
        let decls = declarations(json!({"nodes": [model("a"), second]}));

        let err = Catalog::build(&decls).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateIdentifier {
                unique_id: "model.test.a".to_string(),
                first: "models/a.sql".to_string(),
                second: "models/sub/a.sql".to_string(),
            }
        );
        assert_eq!(err.code(), ErrorCode::DuplicateIdentifier);
    }

    #[test]
    fn dangling_reference_is_fatal() {
        let mut b = model("b");
        b["depends_on"] = json!({"nodes": ["model.test.missing"]});
        let err = Catalog::build(&declarations(json!({"nodes": [b]}))).unwrap_err();

        assert_eq!(
            err,
            CatalogError::DanglingReference {
                node: "model.test.b".to_string(),
                reference: "model.test.missing".to_string(),
            }
        );
    }

    #[test]
    fn disabled_nodes_are_retained_but_not_visible() {
        let mut a = model("a");
        a["config"] = json!({"enabled": false});
        let mut b = model("b");
        b["refs"] = json!([["a"]]);

        let err = Catalog::build(&declarations(json!({"nodes": [a.clone(), b]}))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DisabledReference);

        let catalog = Catalog::build(&declarations(json!({"nodes": [a, model("c")]}))).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.disabled().count(), 1);
        assert!(matches!(catalog.get("model.test.a"), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn refs_and_sources_resolve_to_unique_ids() {
        let mut b = model("b");
        b["refs"] = json!([["a"], ["test", "c"]]);
        b["sources"] = json!([["raw", "users"]]);
        b["depends_on"] = json!({"macros": ["macro.dbt.is_incremental"]});

        let decls = declarations(json!({
            "nodes": [model("a"), b, model("c")],
            "sources": [{"package_name": "test", "source_name": "raw", "name": "users", "path": "models/schema.yml"}]
        }));
        let catalog = Catalog::build(&decls).unwrap();

        let deps = catalog.get("model.test.b").unwrap().depends_on().unwrap();
        assert_eq!(
            deps.nodes.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["model.test.a", "model.test.c", "source.test.raw.users"]
        );
        assert_eq!(deps.macros.len(), 1);
    }

    #[test]
    fn refs_prefer_the_owners_package() {
        let mut dep = model("shared");
        dep["package_name"] = json!("dep");
        let mut local = model("b");
        local["refs"] = json!([["shared"], ["dep", "shared"], ["only_dep"]]);
        let mut only_dep = model("only_dep");
        only_dep["package_name"] = json!("dep");

        let decls = declarations(json!({"nodes": [dep, only_dep, model("shared"), local]}));
        let catalog = Catalog::build(&decls).unwrap();

        let deps = catalog.get("model.test.b").unwrap().depends_on().unwrap();
        assert_eq!(
            deps.nodes.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["model.test.shared", "model.dep.shared", "model.dep.only_dep"]
        );
    }

    #[test]
    fn long_ref_chains_resolve() {
        let nodes: Vec<_> = (0..2000)
            .map(|i| {
                let mut node = model(&format!("m{}", i));
                if i > 0 {
                    node["refs"] = json!([[format!("m{}", i - 1)]]);
                }
                node
            })
            .collect();
        let catalog = Catalog::build(&declarations(json!({"nodes": nodes}))).unwrap();

        assert_eq!(catalog.len(), 2000);
        let deps = catalog.get("model.test.m1999").unwrap().depends_on().unwrap();
        assert!(deps.nodes.contains("model.test.m1998"));

        let mut dangling = model("x");
        dangling["refs"] = json!([["m5000"]]);
        let err = Catalog::build(&declarations(json!({"nodes": [model("m0"), dangling]}))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DanglingReference);
    }

    #[test]
    fn malformed_reference() {
        let mut b = model("b");
        b["refs"] = json!([["too", "many", "parts"]]);
        let err = Catalog::build(&declarations(json!({"nodes": [b]}))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReference);
    }

    #[test]
    fn config_errors_abort_the_build() {
        let mut a = model("a");
        a["config"] = json!({"enabled": "no"});
        let err = Catalog::build(&declarations(json!({"nodes": [a]}))).unwrap_err();
        assert!(matches!(err, CatalogError::Config(ConfigError::TypeMismatch { .. })));
        assert_eq!(err.code(), ErrorCode::ConfigTypeError);
    }

    #[test]
    fn tags_and_alias_resolution() {
        let mut a = model("a");
        a["tags"] = json!(["daily"]);
        a["config"] = json!({"tags": ["daily", "pii"], "alias": "a_v2"});
        let decls = declarations(json!({
            "project": {"models": {"config": {"tags": ["core"]}}},
            "nodes": [a]
        }));
        let catalog = Catalog::build(&decls).unwrap();

        let Node::Parsed(node) = catalog.get("model.test.a").unwrap() else {
            panic!("expected a parsed node");
        };
        assert_eq!(node.base.tags, vec!["daily", "core", "pii"]);
        assert_eq!(node.config.tags, vec!["core", "daily", "pii"]);
        assert_eq!(node.alias, "a_v2");
    }
}
