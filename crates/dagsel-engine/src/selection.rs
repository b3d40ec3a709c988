//! Selection evaluation over a built catalog and graph
//!
//! Each criterion yields a seed set from its base predicate, widened by its
//! graph operators. Criteria are unioned, tests attached to the result are
//! pulled in according to the indirect selection policy, the exclude set is
//! subtracted and finally the resource-type filter is applied.

use dagsel_core::{IndirectSelection, Node, NodeId, ResourceType, SelectionSettings};
use dagsel_dbt::{Catalog, DependencyGraph};
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::filter::ResourceTypeFilter;
use crate::matcher;
use crate::selector::{Criterion, SelectionSpec, SelectorMethod};

/// What to list
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    /// `--select`; `None` means every node and source
    pub select: Option<SelectionSpec>,

    /// `--exclude`
    pub exclude: Option<SelectionSpec>,

    /// `--resource-type`
    pub resource_types: ResourceTypeFilter,
}

impl SelectionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_select(mut self, spec: SelectionSpec) -> Self {
        self.select = Some(spec);
        self
    }

    pub fn with_exclude(mut self, spec: SelectionSpec) -> Self {
        self.exclude = Some(spec);
        self
    }

    pub fn with_resource_types(mut self, filter: ResourceTypeFilter) -> Self {
        self.resource_types = filter;
        self
    }
}

/// Selected unique_ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<NodeId>,
}

impl Selection {
    pub fn ids(&self) -> &BTreeSet<NodeId> {
        &self.ids
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.ids.contains(unique_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected nodes in catalog (discovery) order
    pub fn nodes<'c>(&self, catalog: &'c Catalog) -> Vec<&'c Node> {
        catalog
            .all()
            .filter(|node| self.ids.contains(node.unique_id()))
            .collect()
    }
}

impl FromIterator<NodeId> for Selection {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Evaluates selection requests against an immutable catalog and graph
pub struct NodeSelector<'a> {
    catalog: &'a Catalog,
    graph: &'a DependencyGraph,
    indirect: IndirectSelection,
    parallel: bool,
}

impl<'a> NodeSelector<'a> {
    pub fn new(catalog: &'a Catalog, graph: &'a DependencyGraph) -> Self {
        Self {
            catalog,
            graph,
            indirect: IndirectSelection::default(),
            parallel: true,
        }
    }

    /// Apply the `[selection]` settings section
    pub fn with_settings(self, settings: &SelectionSettings) -> Self {
        self.with_indirect_selection(settings.indirect_selection)
            .with_parallel(settings.parallel)
    }

    pub fn with_indirect_selection(mut self, mode: IndirectSelection) -> Self {
        self.indirect = mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Resolve a request to the final selection
    pub fn select(&self, request: &SelectionRequest) -> Selection {
        let default_includes;
        let include = match &request.select {
            Some(spec) => spec,
            None => {
                default_includes = SelectionSpec::default_includes();
                &default_includes
            }
        };

        let included = self.with_indirect_tests(self.evaluate(include));
        let excluded = match &request.exclude {
            Some(spec) => self.with_indirect_tests(self.evaluate(spec)),
            None => BTreeSet::new(),
        };

        let selection: Selection = included
            .difference(&excluded)
            .filter(|id| {
                self.catalog
                    .find(id)
                    .is_some_and(|node| request.resource_types.contains(node.resource_type()))
            })
            .cloned()
            .collect();

        if selection.is_empty() {
            tracing::warn!(
                included = included.len(),
                excluded = excluded.len(),
                "selection matched no nodes"
            );
        } else {
            tracing::debug!(selected = selection.len(), "selection resolved");
        }

        selection
    }

    /// Union of all criteria in a `SelectionSpec`, before indirect tests and exclusion
    pub fn evaluate(&self, spec: &SelectionSpec) -> BTreeSet<NodeId> {
        if self.parallel {
            spec.criteria()
                .par_iter()
                .map(|criterion| self.evaluate_criterion(criterion))
                .reduce(BTreeSet::new, |mut acc, ids| {
                    acc.extend(ids);
                    acc
                })
        } else {
            spec.criteria()
                .iter()
                .flat_map(|criterion| self.evaluate_criterion(criterion))
                .collect()
        }
    }

    /// Seed set of one criterion widened by its graph operators
    ///
    /// Ephemeral models only survive when the base predicate matched them
    /// directly.
    pub fn evaluate_criterion(&self, criterion: &Criterion) -> BTreeSet<NodeId> {
        let seeds = self.base_matches(criterion);
        let mut reached = BTreeSet::new();

        for id in &seeds {
            if let Some(depth) = criterion.parents {
                reached.extend(self.graph.ancestors(id, depth.max_depth()));
            }
            if let Some(depth) = criterion.children {
                reached.extend(self.graph.descendants(id, depth.max_depth()));
            }
        }

        let mut result = seeds;
        result.extend(
            reached
                .into_iter()
                .filter(|id| !self.catalog.find(id).is_some_and(Node::is_ephemeral)),
        );

        tracing::debug!(criterion = %criterion, matched = result.len(), "criterion evaluated");
        result
    }

    fn base_matches(&self, criterion: &Criterion) -> BTreeSet<NodeId> {
        let value = criterion.value.as_str();

        match &criterion.method {
            SelectorMethod::Name => {
                let exact = self.matching(|node| matcher::identity_matches(node, value));
                if exact.is_empty() {
                    self.fqn_matching(&criterion.segments())
                } else {
                    exact
                }
            }
            SelectorMethod::Fqn => self.fqn_matching(&criterion.segments()),
            SelectorMethod::Tag => self.matching(|node| matcher::tag_matches(node, value)),
            SelectorMethod::Source => self.matching(|node| match node {
                Node::Source(source) => matcher::source_matches(source, value),
                Node::Parsed(_) => false,
            }),
            SelectorMethod::Path(path) => {
                self.matching(|node| path.matches(&node.base().original_file_path))
            }
            SelectorMethod::Config(keys) => {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                self.matching(|node| {
                    node.config_value(&keys)
                        .is_some_and(|found| matcher::value_matches(&found, value))
                })
            }
        }
    }

    fn fqn_matching(&self, pattern: &[&str]) -> BTreeSet<NodeId> {
        let packages = self.catalog.packages();
        self.matching(|node| !node.is_source() && matcher::fqn_matches(node.fqn(), pattern, packages))
    }

    fn matching(&self, predicate: impl Fn(&Node) -> bool) -> BTreeSet<NodeId> {
        self.catalog
            .all()
            .filter(|node| predicate(*node))
            .map(|node| node.unique_id().to_string())
            .collect()
    }

    /// Add tests whose tested nodes are covered by `selected`
    fn with_indirect_tests(&self, mut selected: BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        if self.indirect == IndirectSelection::Empty {
            return selected;
        }

        let additions: Vec<NodeId> = self
            .catalog
            .all()
            .filter(|node| node.resource_type() == ResourceType::Test)
            .filter(|node| !selected.contains(node.unique_id()))
            .filter(|node| {
                let Some(depends_on) = node.depends_on() else {
                    return false;
                };
                let mut parents = depends_on.nodes.iter();

                match self.indirect {
                    IndirectSelection::Cautious => {
                        !depends_on.nodes.is_empty() && parents.all(|p| selected.contains(p))
                    }
                    IndirectSelection::Eager => parents.any(|p| selected.contains(p)),
                    IndirectSelection::Empty => false,
                }
            })
            .map(|node| node.unique_id().to_string())
            .collect();

        selected.extend(additions);
        selected
    }
}
