//! dagsel engine - node selection
//!
//! This crate implements selection over a built catalog:
//! - Selector expression grammar and parser
//! - Base predicates (name, fqn, tag, source, path, config)
//! - Graph-operator expansion and indirect test selection
//! - Resource-type filtering
//! - Listing projections

pub mod selector;
pub mod matcher;
pub mod filter;
pub mod selection;
pub mod projection;

pub use selector::{Criterion, GraphDepth, PathMatcher, SelectionSpec, SelectorMethod, SelectorParseError};
pub use filter::ResourceTypeFilter;
pub use selection::{NodeSelector, Selection, SelectionRequest};
pub use projection::{project, Projection};
