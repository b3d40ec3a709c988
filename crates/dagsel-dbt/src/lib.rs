//! Declarations loading, node catalog and DAG construction
//!
//! This crate handles:
//! - Parsing the declarations document handed over by discovery
//! - Building the resolved node catalog (config, refs, integrity checks)
//! - Building the dependency graph (DAG) and ancestor/descendant traversal

pub mod declarations;
pub mod catalog;
pub mod dag;

pub use declarations::{Declarations, DeclarationsError, NodeDeclaration, SourceDeclaration};
pub use catalog::{Catalog, CatalogError};
pub use dag::{DependencyGraph, GraphError};
