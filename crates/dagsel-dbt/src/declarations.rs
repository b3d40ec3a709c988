//! Declarations document parsing
//!
//! The declarations document is what discovery hands to the core: every
//! resource with its raw per-scope config, declared dependency references,
//! tags, fqn segments and paths, plus the project-level config blocks.

use dagsel_core::{ConfigMap, DependsOn, ProjectConfig, ResourceType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declarations document structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    /// Project-level config blocks
    #[serde(default)]
    pub project: ProjectConfig,

    /// Buildable resources in discovery order
    #[serde(default)]
    pub nodes: Vec<NodeDeclaration>,

    /// Source tables in discovery order
    #[serde(default)]
    pub sources: Vec<SourceDeclaration>,
}

impl Declarations {
    /// Load declarations from file
    pub fn from_file(path: &Path) -> Result<Self, DeclarationsError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DeclarationsError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse declarations from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, DeclarationsError> {
        serde_json::from_str(json).map_err(|e| DeclarationsError::ParseError(e.to_string()))
    }

    /// Total number of declared resources
    pub fn len(&self) -> usize {
        self.nodes.len() + self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.sources.is_empty()
    }
}

/// A declared model, seed, snapshot, analysis or test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDeclaration {
    pub resource_type: ResourceType,

    pub package_name: String,

    pub name: String,

    /// Path relative to the resource-type root (e.g. `sub/inner.sql`)
    pub path: String,

    /// Path relative to the project root; defaults to `path`
    #[serde(default)]
    pub original_file_path: Option<String>,

    /// Explicit fqn; derived from package, path and name when absent
    #[serde(default)]
    pub fqn: Option<Vec<String>>,

    /// Declared alias (config `alias` takes precedence)
    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Inline config (highest priority layer)
    #[serde(default)]
    pub config: ConfigMap,

    /// Inline keys that replace inherited values wholesale
    #[serde(default)]
    pub replace_config: Vec<String>,

    /// Dependencies already resolved to unique_ids
    #[serde(default)]
    pub depends_on: DependsOn,

    /// `ref` calls: `[name]` or `[package, name]`
    #[serde(default)]
    pub refs: Vec<Vec<String>>,

    /// `source` calls: `[source_name, table_name]`
    #[serde(default)]
    pub sources: Vec<Vec<String>>,
}

impl NodeDeclaration {
    /// unique_id: `resource_type.package.name`
    pub fn unique_id(&self) -> String {
        format!("{}.{}.{}", self.resource_type, self.package_name, self.name)
    }

    pub fn original_file_path(&self) -> &str {
        self.original_file_path.as_deref().unwrap_or(&self.path)
    }

    /// Declared fqn, or `[package, <dirs of path>..., name]`
    ///
    /// Snapshots also carry their file stem, since one snapshot file can
    /// declare several snapshots.
    pub fn fqn(&self) -> Vec<String> {
        if let Some(fqn) = &self.fqn {
            return fqn.clone();
        }

        let mut fqn = vec![self.package_name.clone()];
        let parts: Vec<&str> = self.path.split(['/', '\\']).filter(|p| !p.is_empty()).collect();

        if let Some((file, dirs)) = parts.split_last() {
            fqn.extend(dirs.iter().map(|d| d.to_string()));

            if self.resource_type == ResourceType::Snapshot {
                let stem = Path::new(file)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(*file);
                fqn.push(stem.to_string());
            }
        }

        fqn.push(self.name.clone());
        fqn
    }
}

/// A declared source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDeclaration {
    pub package_name: String,

    /// Source group name (e.g. `raw`)
    pub source_name: String,

    /// Table name (e.g. `users`)
    pub name: String,

    /// Path of the file declaring the source
    pub path: String,

    #[serde(default)]
    pub original_file_path: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub config: ConfigMap,
}

impl SourceDeclaration {
    /// unique_id: `source.package.source_name.table`
    pub fn unique_id(&self) -> String {
        format!("source.{}.{}.{}", self.package_name, self.source_name, self.name)
    }

    pub fn original_file_path(&self) -> &str {
        self.original_file_path.as_deref().unwrap_or(&self.path)
    }

    pub fn fqn(&self) -> Vec<String> {
        vec![
            self.package_name.clone(),
            self.source_name.clone(),
            self.name.clone(),
        ]
    }
}

/// Declarations loading errors
#[derive(Debug, thiserror::Error)]
pub enum DeclarationsError {
    #[error("Failed to read declarations file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse declarations JSON: {0}")]
    ParseError(String),
}

impl DeclarationsError {
    pub fn code(&self) -> dagsel_core::ErrorCode {
        dagsel_core::ErrorCode::DeclarationsError
    }
}
