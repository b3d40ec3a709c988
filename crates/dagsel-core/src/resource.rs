//! Resource kinds

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Model,
    Seed,
    Snapshot,
    Analysis,
    Test,
    Source,
    /// Only ever a dependency target, never a catalog node
    Macro,
}

impl ResourceType {
    /// Every kind that can live in the catalog, in listing order
    pub const SELECTABLE: [ResourceType; 6] = [
        Self::Model,
        Self::Seed,
        Self::Snapshot,
        Self::Analysis,
        Self::Test,
        Self::Source,
    ];

    /// Kinds listed when no resource type is requested (everything but analyses)
    pub const DEFAULT_LISTED: [ResourceType; 5] = [
        Self::Model,
        Self::Seed,
        Self::Snapshot,
        Self::Test,
        Self::Source,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Seed => "seed",
            Self::Snapshot => "snapshot",
            Self::Analysis => "analysis",
            Self::Test => "test",
            Self::Source => "source",
            Self::Macro => "macro",
        }
    }

    /// Built-in `materialized` default; `None` for kinds without materialization
    pub fn default_materialization(&self) -> Option<&'static str> {
        match self {
            Self::Model | Self::Analysis => Some("view"),
            Self::Seed => Some("seed"),
            Self::Snapshot => Some("snapshot"),
            Self::Test => Some("test"),
            Self::Source | Self::Macro => None,
        }
    }

    /// Kinds a `ref()` may point at
    pub fn is_refable(&self) -> bool {
        matches!(self, Self::Model | Self::Seed | Self::Snapshot)
    }

    /// Name of the project settings block for this kind (`models`, `seeds`, ...)
    pub fn settings_block(&self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Seed => "seeds",
            Self::Snapshot => "snapshots",
            Self::Analysis => "analyses",
            Self::Test => "tests",
            Self::Source => "sources",
            Self::Macro => "macros",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown resource type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource type '{0}'")]
pub struct UnknownResourceType(pub String);

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "seed" => Ok(Self::Seed),
            "snapshot" => Ok(Self::Snapshot),
            "analysis" => Ok(Self::Analysis),
            "test" => Ok(Self::Test),
            "source" => Ok(Self::Source),
            "macro" => Ok(Self::Macro),
            other => Err(UnknownResourceType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listing_excludes_analysis() {
        assert!(!ResourceType::DEFAULT_LISTED.contains(&ResourceType::Analysis));
        assert!(ResourceType::SELECTABLE.contains(&ResourceType::Analysis));
        assert!(!ResourceType::SELECTABLE.contains(&ResourceType::Macro));
    }

    #[test]
    fn materialization_defaults() {
        assert_eq!(ResourceType::Model.default_materialization(), Some("view"));
        assert_eq!(ResourceType::Analysis.default_materialization(), Some("view"));
        assert_eq!(ResourceType::Snapshot.default_materialization(), Some("snapshot"));
        assert_eq!(ResourceType::Seed.default_materialization(), Some("seed"));
        assert_eq!(ResourceType::Test.default_materialization(), Some("test"));
        assert_eq!(ResourceType::Source.default_materialization(), None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Model".parse::<ResourceType>(), Ok(ResourceType::Model));
        assert_eq!(" seed ".parse::<ResourceType>(), Ok(ResourceType::Seed));
        assert_eq!(
            "exposure".parse::<ResourceType>(),
            Err(UnknownResourceType("exposure".to_string()))
        );
    }
}
