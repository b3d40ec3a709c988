//! Stable error codes
//!
//! IMPORTANT: Error codes are versioned and stable.
//! NEVER rename or remove codes - drivers match on them.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Error code registry (v1)
///
/// Every fatal condition raised while building the catalog/graph or while
/// parsing a selection maps to exactly one code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Catalog construction
    /// Two declarations produced the same unique_id
    DuplicateIdentifier,

    /// A declared dependency points at a node that does not exist
    DanglingReference,

    /// A declared dependency points at a node disabled via config
    DisabledReference,

    /// A ref/source reference is structurally invalid
    InvalidReference,

    /// A known config key has an incompatible value
    ConfigTypeError,

    /// The dependency graph contains a cycle
    CyclicDependency,

    /// Lookup of an unknown unique_id
    NodeNotFound,

    // Selection
    /// Malformed selection criterion
    SelectorParseError,

    /// Unknown `--resource-type` value
    UnknownResourceType,

    /// The selection matched nothing (only raised when a driver opts in)
    EmptySelection,

    // Inputs
    /// Declarations document could not be read or parsed
    DeclarationsError,

    /// Tool settings (dagsel.toml) could not be read or parsed
    SettingsError,
}

impl ErrorCode {
    /// Get the error code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateIdentifier => "DUPLICATE_IDENTIFIER",
            Self::DanglingReference => "DANGLING_REFERENCE",
            Self::DisabledReference => "DISABLED_REFERENCE",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::ConfigTypeError => "CONFIG_TYPE_ERROR",
            Self::CyclicDependency => "CYCLIC_DEPENDENCY",
            Self::NodeNotFound => "NODE_NOT_FOUND",
            Self::SelectorParseError => "SELECTOR_PARSE_ERROR",
            Self::UnknownResourceType => "UNKNOWN_RESOURCE_TYPE",
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::DeclarationsError => "DECLARATIONS_ERROR",
            Self::SettingsError => "SETTINGS_ERROR",
        }
    }

    /// Whether the condition aborts the whole invocation
    ///
    /// Selection-scoped errors leave the catalog and graph reusable.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentifier
                | Self::DanglingReference
                | Self::DisabledReference
                | Self::InvalidReference
                | Self::ConfigTypeError
                | Self::CyclicDependency
                | Self::DeclarationsError
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_stability() {
        // Ensure codes are stable strings
        assert_eq!(ErrorCode::DuplicateIdentifier.as_str(), "DUPLICATE_IDENTIFIER");
        assert_eq!(ErrorCode::SelectorParseError.as_str(), "SELECTOR_PARSE_ERROR");
        assert_eq!(ErrorCode::CyclicDependency.to_string(), "CYCLIC_DEPENDENCY");
    }

    #[test]
    fn serde_uses_stable_strings() {
        let json = serde_json::to_string(&ErrorCode::DanglingReference).unwrap();
        assert_eq!(json, "\"DANGLING_REFERENCE\"");
    }

    #[test]
    fn selection_errors_are_not_construction_errors() {
        assert!(ErrorCode::DanglingReference.is_construction_error());
        assert!(!ErrorCode::SelectorParseError.is_construction_error());
        assert!(!ErrorCode::EmptySelection.is_construction_error());
    }
}
