//! dagsel Core
//!
//! Resource data model, layered config resolution and stable error codes.
//! Never rename error codes - they are part of the public API.

pub mod diagnostic;
pub mod resource;
pub mod config;
pub mod node;
pub mod settings;

pub use diagnostic::ErrorCode;
pub use resource::{ResourceType, UnknownResourceType};
pub use config::{
    ConfigError, ConfigLayer, ConfigMap, ConfigResolver, Hook, NodeConfig, PathScope, ProjectConfig,
    SeedConfig, Severity, SnapshotConfig, SourceConfig, TestConfig, TypeSettings,
};
pub use node::{DependsOn, Node, NodeBase, NodeId, ParsedNode, SourceTable};
pub use settings::{IndirectSelection, ListSettings, OutputShape, SelectionSettings, Settings, SettingsError};
