//! Tool settings (dagsel.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::diagnostic::ErrorCode;

/// Listing output shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// Unqualified node name
    Name,

    /// Qualified name usable as a `--select` token
    #[default]
    Selector,

    /// Path relative to the project root
    Path,

    /// Full structured record, one JSON object per node
    Json,
}

impl FromStr for OutputShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "selector" => Ok(Self::Selector),
            "path" => Ok(Self::Path),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown output '{}' (expected name, selector, path or json)",
                other
            )),
        }
    }
}

/// How tests attached to selected nodes are pulled into a selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndirectSelection {
    /// Add a test when every node it tests is selected
    #[default]
    Cautious,

    /// Add a test when any node it tests is selected
    Eager,

    /// Never add tests indirectly
    Empty,
}

/// `[list]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSettings {
    /// Default output shape
    #[serde(default)]
    pub output: OutputShape,

    /// Exit non-zero when a selection matches nothing
    #[serde(default)]
    pub fail_on_empty_selection: bool,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            output: OutputShape::default(),
            fail_on_empty_selection: false,
        }
    }
}

/// `[selection]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    #[serde(default)]
    pub indirect_selection: IndirectSelection,

    /// Evaluate independent criteria on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            indirect_selection: IndirectSelection::default(),
            parallel: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_declarations() -> PathBuf {
    PathBuf::from("target/declarations.json")
}

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Declarations document, relative to the project root
    #[serde(default = "default_declarations")]
    pub declarations: PathBuf,

    #[serde(default)]
    pub list: ListSettings,

    #[serde(default)]
    pub selection: SelectionSettings,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            declarations: default_declarations(),
            list: ListSettings::default(),
            selection: SelectionSettings::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Settings {
    /// Load settings from TOML file
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(path.display().to_string(), e.to_string()))?;

        let mut settings = Self::from_toml(&contents)?;

        // Set project root to parent of settings file
        if let Some(parent) = path.parent() {
            settings.project_root = parent.to_path_buf();
        }

        Ok(settings)
    }

    /// Load settings from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings =
            toml::from_str(toml).map_err(|e| SettingsError::ParseError(e.to_string()))?;
        settings.project_root = std::env::current_dir().unwrap_or_default();
        Ok(settings)
    }

    /// Save settings to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let toml =
            toml::to_string_pretty(self).map_err(|e| SettingsError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| SettingsError::IoError(path.display().to_string(), e.to_string()))?;

        Ok(())
    }

    /// Declarations path resolved against the project root
    pub fn declarations_path(&self) -> PathBuf {
        if self.declarations.is_absolute() {
            self.declarations.clone()
        } else {
            self.project_root.join(&self.declarations)
        }
    }
}

/// Settings error types
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    #[error("Failed to serialize settings: {0}")]
    SerializeError(String),
}

impl SettingsError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::SettingsError
    }
}
