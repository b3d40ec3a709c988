//! Layered node configuration
//!
//! A node's final configuration is materialized once, at catalog build time, by
//! merging an ordered list of layers from lowest to highest priority:
//!
//! 1. built-in defaults for the resource type
//! 2. the project-wide block for the resource type (`models`, `seeds`, ...)
//! 3. path scopes whose fqn prefix matches the node, least specific first
//! 4. configuration declared inline with the resource
//!
//! Nested objects merge recursively, list keys concatenate and everything else
//! is overwritten by the later layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::diagnostic::ErrorCode;
use crate::resource::ResourceType;

/// Raw, unresolved configuration fragment
pub type ConfigMap = Map<String, Value>;

/// Keys whose values concatenate across layers instead of being replaced
pub const LIST_KEYS: [&str; 3] = ["tags", "pre-hook", "post-hook"];

/// Map accepted key spellings onto the canonical one
pub fn canonical_key(key: &str) -> &str {
    match key {
        "pre_hook" => "pre-hook",
        "post_hook" => "post-hook",
        other => other,
    }
}

/// One layer of the scope chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    /// Config values declared at this scope
    pub values: ConfigMap,

    /// Keys this layer redeclares wholesale (no list concatenation, no nested merge)
    pub replace: BTreeSet<String>,
}

impl ConfigLayer {
    pub fn new(values: ConfigMap) -> Self {
        Self {
            values,
            replace: BTreeSet::new(),
        }
    }

    /// Mark keys as redeclared wholesale by this layer
    pub fn with_replace<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.replace
            .extend(keys.into_iter().map(|k| canonical_key(k.as_ref()).to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<ConfigMap> for ConfigLayer {
    fn from(values: ConfigMap) -> Self {
        Self::new(values)
    }
}

/// Merge `layer` on top of `target`
pub fn merge_layer(target: &mut ConfigMap, layer: &ConfigLayer) {
    for (raw_key, value) in &layer.values {
        let key = canonical_key(raw_key);

        if layer.replace.contains(key) {
            target.insert(key.to_string(), value.clone());
            continue;
        }

        if LIST_KEYS.contains(&key) {
            let merged = concat_lists(target.remove(key), value);
            target.insert(key.to_string(), merged);
            continue;
        }

        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_objects(existing, incoming);
            }
            _ => {
                target.insert(key.to_string(), value.clone());
            }
        }
    }
}

fn merge_objects(target: &mut ConfigMap, incoming: &ConfigMap) {
    for (key, value) in incoming {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_objects(existing, nested);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn concat_lists(existing: Option<Value>, incoming: &Value) -> Value {
    let mut items = existing.map(into_items).unwrap_or_default();
    items.extend(into_items(incoming.clone()));
    Value::Array(items)
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}

/// Config declared for an fqn prefix, e.g. `test.staging`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathScope {
    /// `.` or `/` separated fqn prefix
    pub path: String,

    #[serde(default)]
    pub config: ConfigMap,

    #[serde(default)]
    pub replace: Vec<String>,
}

impl PathScope {
    pub fn segments(&self) -> Vec<&str> {
        self.path
            .split(['.', '/'])
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether this scope's path is a prefix of `fqn`
    pub fn matches(&self, fqn: &[String]) -> bool {
        let segments = self.segments();
        !segments.is_empty()
            && segments.len() <= fqn.len()
            && segments.iter().zip(fqn).all(|(s, f)| *s == f.as_str())
    }

    fn layer(&self) -> ConfigLayer {
        ConfigLayer::new(self.config.clone()).with_replace(&self.replace)
    }
}

/// Project settings for one resource type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSettings {
    /// Applies to every resource of the type
    #[serde(default)]
    pub config: ConfigMap,

    #[serde(default)]
    pub replace: Vec<String>,

    /// Path-scoped overrides, in declaration order
    #[serde(default)]
    pub scopes: Vec<PathScope>,
}

/// Project-level configuration blocks, keyed by resource type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root package name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub models: TypeSettings,

    #[serde(default)]
    pub seeds: TypeSettings,

    #[serde(default)]
    pub snapshots: TypeSettings,

    #[serde(default)]
    pub analyses: TypeSettings,

    #[serde(default)]
    pub tests: TypeSettings,

    #[serde(default)]
    pub sources: TypeSettings,
}

impl ProjectConfig {
    pub fn settings_for(&self, resource_type: ResourceType) -> Option<&TypeSettings> {
        match resource_type {
            ResourceType::Model => Some(&self.models),
            ResourceType::Seed => Some(&self.seeds),
            ResourceType::Snapshot => Some(&self.snapshots),
            ResourceType::Analysis => Some(&self.analyses),
            ResourceType::Test => Some(&self.tests),
            ResourceType::Source => Some(&self.sources),
            ResourceType::Macro => None,
        }
    }

    /// Project layers (type block, then matching path scopes) for a node
    ///
    /// Scopes are ordered from least to most specific; a stable sort keeps
    /// declaration order among scopes of equal length, so the later one wins.
    pub fn scope_chain(&self, resource_type: ResourceType, fqn: &[String]) -> Vec<ConfigLayer> {
        let Some(settings) = self.settings_for(resource_type) else {
            return Vec::new();
        };

        let mut layers = vec![ConfigLayer::new(settings.config.clone()).with_replace(&settings.replace)];

        let mut scopes: Vec<&PathScope> = settings.scopes.iter().filter(|s| s.matches(fqn)).collect();
        scopes.sort_by_key(|s| s.segments().len());
        layers.extend(scopes.into_iter().map(PathScope::layer));

        layers
    }
}

/// Test failure severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Error,
    Warn,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Self::Error),
            "WARN" => Ok(Self::Warn),
            _ => Err(format!("expected ERROR or WARN, found '{}'", s)),
        }
    }
}

/// A pre- or post-hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub sql: String,

    #[serde(default = "default_true")]
    pub transaction: bool,
}

fn default_true() -> bool {
    true
}

/// Snapshot-only keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotConfig {
    pub target_database: Option<String>,
    pub target_schema: Option<String>,
    pub unique_key: Option<String>,
    pub strategy: Option<String>,
    pub updated_at: Option<String>,
    pub check_cols: Option<Value>,
}

/// Seed-only keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedConfig {
    pub quote_columns: Option<bool>,
}

/// Test-only keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestConfig {
    pub severity: Severity,
}

/// Fully resolved configuration of a buildable node
///
/// Serializes with every optional key present (`null` or empty collection) so
/// downstream consumers can rely on a stable shape per resource type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeConfig {
    pub enabled: bool,

    pub materialized: String,

    #[serde(rename = "pre-hook")]
    pub pre_hook: Vec<Hook>,

    #[serde(rename = "post-hook")]
    pub post_hook: Vec<Hook>,

    pub tags: Vec<String>,

    pub quoting: ConfigMap,

    pub vars: ConfigMap,

    pub column_types: ConfigMap,

    pub persist_docs: ConfigMap,

    pub full_refresh: Option<bool>,

    pub database: Option<String>,

    pub schema: Option<String>,

    pub alias: Option<String>,

    #[serde(flatten)]
    pub snapshot: Option<SnapshotConfig>,

    #[serde(flatten)]
    pub seed: Option<SeedConfig>,

    #[serde(flatten)]
    pub test: Option<TestConfig>,

    /// Keys the resolver does not know, stored verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NodeConfig {
    pub fn is_ephemeral(&self) -> bool {
        self.materialized == "ephemeral"
    }

    /// Read a (possibly nested) key as JSON, e.g. `["persist_docs", "relation"]`
    pub fn lookup(&self, path: &[&str]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.field(first)?;

        for segment in rest {
            value = match value {
                Value::Object(mut map) => map.remove(*segment)?,
                _ => return None,
            };
        }

        Some(value)
    }

    fn field(&self, key: &str) -> Option<Value> {
        let opt_str = |v: &Option<String>| v.clone().map(Value::String);

        match canonical_key(key) {
            "enabled" => Some(Value::Bool(self.enabled)),
            "materialized" => Some(Value::String(self.materialized.clone())),
            "pre-hook" => serde_json::to_value(&self.pre_hook).ok(),
            "post-hook" => serde_json::to_value(&self.post_hook).ok(),
            "tags" => serde_json::to_value(&self.tags).ok(),
            "quoting" => Some(Value::Object(self.quoting.clone())),
            "vars" => Some(Value::Object(self.vars.clone())),
            "column_types" => Some(Value::Object(self.column_types.clone())),
            "persist_docs" => Some(Value::Object(self.persist_docs.clone())),
            "full_refresh" => self.full_refresh.map(Value::Bool),
            "database" => opt_str(&self.database),
            "schema" => opt_str(&self.schema),
            "alias" => opt_str(&self.alias),
            key @ ("target_database" | "target_schema" | "unique_key" | "strategy" | "updated_at"
            | "check_cols") => match &self.snapshot {
                Some(snapshot) => match key {
                    "target_database" => opt_str(&snapshot.target_database),
                    "target_schema" => opt_str(&snapshot.target_schema),
                    "unique_key" => opt_str(&snapshot.unique_key),
                    "strategy" => opt_str(&snapshot.strategy),
                    "updated_at" => opt_str(&snapshot.updated_at),
                    _ => snapshot.check_cols.clone(),
                },
                None => self.extra.get(key).cloned(),
            },
            "quote_columns" => self.seed.as_ref()?.quote_columns.map(Value::Bool),
            "severity" => self
                .test
                .as_ref()
                .map(|t| Value::String(t.severity.as_str().to_string())),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// Resolved configuration of a source table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceConfig {
    pub enabled: bool,

    /// Tags inherited through config scopes; merged into the node's tags
    #[serde(skip)]
    pub tags: Vec<String>,
}

impl SourceConfig {
    pub fn lookup(&self, path: &[&str]) -> Option<Value> {
        match path {
            ["enabled"] => Some(Value::Bool(self.enabled)),
            ["tags"] => serde_json::to_value(&self.tags).ok(),
            _ => None,
        }
    }
}

/// Config resolution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Config key '{key}' on {owner} must be {expected}, found {found}")]
    TypeMismatch {
        owner: String,
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Config key '{key}' on {owner} is invalid: {reason}")]
    InvalidValue {
        owner: String,
        key: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ConfigTypeError
    }
}

/// Stateless resolver turning a scope chain into a typed config
pub struct ConfigResolver;

impl ConfigResolver {
    /// Built-in defaults layer for a resource type
    pub fn defaults(resource_type: ResourceType) -> ConfigLayer {
        let mut values = ConfigMap::new();
        values.insert("enabled".to_string(), Value::Bool(true));

        if let Some(materialized) = resource_type.default_materialization() {
            values.insert("materialized".to_string(), Value::String(materialized.to_string()));
        }

        if resource_type == ResourceType::Test {
            values.insert(
                "severity".to_string(),
                Value::String(Severity::Error.as_str().to_string()),
            );
        }

        ConfigLayer::new(values)
    }

    /// Merge defaults and `chain` into one raw map
    pub fn merge(resource_type: ResourceType, chain: &[ConfigLayer]) -> ConfigMap {
        let mut merged = ConfigMap::new();
        merge_layer(&mut merged, &Self::defaults(resource_type));

        for layer in chain {
            merge_layer(&mut merged, layer);
        }

        merged
    }

    /// Resolve the final config of a buildable node
    ///
    /// `owner` names the node in error messages.
    pub fn resolve(
        resource_type: ResourceType,
        owner: &str,
        chain: &[ConfigLayer],
    ) -> Result<NodeConfig, ConfigError> {
        let mut fields = Fields::new(owner, Self::merge(resource_type, chain));

        let enabled = fields.bool("enabled")?.unwrap_or(true);
        let materialized = match fields.string("materialized")? {
            Some(materialized) => materialized,
            None => resource_type.default_materialization().unwrap_or_default().to_string(),
        };
        let pre_hook = fields.hooks("pre-hook")?;
        let post_hook = fields.hooks("post-hook")?;
        let tags = dedup(fields.string_list("tags")?);
        let quoting = fields.object("quoting")?;
        let vars = fields.object("vars")?;
        let column_types = fields.object("column_types")?;
        let persist_docs = fields.object("persist_docs")?;
        let full_refresh = fields.bool("full_refresh")?;
        let database = fields.string("database")?;
        let schema = fields.string("schema")?;
        let alias = fields.string("alias")?;

        let snapshot = if resource_type == ResourceType::Snapshot {
            Some(SnapshotConfig {
                target_database: fields.string("target_database")?,
                target_schema: fields.string("target_schema")?,
                unique_key: fields.string("unique_key")?,
                strategy: fields.string("strategy")?,
                updated_at: fields.string("updated_at")?,
                check_cols: fields.take("check_cols"),
            })
        } else {
            None
        };

        let quote_columns = fields.bool_if(resource_type == ResourceType::Seed, "quote_columns")?;
        let seed = (resource_type == ResourceType::Seed).then_some(SeedConfig { quote_columns });

        let test = if resource_type == ResourceType::Test {
            Some(TestConfig {
                severity: fields.severity()?.unwrap_or_default(),
            })
        } else {
            fields.take("severity");
            None
        };

        Ok(NodeConfig {
            enabled,
            materialized,
            pre_hook,
            post_hook,
            tags,
            quoting,
            vars,
            column_types,
            persist_docs,
            full_refresh,
            database,
            schema,
            alias,
            snapshot,
            seed,
            test,
            extra: fields.into_rest(),
        })
    }

    /// Resolve the config of a source table (only `enabled` and `tags` survive)
    pub fn resolve_source(owner: &str, chain: &[ConfigLayer]) -> Result<SourceConfig, ConfigError> {
        let mut fields = Fields::new(owner, Self::merge(ResourceType::Source, chain));

        Ok(SourceConfig {
            enabled: fields.bool("enabled")?.unwrap_or(true),
            tags: dedup(fields.string_list("tags")?),
        })
    }
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Typed extraction over the merged map; whatever is not taken becomes `extra`
struct Fields<'a> {
    owner: &'a str,
    map: ConfigMap,
}

impl<'a> Fields<'a> {
    fn new(owner: &'a str, map: ConfigMap) -> Self {
        Self { owner, map }
    }

    /// Remove a key; explicit `null` reads as absent
    fn take(&mut self, key: &str) -> Option<Value> {
        match self.map.remove(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    fn mismatch(&self, key: &str, expected: &'static str, found: &Value) -> ConfigError {
        ConfigError::TypeMismatch {
            owner: self.owner.to_string(),
            key: key.to_string(),
            expected,
            found: json_type_name(found),
        }
    }

    fn bool(&mut self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(self.mismatch(key, "a boolean", &other)),
        }
    }

    /// Typed read when `applies`, silently dropped otherwise
    fn bool_if(&mut self, applies: bool, key: &str) -> Result<Option<bool>, ConfigError> {
        if applies {
            self.bool(key)
        } else {
            self.take(key);
            Ok(None)
        }
    }

    fn string(&mut self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.mismatch(key, "a string", &other)),
        }
    }

    fn object(&mut self, key: &str) -> Result<ConfigMap, ConfigError> {
        match self.take(key) {
            None => Ok(ConfigMap::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(self.mismatch(key, "a mapping", &other)),
        }
    }

    fn string_list(&mut self, key: &str) -> Result<Vec<String>, ConfigError> {
        let items = self.take(key).map(into_items).unwrap_or_default();

        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(self.mismatch(key, "a list of strings", &other)),
            })
            .collect()
    }

    fn hooks(&mut self, key: &str) -> Result<Vec<Hook>, ConfigError> {
        let items = self.take(key).map(into_items).unwrap_or_default();

        items
            .into_iter()
            .map(|item| match item {
                Value::String(sql) => Ok(Hook {
                    sql,
                    transaction: true,
                }),
                Value::Object(map) => serde_json::from_value::<Hook>(Value::Object(map.clone()))
                    .map_err(|_| self.mismatch(key, "a hook ({sql, transaction})", &Value::Object(map))),
                other => Err(self.mismatch(key, "a hook string or mapping", &other)),
            })
            .collect()
    }

    fn severity(&mut self) -> Result<Option<Severity>, ConfigError> {
        match self.string("severity")? {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|reason| ConfigError::InvalidValue {
                owner: self.owner.to_string(),
                key: "severity".to_string(),
                reason,
            }),
        }
    }

    fn into_rest(self) -> BTreeMap<String, Value> {
        self.map.into_iter().collect()
    }
}
