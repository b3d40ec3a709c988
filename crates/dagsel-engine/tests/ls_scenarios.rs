//! Listing scenarios against the `ls-project` fixture

use dagsel_core::{OutputShape, Settings};
use dagsel_dbt::{Catalog, Declarations, DependencyGraph};
use dagsel_engine::{
    project, NodeSelector, ResourceTypeFilter, SelectionRequest, SelectionSpec, SelectorParseError,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;

const DECLARATIONS: &str = include_str!("../../../fixtures/ls-project/declarations.json");

struct Project {
    catalog: Catalog,
    graph: DependencyGraph,
}

impl Project {
    fn load() -> Self {
        let declarations = Declarations::from_str(DECLARATIONS).unwrap();
        let catalog = Catalog::build(&declarations).unwrap();
        let graph = DependencyGraph::from_catalog(&catalog).unwrap();
        Self { catalog, graph }
    }

    /// Run a listing the way the CLI does
    fn ls(&self, select: &[&str], exclude: &[&str], types: &[&str], shape: OutputShape) -> Vec<String> {
        let mut request =
            SelectionRequest::new().with_resource_types(ResourceTypeFilter::parse(types).unwrap());
        if !select.is_empty() {
            request = request.with_select(SelectionSpec::parse(select).unwrap());
        }
        if !exclude.is_empty() {
            request = request.with_exclude(SelectionSpec::parse(exclude).unwrap());
        }

        let selection = NodeSelector::new(&self.catalog, &self.graph).select(&request);
        project(&self.catalog, &selection, shape)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn selectors(&self, select: &[&str], exclude: &[&str], types: &[&str]) -> BTreeSet<String> {
        self.ls(select, exclude, types, OutputShape::Selector).into_iter().collect()
    }

    fn json(&self, select: &[&str], types: &[&str]) -> Vec<Value> {
        self.ls(select, &[], types, OutputShape::Json)
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn base_config(materialized: &str) -> Value {
    json!({
        "enabled": true,
        "materialized": materialized,
        "post-hook": [],
        "tags": [],
        "pre-hook": [],
        "quoting": {},
        "vars": {},
        "column_types": {},
        "persist_docs": {},
        "full_refresh": null,
        "database": null,
        "schema": null,
        "alias": null,
    })
}

fn with(mut config: Value, extra: Value) -> Value {
    if let (Value::Object(config), Value::Object(extra)) = (&mut config, extra) {
        config.extend(extra);
    }
    config
}

#[test]
fn snapshot_listing() {
    let project = Project::load();

    assert_eq!(project.ls(&[], &[], &["snapshot"], OutputShape::Name), vec!["my_snapshot"]);
    assert_eq!(
        project.ls(&[], &[], &["snapshot"], OutputShape::Selector),
        vec!["test.snapshot.my_snapshot"]
    );
    assert_eq!(
        project.ls(&[], &[], &["snapshot"], OutputShape::Path),
        vec!["snapshots/snapshot.sql"]
    );
    assert_eq!(
        project.json(&[], &["snapshot"]),
        vec![json!({
            "name": "my_snapshot",
            "package_name": "test",
            "depends_on": {"nodes": [], "macros": []},
            "tags": [],
            "config": with(base_config("snapshot"), json!({
                "target_database": "dbt",
                "target_schema": "dbt_ls_047",
                "unique_key": "id",
                "strategy": "timestamp",
                "updated_at": "updated_at",
                "check_cols": null,
            })),
            "alias": "my_snapshot",
            "resource_type": "snapshot",
        })]
    );
}

#[test]
fn analysis_listing() {
    let project = Project::load();

    assert_eq!(
        project.ls(&[], &[], &["analysis"], OutputShape::Selector),
        vec!["test.analysis.a"]
    );
    assert_eq!(project.ls(&[], &[], &["analysis"], OutputShape::Path), vec!["analyses/a.sql"]);
    assert_eq!(
        project.json(&[], &["analysis"]),
        vec![json!({
            "name": "a",
            "package_name": "test",
            "depends_on": {"nodes": [], "macros": []},
            "tags": [],
            "config": base_config("view"),
            "alias": "a",
            "resource_type": "analysis",
        })]
    );
}

#[test]
fn model_listing() {
    let project = Project::load();

    assert_eq!(
        project.ls(&[], &[], &["model"], OutputShape::Name),
        vec!["ephemeral", "incremental", "inner", "outer"]
    );
    assert_eq!(
        project.ls(&[], &[], &["model"], OutputShape::Selector),
        vec!["test.ephemeral", "test.incremental", "test.sub.inner", "test.outer"]
    );
    assert_eq!(
        project.ls(&[], &[], &["model"], OutputShape::Path),
        vec![
            "models/ephemeral.sql",
            "models/incremental.sql",
            "models/sub/inner.sql",
            "models/outer.sql",
        ]
    );

    let records = project.json(&[], &["model"]);
    assert_eq!(records.len(), 4);
    assert_eq!(
        records[1],
        json!({
            "name": "incremental",
            "package_name": "test",
            "depends_on": {"nodes": ["seed.test.seed"], "macros": ["macro.dbt.is_incremental"]},
            "tags": [],
            "config": with(base_config("incremental"), json!({
                "incremental_strategy": "delete+insert",
            })),
            "alias": "incremental",
            "resource_type": "model",
        })
    );
    assert_eq!(records[0]["config"], base_config("ephemeral"));
    assert_eq!(records[2]["depends_on"], json!({"nodes": ["model.test.outer"], "macros": []}));
    assert_eq!(records[3]["depends_on"], json!({"nodes": ["model.test.ephemeral"], "macros": []}));
}

#[test]
fn source_listing() {
    let project = Project::load();
    let select = ["source:*"];

    assert_eq!(project.ls(&select, &[], &["source"], OutputShape::Name), vec!["my_source.my_table"]);
    assert_eq!(
        project.ls(&select, &[], &["source"], OutputShape::Selector),
        vec!["source:test.my_source.my_table"]
    );
    assert_eq!(project.ls(&select, &[], &["source"], OutputShape::Path), vec!["models/schema.yml"]);
    assert_eq!(
        project.json(&select, &["source"]),
        vec![json!({
            "config": {"enabled": true},
            "package_name": "test",
            "name": "my_table",
            "source_name": "my_source",
            "resource_type": "source",
            "tags": [],
        })]
    );
}

#[test]
fn seed_listing() {
    let project = Project::load();

    assert_eq!(project.ls(&[], &[], &["seed"], OutputShape::Selector), vec!["test.seed"]);
    assert_eq!(project.ls(&[], &[], &["seed"], OutputShape::Path), vec!["data/seed.csv"]);
    assert_eq!(
        project.json(&[], &["seed"])[0]["config"],
        with(base_config("seed"), json!({"quote_columns": false}))
    );
}

#[test]
fn test_listing() {
    let project = Project::load();

    assert_eq!(
        project.ls(&[], &[], &["test"], OutputShape::Selector),
        vec![
            "test.schema_test.not_null_outer_id",
            "test.data_test.t",
            "test.schema_test.unique_outer_id",
        ]
    );
    assert_eq!(
        project.ls(&[], &[], &["test"], OutputShape::Path),
        vec!["models/schema.yml", "tests/t.sql", "models/schema.yml"]
    );

    let records = project.json(&[], &["test"]);
    assert_eq!(
        records[0],
        json!({
            "name": "not_null_outer_id",
            "package_name": "test",
            "depends_on": {"nodes": ["model.test.outer"], "macros": ["macro.dbt.test_not_null"]},
            "tags": ["schema"],
            "config": with(base_config("test"), json!({"severity": "ERROR"})),
            "alias": "not_null_outer_id",
            "resource_type": "test",
        })
    );
    assert_eq!(records[1]["tags"], json!(["data"]));
}

#[test]
fn all_and_default_resource_types() {
    let project = Project::load();

    let expected_default = set(&[
        "test.ephemeral",
        "test.incremental",
        "test.snapshot.my_snapshot",
        "test.sub.inner",
        "test.outer",
        "test.seed",
        "source:test.my_source.my_table",
        "test.schema_test.not_null_outer_id",
        "test.schema_test.unique_outer_id",
        "test.data_test.t",
    ]);
    let mut expected_all = expected_default.clone();
    expected_all.insert("test.analysis.a".to_string());

    assert_eq!(project.selectors(&["*", "source:*"], &[], &["all"]), expected_all);
    assert_eq!(project.selectors(&["*", "source:*"], &[], &[]), expected_default);
    assert_eq!(project.selectors(&["*", "source:*"], &[], &["default"]), expected_default);
    assert_eq!(project.selectors(&[], &[], &[]), expected_default);
}

#[test]
fn graph_and_indirect_selection() {
    let project = Project::load();
    let schema_tests = set(&[
        "test.schema_test.not_null_outer_id",
        "test.schema_test.unique_outer_id",
    ]);

    assert_eq!(project.selectors(&["outer"], &[], &["test"]), schema_tests);
    assert!(project.selectors(&["inner"], &[], &["test"]).is_empty());
    assert_eq!(project.selectors(&["+inner"], &[], &["test"]), schema_tests);
    assert_eq!(
        project.selectors(&["outer+"], &[], &["model"]),
        set(&["test.outer", "test.sub.inner"])
    );
    assert_eq!(
        project.selectors(&[], &["inner"], &["model"]),
        set(&["test.ephemeral", "test.outer", "test.incremental"])
    );
}

#[test]
fn config_selection() {
    let project = Project::load();

    assert_eq!(
        project.selectors(&["config.incremental_strategy:delete+insert"], &[], &[]),
        set(&["test.incremental"])
    );
    assert!(project
        .selectors(&["config.incremental_strategy:insert_overwrite"], &[], &[])
        .is_empty());
    assert_eq!(
        project.selectors(&["config.quote_columns:False"], &[], &[]),
        set(&["test.seed"])
    );
}

#[test]
fn selector_output_round_trips() {
    let project = Project::load();

    for token in project.ls(&[], &[], &["all"], OutputShape::Selector) {
        let names = project.ls(&[token.as_str()], &[], &["all"], OutputShape::Selector);
        assert!(names.contains(&token), "{} did not select itself", token);

        let direct = project.ls(&[token.as_str()], &[], &["all"], OutputShape::Name);
        assert!(!direct.is_empty(), "{}", token);
    }
}

#[test]
fn path_and_tag_methods() {
    let project = Project::load();

    assert_eq!(
        project.selectors(&["path:models/sub"], &[], &[]),
        set(&["test.sub.inner"])
    );
    assert_eq!(
        project.selectors(&["path:models/*.sql"], &[], &["model"]),
        set(&["test.ephemeral", "test.incremental", "test.sub.inner", "test.outer"])
    );
    assert_eq!(
        project.selectors(&["tag:data"], &[], &[]),
        set(&["test.data_test.t"])
    );
    assert_eq!(
        project.selectors(&["fqn:test.schema_test.*"], &[], &[]),
        set(&[
            "test.schema_test.not_null_outer_id",
            "test.schema_test.unique_outer_id",
        ])
    );
}

#[test]
fn project_root_path_selects_every_node() {
    let project = Project::load();
    let everything = project.selectors(&[], &[], &["all"]);

    assert_eq!(project.selectors(&["path:."], &[], &["all"]), everything);
    assert_eq!(project.selectors(&["path:./"], &[], &["all"]), everything);
}

#[test]
fn parse_errors_leave_catalog_reusable() {
    let project = Project::load();

    assert!(matches!(
        SelectionSpec::parse(["outer+x"]),
        Err(SelectorParseError::InvalidDepth { .. })
    ));
    assert!(ResourceTypeFilter::parse(["widget"]).is_err());

    assert_eq!(project.selectors(&["outer"], &[], &["model"]), set(&["test.outer"]));
}

#[test]
fn settings_resolve_declarations_next_to_config() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/ls-project/dagsel.toml");
    let settings = Settings::from_file(&path).unwrap();

    assert_eq!(settings.list.output, OutputShape::Selector);

    let declarations = Declarations::from_file(&settings.declarations_path()).unwrap();
    assert_eq!(declarations.len(), 11);
}
