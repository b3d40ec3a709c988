//! Base predicates evaluated against single catalog nodes

use dagsel_core::{Node, SourceTable};
use glob::Pattern;
use serde_json::Value;
use std::collections::BTreeSet;

/// Exact identity: node name (buildable nodes only) or unique_id
pub fn identity_matches(node: &Node, token: &str) -> bool {
    node.unique_id() == token || (!node.is_source() && node.name() == token)
}

/// fqn match for a `.`/`/` separated pattern
///
/// A single-segment pattern matches the last fqn segment. Otherwise the
/// pattern is taken as package-qualified when its first segment names a
/// known package, and is tried under every package otherwise.
pub fn fqn_matches(fqn: &[String], pattern: &[&str], packages: &BTreeSet<String>) -> bool {
    let Some(first) = pattern.first() else {
        return false;
    };

    if pattern.len() == 1 && fqn.last().is_some_and(|last| segment_matches(first, last)) {
        return true;
    }

    if packages.contains(*first) {
        return fqn_prefix_matches(fqn, pattern);
    }

    packages.iter().any(|package| {
        let mut qualified = Vec::with_capacity(pattern.len() + 1);
        qualified.push(package.as_str());
        qualified.extend_from_slice(pattern);
        fqn_prefix_matches(fqn, &qualified)
    })
}

/// Segment-wise prefix comparison; a bare `*` matches everything below it
fn fqn_prefix_matches(fqn: &[String], pattern: &[&str]) -> bool {
    if pattern.len() > fqn.len() {
        return false;
    }

    for (part, actual) in pattern.iter().zip(fqn) {
        if *part == "*" {
            return true;
        }

        if !segment_matches(part, actual) {
            return false;
        }
    }

    true
}

/// Literal comparison, or shell-style glob when the segment has wildcards
fn segment_matches(part: &str, actual: &str) -> bool {
    if part.contains(['*', '?', '[']) {
        Pattern::new(part).is_ok_and(|p| p.matches(actual))
    } else {
        part == actual
    }
}

/// `tag:` predicate
pub fn tag_matches(node: &Node, tag: &str) -> bool {
    node.tags().iter().any(|t| t == tag)
}

/// `source:` predicate over `[[package.]source.]table`
pub fn source_matches(source: &SourceTable, value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    let base = &source.base;

    let (package, source_name, table) = match parts.as_slice() {
        [source_name] => (None, *source_name, None),
        [source_name, table] => (None, *source_name, Some(*table)),
        [package, source_name, table] => (Some(*package), *source_name, Some(*table)),
        _ => return false,
    };

    package.map_or(true, |p| segment_matches(p, &base.package_name))
        && segment_matches(source_name, &source.source_name)
        && table.map_or(true, |t| segment_matches(t, &base.name))
}

/// `config.<key>:` predicate on an already looked-up value
///
/// Strings compare verbatim, booleans case-insensitively, numbers by their
/// rendered form, and lists when any element matches.
pub fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Bool(b) => expected.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            n.to_string() == expected
                || expected
                    .parse::<f64>()
                    .ok()
                    .zip(n.as_f64())
                    .is_some_and(|(e, v)| e == v)
        }
        Value::Array(items) => items.iter().any(|item| value_matches(item, expected)),
        Value::Null | Value::Object(_) => false,
    }
}
