//! Selector expression grammar
//!
//! A `--select`/`--exclude` argument list is a union of criteria. Each
//! criterion is parsed by a small hand-written recursive-descent parser:
//!
//! ```text
//! criterion := parents? base children?
//! parents   := DIGITS? '+'
//! children  := '+' DIGITS?            (only at the very end)
//! base      := method ':' value | name
//! method    := 'tag' | 'source' | 'path' | 'fqn' | 'config' ('.' key)+
//! ```
//!
//! Inside a method value a `+` that is not followed only by digits belongs to
//! the value (`config.incremental_strategy:delete+insert`). Bare names never
//! contain `+`.

use dagsel_core::ErrorCode;
use glob::Pattern;
use std::str::FromStr;

/// How far a graph operator reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphDepth {
    /// Bare `+`
    Unbounded,

    /// `N+` / `+M`
    Limited(usize),
}

impl GraphDepth {
    /// Depth bound as understood by graph traversal
    pub fn max_depth(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Limited(depth) => Some(*depth),
        }
    }
}

/// `path:` argument, pre-compiled
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatcher {
    raw: String,
    glob: Option<Pattern>,
}

impl PathMatcher {
    fn parse(value: &str, criterion: &str) -> Result<Self, SelectorParseError> {
        let mut raw = value.trim_start_matches("./").trim_end_matches('/').to_string();
        if raw == "." {
            raw.clear();
        }

        let glob = if raw.contains(['*', '?', '[']) {
            let pattern = Pattern::new(&raw).map_err(|e| SelectorParseError::InvalidPattern {
                criterion: criterion.to_string(),
                reason: e.msg.to_string(),
            })?;
            Some(pattern)
        } else {
            None
        };

        Ok(Self { raw, glob })
    }

    /// Glob match, or exact file / directory-prefix match for plain paths.
    /// An empty path is the project root and matches everything.
    pub fn matches(&self, path: &str) -> bool {
        match &self.glob {
            Some(pattern) => pattern.matches(path),
            None if self.raw.is_empty() => true,
            None => {
                path == self.raw
                    || path
                        .strip_prefix(self.raw.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// What a criterion's base predicate tests
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorMethod {
    /// Bare token: exact name/unique_id first, fqn match as fallback
    Name,

    /// `fqn:` - fqn match only
    Fqn,

    /// `tag:`
    Tag,

    /// `source:` - `[[package.]source.]table` with `*` wildcards
    Source,

    /// `path:`
    Path(PathMatcher),

    /// `config.<key>[.<nested>...]:`
    Config(Vec<String>),
}

impl SelectorMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Fqn => "fqn",
            Self::Tag => "tag",
            Self::Source => "source",
            Self::Path(_) => "path",
            Self::Config(_) => "config",
        }
    }
}

/// One atomic selector token
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    raw: String,
    pub method: SelectorMethod,
    pub value: String,
    /// Ancestors to include (`N+x`)
    pub parents: Option<GraphDepth>,
    /// Descendants to include (`x+M`)
    pub children: Option<GraphDepth>,
}

impl Criterion {
    pub fn parse(raw: &str) -> Result<Self, SelectorParseError> {
        CriterionParser::new(raw).parse()
    }

    /// The criterion as written
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// fqn pattern segments of the value (`.` or `/` separated)
    pub fn segments(&self) -> Vec<&str> {
        self.value.split(['.', '/']).filter(|s| !s.is_empty()).collect()
    }
}

impl FromStr for Criterion {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

struct CriterionParser<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> CriterionParser<'a> {
    fn new(raw: &'a str) -> Self {
        Self { raw, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.raw[self.pos..]
    }

    fn parse(mut self) -> Result<Criterion, SelectorParseError> {
        if self.raw.is_empty() {
            return Err(self.empty());
        }

        let parents = self.parse_parents()?;
        let (body, children) = self.split_children()?;
        let (method, value) = self.parse_base(body)?;

        Ok(Criterion {
            raw: self.raw.to_string(),
            method,
            value,
            parents,
            children,
        })
    }

    /// `DIGITS? '+'` at the start; digits without a `+` belong to the name
    fn parse_parents(&mut self) -> Result<Option<GraphDepth>, SelectorParseError> {
        let rest = self.rest();
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();

        if rest[digits..].starts_with('+') {
            let depth = self.depth(&rest[..digits])?;
            self.pos += digits + 1;

            if self.rest().starts_with('+') {
                return Err(self.unbalanced());
            }

            Ok(Some(depth))
        } else {
            Ok(None)
        }
    }

    /// `'+' DIGITS?` at the very end
    fn split_children(&self) -> Result<(&'a str, Option<GraphDepth>), SelectorParseError> {
        let rest = self.rest();
        let digits = rest.bytes().rev().take_while(u8::is_ascii_digit).count();
        let head = &rest[..rest.len() - digits];

        let Some(body) = head.strip_suffix('+') else {
            return Ok((rest, None));
        };

        if body.ends_with('+') {
            return Err(self.unbalanced());
        }

        let depth = self.depth(&rest[rest.len() - digits..])?;
        Ok((body, Some(depth)))
    }

    fn parse_base(&self, body: &str) -> Result<(SelectorMethod, String), SelectorParseError> {
        if body.is_empty() {
            return Err(self.empty());
        }

        let Some((method, value)) = body.split_once(':') else {
            if body.contains('+') {
                return Err(SelectorParseError::InvalidDepth {
                    criterion: self.raw.to_string(),
                    depth: body.to_string(),
                });
            }
            return Ok((SelectorMethod::Name, body.to_string()));
        };

        let method = self.parse_method(method, value)?;

        if value.is_empty() {
            return Err(SelectorParseError::EmptyValue {
                criterion: self.raw.to_string(),
                method: method.name().to_string(),
            });
        }

        Ok((method, value.to_string()))
    }

    fn parse_method(&self, method: &str, value: &str) -> Result<SelectorMethod, SelectorParseError> {
        let mut parts = method.split('.');
        let head = parts.next().unwrap_or_default();
        let keys: Vec<String> = parts.map(str::to_string).collect();

        if head == "config" {
            if keys.is_empty() || keys.iter().any(String::is_empty) {
                return Err(SelectorParseError::MissingConfigKey {
                    criterion: self.raw.to_string(),
                });
            }
            return Ok(SelectorMethod::Config(keys));
        }

        if !keys.is_empty() {
            return Err(self.unknown_method(method));
        }

        match head {
            "tag" => Ok(SelectorMethod::Tag),
            "fqn" => Ok(SelectorMethod::Fqn),
            "path" => Ok(SelectorMethod::Path(PathMatcher::parse(value, self.raw)?)),
            "source" => {
                if value.split('.').count() > 3 {
                    return Err(SelectorParseError::InvalidPattern {
                        criterion: self.raw.to_string(),
                        reason: "expected [[package.]source.]table".to_string(),
                    });
                }
                Ok(SelectorMethod::Source)
            }
            _ => Err(self.unknown_method(method)),
        }
    }

    fn depth(&self, digits: &str) -> Result<GraphDepth, SelectorParseError> {
        if digits.is_empty() {
            return Ok(GraphDepth::Unbounded);
        }

        digits
            .parse()
            .map(GraphDepth::Limited)
            .map_err(|_| SelectorParseError::InvalidDepth {
                criterion: self.raw.to_string(),
                depth: digits.to_string(),
            })
    }

    fn empty(&self) -> SelectorParseError {
        SelectorParseError::EmptyCriterion {
            criterion: self.raw.to_string(),
        }
    }

    fn unbalanced(&self) -> SelectorParseError {
        SelectorParseError::UnbalancedOperator {
            criterion: self.raw.to_string(),
        }
    }

    fn unknown_method(&self, method: &str) -> SelectorParseError {
        SelectorParseError::UnknownMethod {
            criterion: self.raw.to_string(),
            method: method.to_string(),
        }
    }
}

/// A union of criteria (one `--select` or `--exclude` list)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSpec {
    criteria: Vec<Criterion>,
}

impl SelectionSpec {
    /// Parse CLI-style arguments; each argument may hold several
    /// whitespace-separated criteria
    pub fn parse<I, S>(args: I) -> Result<Self, SelectorParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut criteria = Vec::new();

        for arg in args {
            for token in arg.as_ref().split_whitespace() {
                criteria.push(Criterion::parse(token)?);
            }
        }

        Ok(Self { criteria })
    }

    /// Include used when no `--select` is given: every node and every source
    pub fn default_includes() -> Self {
        Self {
            criteria: vec![
                Criterion {
                    raw: "*".to_string(),
                    method: SelectorMethod::Name,
                    value: "*".to_string(),
                    parents: None,
                    children: None,
                },
                Criterion {
                    raw: "source:*".to_string(),
                    method: SelectorMethod::Source,
                    value: "*".to_string(),
                    parents: None,
                    children: None,
                },
            ],
        }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Structurally invalid selection input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorParseError {
    #[error("Empty selection criterion '{criterion}'")]
    EmptyCriterion { criterion: String },

    #[error("Unknown selector method '{method}' in '{criterion}'")]
    UnknownMethod { criterion: String, method: String },

    #[error("Selector '{criterion}' is missing a config key (expected config.<key>:<value>)")]
    MissingConfigKey { criterion: String },

    #[error("Selector '{criterion}' has an empty {method} value")]
    EmptyValue { criterion: String, method: String },

    #[error("Invalid graph operator depth '{depth}' in '{criterion}'")]
    InvalidDepth { criterion: String, depth: String },

    #[error("Unbalanced graph operator in '{criterion}'")]
    UnbalancedOperator { criterion: String },

    #[error("Invalid pattern in '{criterion}': {reason}")]
    InvalidPattern { criterion: String, reason: String },

    #[error("Unknown resource type '{0}' (expected model, seed, snapshot, analysis, test, source, all or default)")]
    UnknownResourceType(String),
}

impl SelectorParseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownResourceType(_) => ErrorCode::UnknownResourceType,
            _ => ErrorCode::SelectorParseError,
        }
    }
}
