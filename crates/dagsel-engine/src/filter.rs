//! Resource-type post-filter (`--resource-type`)

use dagsel_core::ResourceType;
use std::collections::BTreeSet;

use crate::selector::SelectorParseError;

/// Set of resource types a listing is restricted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeFilter {
    types: BTreeSet<ResourceType>,
}

impl Default for ResourceTypeFilter {
    /// Everything except analyses
    fn default() -> Self {
        Self::only(ResourceType::DEFAULT_LISTED)
    }
}

impl ResourceTypeFilter {
    /// Every selectable kind, analyses included
    pub fn all() -> Self {
        Self::only(ResourceType::SELECTABLE)
    }

    pub fn only(types: impl IntoIterator<Item = ResourceType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    /// Parse `--resource-type` values
    ///
    /// Values may be repeated or comma-joined. `all` selects every kind,
    /// `default` the default set; both union with any other named kinds.
    /// No values at all yields the default set.
    pub fn parse<I, S>(values: I) -> Result<Self, SelectorParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut types = BTreeSet::new();

        for value in values {
            for token in value.as_ref().split(',').map(str::trim).filter(|t| !t.is_empty()) {
                match token.to_ascii_lowercase().as_str() {
                    "all" => types.extend(ResourceType::SELECTABLE),
                    "default" => types.extend(ResourceType::DEFAULT_LISTED),
                    _ => {
                        let resource_type: ResourceType = token
                            .parse()
                            .map_err(|_| SelectorParseError::UnknownResourceType(token.to_string()))?;

                        if resource_type == ResourceType::Macro {
                            return Err(SelectorParseError::UnknownResourceType(token.to_string()));
                        }

                        types.insert(resource_type);
                    }
                }
            }
        }

        if types.is_empty() {
            return Ok(Self::default());
        }

        Ok(Self { types })
    }

    pub fn contains(&self, resource_type: ResourceType) -> bool {
        self.types.contains(&resource_type)
    }

    pub fn types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.types.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagsel_core::ErrorCode;

    #[test]
    fn default_excludes_analyses() {
        let filter = ResourceTypeFilter::default();
        assert!(filter.contains(ResourceType::Model));
        assert!(filter.contains(ResourceType::Source));
        assert!(!filter.contains(ResourceType::Analysis));

        assert_eq!(ResourceTypeFilter::parse(Vec::<&str>::new()).unwrap(), filter);
    }

    #[test]
    fn all_and_default_keywords() {
        let all = ResourceTypeFilter::parse(["all"]).unwrap();
        assert!(all.contains(ResourceType::Analysis));
        assert_eq!(all, ResourceTypeFilter::all());

        let extended = ResourceTypeFilter::parse(["default", "analysis"]).unwrap();
        assert_eq!(extended, ResourceTypeFilter::all());
    }

    #[test]
    fn comma_joined_values() {
        let filter = ResourceTypeFilter::parse(["model, test", "Seed"]).unwrap();
        let types: Vec<ResourceType> = filter.types().collect();
        assert_eq!(
            types,
            vec![ResourceType::Model, ResourceType::Seed, ResourceType::Test]
        );
    }

    #[test]
    fn unknown_values_are_rejected() {
        let err = ResourceTypeFilter::parse(["model", "exposure"]).unwrap_err();
        assert_eq!(err, SelectorParseError::UnknownResourceType("exposure".to_string()));
        assert_eq!(err.code(), ErrorCode::UnknownResourceType);

        assert!(ResourceTypeFilter::parse(["macro"]).is_err());
    }
}
