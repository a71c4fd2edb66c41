//! Navigation and copy configuration

use serde::Deserialize;

/// How a forward search treats the first required sibling it meets.
///
/// A well-formed message cannot place a segment from further along the
/// schema before a required slot, so lookahead stops there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredBoundary {
    /// Check the required sibling itself, then stop
    #[default]
    Inclusive,

    /// Stop before checking the required sibling
    Exclusive,
}

/// What a segment copy does when the two segments have different schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentCopyPolicy {
    /// Copy the fields both segments declare, skip the rest
    OverlappingFields,

    /// Refuse to copy unless names and field counts agree
    #[default]
    RequireMatchingSchema,

    /// Copy every source field and fail on the first one the target lacks
    Strict,
}

/// Settings shared by iterators, navigators, finders and tersers
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Boundary used by lookahead searches
    pub required_boundary: RequiredBoundary,
}

impl NavigationConfig {
    pub fn with_required_boundary(mut self, boundary: RequiredBoundary) -> Self {
        self.required_boundary = boundary;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NavigationConfig::default();
        assert_eq!(config.required_boundary, RequiredBoundary::Inclusive);
        assert_eq!(SegmentCopyPolicy::default(), SegmentCopyPolicy::RequireMatchingSchema);
    }

    #[test]
    fn test_builder() {
        let config = NavigationConfig::default().with_required_boundary(RequiredBoundary::Exclusive);
        assert_eq!(config.required_boundary, RequiredBoundary::Exclusive);
    }
}
