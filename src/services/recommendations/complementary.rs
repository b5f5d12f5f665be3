//! Complementary Analyses
//!
//! Suggestions of other catalog capabilities worth running after one.

use crate::models::analysis::ComplementarySuggestion;
use crate::services::registry::CapabilityRegistry;

/// Complementary capabilities of `capability_id` applicable to `industry`,
/// in declared order. Unknown ids yield no suggestions.
pub fn complementary_suggestions(
    registry: &CapabilityRegistry,
    capability_id: &str,
    industry: &str,
) -> Vec<ComplementarySuggestion> {
    registry
        .complementary(capability_id, Some(industry))
        .into_iter()
        .map(|descriptor| ComplementarySuggestion {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            category: descriptor.category,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions_follow_registry_links() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let suggestions = complementary_suggestions(&registry, "kmeans", "retail");
        let ids: Vec<&str> = suggestions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["hierarchical", "random_forest"]);
    }

    #[test]
    fn test_unknown_capability_has_no_suggestions() {
        let registry = CapabilityRegistry::builtin().unwrap();
        assert!(complementary_suggestions(&registry, "does_not_exist", "retail").is_empty());
    }

    #[test]
    fn test_never_suggests_itself() {
        let registry = CapabilityRegistry::builtin().unwrap();
        for descriptor in registry.list() {
            for industry in registry.industries() {
                let suggestions = complementary_suggestions(&registry, &descriptor.id, &industry);
                assert!(suggestions.iter().all(|s| s.id != descriptor.id));
            }
        }
    }
}
