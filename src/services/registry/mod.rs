//! Capability Registry
//!
//! Read-only catalog of capability descriptors. Built once at startup and
//! shared as `Arc<CapabilityRegistry>`; every lookup is a table access.
//!
//! Complementary links are validated at construction: a descriptor naming
//! itself is rejected, while links to ids absent from the catalog are kept
//! and skipped at lookup time.

pub mod catalog;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use ml_analysis_core::{Category, CoreError, CoreResult};

use crate::models::capability::{CapabilityDescriptor, ParameterMetadata};

pub use catalog::builtin_descriptors;

/// Registry of capability descriptors in declaration order
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    descriptors: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    /// Build a registry from descriptors, validating ids and links
    pub fn new(descriptors: Vec<CapabilityDescriptor>) -> CoreResult<Self> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (position, descriptor) in descriptors.iter().enumerate() {
            if descriptor.id.is_empty() {
                return Err(CoreError::validation("capability id must not be empty"));
            }
            if descriptor.complementary.iter().any(|c| c == &descriptor.id) {
                return Err(CoreError::validation(format!(
                    "capability '{}' lists itself as complementary",
                    descriptor.id
                )));
            }
            if index.insert(descriptor.id.clone(), position).is_some() {
                return Err(CoreError::validation(format!(
                    "duplicate capability id '{}'",
                    descriptor.id
                )));
            }
        }

        debug!("Capability registry built with {} entries", descriptors.len());
        Ok(Self { descriptors, index })
    }

    /// Registry over the built-in catalog
    pub fn builtin() -> CoreResult<Self> {
        Self::new(builtin_descriptors())
    }

    /// Look up one descriptor
    pub fn get(&self, id: &str) -> CoreResult<&CapabilityDescriptor> {
        self.index
            .get(id)
            .map(|&position| &self.descriptors[position])
            .ok_or_else(|| CoreError::unknown_capability(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All descriptors in declaration order
    pub fn list(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn by_category(&self, category: Category) -> Vec<&CapabilityDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Descriptors applicable to an industry tag
    pub fn by_industry(&self, industry: &str) -> Vec<&CapabilityDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.supports_industry(industry))
            .collect()
    }

    /// Descriptors matching both optional filters, in declaration order
    pub fn select(
        &self,
        category: Option<Category>,
        industry: Option<&str>,
    ) -> Vec<&CapabilityDescriptor> {
        match (category, industry) {
            (Some(category), None) => self.by_category(category),
            (None, Some(industry)) => self.by_industry(industry),
            (Some(category), Some(industry)) => self
                .by_category(category)
                .into_iter()
                .filter(|d| d.supports_industry(industry))
                .collect(),
            (None, None) => self.descriptors.iter().collect(),
        }
    }

    /// Complementary capabilities of `id` in declared order.
    ///
    /// Links to ids missing from the registry are skipped and the queried id
    /// is never returned. With an industry, only descriptors applicable to it
    /// are kept. Unknown `id` yields an empty list.
    pub fn complementary(&self, id: &str, industry: Option<&str>) -> Vec<&CapabilityDescriptor> {
        let Ok(descriptor) = self.get(id) else {
            return Vec::new();
        };

        descriptor
            .complementary
            .iter()
            .filter(|linked| linked.as_str() != id)
            .filter_map(|linked| self.get(linked).ok())
            .filter(|linked| industry.map_or(true, |tag| linked.supports_industry(tag)))
            .collect()
    }

    /// Categories that have at least one descriptor, in category order
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.descriptors.iter().any(|d| d.category == *c))
            .collect()
    }

    /// Every industry tag any descriptor applies to, sorted
    pub fn industries(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .flat_map(|d| d.industries.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Parameter description of one capability: name to
    /// `{description, required, type}`
    pub fn parameter_metadata(&self, id: &str) -> CoreResult<BTreeMap<String, ParameterMetadata>> {
        let descriptor = self.get(id)?;
        Ok(descriptor
            .parameters
            .iter()
            .map(|spec| (spec.name.clone(), ParameterMetadata::from(spec)))
            .collect())
    }
}
