//! Capability Resolver
//!
//! Maps a requested capability id to an executable implementation. The slot
//! table is filled once from capability factories; a factory that fails
//! leaves its slot `Unavailable`. Resolution never fails: anything that
//! cannot be served resolves to the fallback capability with a reason.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use ml_analysis_capabilities::{builtin_factories, CapabilityFactory, Fallback};
use ml_analysis_core::Capability;

use crate::models::analysis::FallbackReason;
use crate::services::registry::CapabilityRegistry;

/// Implementation slot of one capability id
#[derive(Clone)]
pub enum Slot {
    Ready(Arc<dyn Capability>),
    Unavailable(String),
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Ready(capability) => write!(f, "Ready({})", capability.id()),
            Slot::Unavailable(reason) => write!(f, "Unavailable({})", reason),
        }
    }
}

/// Outcome of a resolution
#[derive(Clone)]
pub struct ResolvedCapability {
    pub capability: Arc<dyn Capability>,
    /// Set when the fallback stands in for the requested capability
    pub fallback: Option<FallbackReason>,
}

impl ResolvedCapability {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

impl std::fmt::Debug for ResolvedCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCapability")
            .field("capability", &self.capability.id())
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Resolver over a registry and an implementation table
pub struct CapabilityResolver {
    registry: Arc<CapabilityRegistry>,
    slots: HashMap<String, Slot>,
    fallback: Arc<dyn Capability>,
}

impl CapabilityResolver {
    /// Instantiate every factory once. Factories for ids the registry does
    /// not know are ignored.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        factories: Vec<(&'static str, CapabilityFactory)>,
        fallback_seed: Option<u64>,
    ) -> Self {
        let mut slots = HashMap::with_capacity(factories.len());
        for (id, factory) in factories {
            if !registry.contains(id) {
                warn!("Ignoring implementation for unregistered capability '{}'", id);
                continue;
            }
            let slot = match factory() {
                Ok(capability) => Slot::Ready(capability),
                Err(e) => {
                    warn!("Capability '{}' could not be instantiated: {}", id, e);
                    Slot::Unavailable(e.to_string())
                }
            };
            slots.insert(id.to_string(), slot);
        }

        Self {
            registry,
            slots,
            fallback: Arc::new(Fallback::new(fallback_seed)),
        }
    }

    /// Resolver over the built-in implementations
    pub fn builtin(registry: Arc<CapabilityRegistry>, fallback_seed: Option<u64>) -> Self {
        Self::new(registry, builtin_factories(), fallback_seed)
    }

    /// Resolve a capability id; unknown or unavailable ids get the fallback
    pub fn resolve(&self, id: &str) -> ResolvedCapability {
        if !self.registry.contains(id) {
            warn!("Unknown capability '{}', using fallback implementation", id);
            return self.substitute(FallbackReason::UnknownCapability);
        }

        match self.slots.get(id) {
            Some(Slot::Ready(capability)) => ResolvedCapability {
                capability: Arc::clone(capability),
                fallback: None,
            },
            Some(Slot::Unavailable(reason)) => {
                warn!(
                    "Capability '{}' is unavailable ({}), using fallback implementation",
                    id, reason
                );
                self.substitute(FallbackReason::ImplementationUnavailable(reason.clone()))
            }
            None => {
                warn!("Capability '{}' has no implementation, using fallback implementation", id);
                self.substitute(FallbackReason::ImplementationUnavailable(format!(
                    "no implementation registered for '{}'",
                    id
                )))
            }
        }
    }

    fn substitute(&self, reason: FallbackReason) -> ResolvedCapability {
        ResolvedCapability {
            capability: Arc::clone(&self.fallback),
            fallback: Some(reason),
        }
    }

    /// The fallback capability shared by every substitution
    pub fn fallback(&self) -> Arc<dyn Capability> {
        Arc::clone(&self.fallback)
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Slot state of a registered id
    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.get(id)
    }
}

impl std::fmt::Debug for CapabilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityResolver")
            .field("slots", &self.slots.len())
            .finish()
    }
}
