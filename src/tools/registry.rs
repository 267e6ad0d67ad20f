//! Name-indexed capability map.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::tool::Capability;
use super::types::FunctionToolDescriptor;
use crate::error::CapabilityError;

/// Capabilities available to the model, keyed by name.
///
/// Registering a name that is already present replaces the earlier entry
/// (last registration wins) but keeps its original position, so descriptor
/// order stays stable.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    by_name: HashMap<String, Arc<dyn Capability>>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability, returning the one it replaced.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        let name = capability.name().to_string();
        let previous = self.by_name.insert(name.clone(), capability);
        if previous.is_some() {
            warn!(capability = %name, "capability registered twice; keeping the later one");
        } else {
            self.order.push(name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.by_name.get(name)
    }

    /// Look up a capability the model asked for.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Capability>, CapabilityError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| CapabilityError::Unknown { name: name.to_string() })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn descriptors(&self) -> Vec<FunctionToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .map(|capability| capability.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.order)
            .finish()
    }
}
