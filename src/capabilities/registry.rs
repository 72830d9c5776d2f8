//! Name -> capability lookup, populated at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{EngineError, EngineResult};
use crate::domain::TaskKind;

use super::{Capability, CapabilityInfo};

/// Registry of capabilities keyed by name
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under an explicit name; a later registration replaces an earlier one
    pub fn register(
        &mut self,
        name: impl Into<String>,
        capability: Arc<dyn Capability>,
    ) -> EngineResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::InvalidCapability(
                "registration name is empty".to_string(),
            ));
        }

        let info = capability.describe();
        if info.name.trim().is_empty() {
            return Err(EngineError::InvalidCapability(format!(
                "capability registered as '{}' describes itself without a name",
                name
            )));
        }

        if self.capabilities.insert(name.clone(), capability).is_some() {
            warn!(capability = %name, "Replaced existing capability");
        } else {
            debug!(capability = %name, describes = %info.name, "Capability registered");
        }

        Ok(())
    }

    /// Register as the default implementation for a task kind
    pub fn register_for_kind(
        &mut self,
        kind: TaskKind,
        capability: Arc<dyn Capability>,
    ) -> EngineResult<()> {
        self.register(kind.as_str(), capability)
    }

    pub fn get(&self, name: &str) -> EngineResult<Arc<dyn Capability>> {
        self.capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::CapabilityNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// (registered name, self-description), sorted by name
    pub fn list(&self) -> Vec<(String, CapabilityInfo)> {
        let mut entries: Vec<(String, CapabilityInfo)> = self
            .capabilities
            .iter()
            .map(|(name, cap)| (name.clone(), cap.describe()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.capabilities.keys().collect();
        names.sort();
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &names)
            .finish()
    }
}
