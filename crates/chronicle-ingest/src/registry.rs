//! Explicit source plugin registry.
//!
//! Plugins are registered once at startup. A duplicate name is a fatal
//! configuration conflict, surfaced before the service accepts traffic.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use chronicle_core::{Error, Result};

use crate::source::SourcePlugin;

/// Registry mapping plugin name to a value satisfying the plugin contract.
#[derive(Default)]
pub struct SourceRegistry {
    plugins: HashMap<String, Arc<dyn SourcePlugin>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Rejects duplicates by `name`.
    pub fn register(&mut self, plugin: Arc<dyn SourcePlugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(Error::Conflict(format!(
                "source plugin '{name}' is already registered"
            )));
        }
        info!(
            subsystem = "ingest",
            component = "registry",
            op = "register",
            source = %name,
            schedule = plugin.schedule(),
            native_location = plugin.has_native_location(),
            "Registered source plugin"
        );
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Look up a plugin by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourcePlugin>> {
        self.plugins.get(name).cloned()
    }

    /// Names of all registered plugins, sorted for stable iteration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// True when no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;

    #[test]
    fn register_and_lookup() {
        let mut registry = SourceRegistry::new();
        registry
            .register(Arc::new(StaticSource::new("spotify", false)))
            .unwrap();
        registry
            .register(Arc::new(StaticSource::new("arc", true)))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("spotify").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["arc", "spotify"]);
    }

    #[test]
    fn duplicate_name_is_a_conflict() {
        let mut registry = SourceRegistry::new();
        registry
            .register(Arc::new(StaticSource::new("arc", true)))
            .unwrap();
        let err = registry
            .register(Arc::new(StaticSource::new("arc", true)))
            .unwrap_err();
        assert!(matches!(err, chronicle_core::Error::Conflict(_)));
    }
}
