//! Adapter registry
//!
//! Owned by one orchestrator and shared with its collector. Tests swap an
//! adapter for the duration of a scope with [`AdapterRegistry::substitute`].

use std::sync::Arc;

use dashmap::DashMap;

use super::{Adapter, FunctionAdapter, HttpAdapter};

/// Thread-safe map from source name to adapter
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<DashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `synthetic` and `http` sources
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("synthetic", Arc::new(FunctionAdapter::synthetic()));
        registry.register("http", Arc::new(HttpAdapter::new()));
        registry
    }

    /// Register (or replace) the adapter for a source name
    pub fn register(&self, source: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(source.into(), adapter);
    }

    /// Remove an adapter, returning it
    pub fn unregister(&self, source: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.remove(source).map(|(_, adapter)| adapter)
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(source).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, source: &str) -> bool {
        self.adapters.contains_key(source)
    }

    /// Registered source names, sorted
    pub fn sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Replace an adapter until the returned guard is dropped
    ///
    /// The previous adapter (or its absence) is restored on drop.
    #[must_use = "the substitute is removed as soon as the guard is dropped"]
    pub fn substitute(&self, source: impl Into<String>, adapter: Arc<dyn Adapter>) -> AdapterOverride {
        let source = source.into();
        let previous = self.adapters.insert(source.clone(), adapter);
        AdapterOverride {
            registry: self.clone(),
            source,
            previous,
        }
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}

/// Scoped substitution created by [`AdapterRegistry::substitute`]
pub struct AdapterOverride {
    registry: AdapterRegistry,
    source: String,
    previous: Option<Arc<dyn Adapter>>,
}

impl AdapterOverride {
    /// Restore the previous adapter now
    pub fn restore(self) {}
}

impl Drop for AdapterOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => {
                self.registry.adapters.insert(self.source.clone(), previous);
            }
            None => {
                self.registry.adapters.remove(&self.source);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockAdapter;

    #[test]
    fn test_defaults_registered() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.sources(), vec!["http".to_string(), "synthetic".to_string()]);
        assert!(registry.get("synthetic").is_some());
        assert!(registry.get("s3").is_none());
    }

    #[test]
    fn test_substitute_restores_previous() {
        let registry = AdapterRegistry::new();
        registry.register("api", Arc::new(MockAdapter::new("original")));

        {
            let _guard = registry.substitute("api", Arc::new(MockAdapter::new("stand-in")));
            assert_eq!(registry.get("api").unwrap().name(), "stand-in");
        }
        assert_eq!(registry.get("api").unwrap().name(), "original");
    }

    #[test]
    fn test_substitute_removes_when_absent_before() {
        let registry = AdapterRegistry::new();
        let guard = registry.substitute("api", Arc::new(MockAdapter::new("stand-in")));
        assert!(registry.contains("api"));
        guard.restore();
        assert!(!registry.contains("api"));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = AdapterRegistry::new();
        let shared = registry.clone();
        registry.register("api", Arc::new(MockAdapter::new("m")));
        assert!(shared.contains("api"));
        assert!(shared.unregister("api").is_some());
        assert!(!registry.contains("api"));
    }
}
