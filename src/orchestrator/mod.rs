//! Orchestrator Module - graph resolution
//!
//! Owns the dependency graph, the adapter registry, the TTL cache and the
//! input store. Each `resolve` validates the graph, plans the requested
//! targets and drives ready nodes concurrently through the collector.
//!
//! ```text
//! resolve(request)
//!   ├─ validate        sources graph-wide, cycles, inputs of planned nodes
//!   ├─ plan            targets + transitive dependencies
//!   └─ schedule        nodes start as soon as their sources have output
//!        └─ run_node   bind params → cache → collector → formatter
//! ```

mod request;
mod run;

pub use request::{Resolution, ResolveRequest, ResultMap};

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::adapter::AdapterRegistry;
use crate::collector::Collector;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::store::{CacheEntrySnapshot, InputStore, TtlCache};

/// Resolves one dependency graph, run after run
pub struct Orchestrator {
    graph: Arc<DependencyGraph>,
    collector: Collector,
    cache: TtlCache,
    inputs: InputStore,
    config: Arc<EngineConfig>,
}

impl Orchestrator {
    /// Orchestrator with the built-in adapters and default config
    pub fn new(graph: DependencyGraph) -> Self {
        Self::builder(graph).build()
    }

    pub fn with_inputs(graph: DependencyGraph, inputs: Map<String, Value>) -> Self {
        Self::builder(graph).inputs(inputs).build()
    }

    pub fn builder(graph: DependencyGraph) -> OrchestratorBuilder {
        OrchestratorBuilder {
            graph,
            registry: None,
            inputs: Map::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn set_input(&self, path: &str, value: Value) -> Result<()> {
        self.inputs.set(path, value)
    }

    pub fn get_input(&self, path: &str) -> Option<Value> {
        self.inputs.get(path)
    }

    /// Copy of every stored input
    pub fn inputs(&self) -> Value {
        self.inputs.snapshot()
    }

    /// Read-only snapshot of the TTL cache
    pub fn get_cache(&self) -> Vec<CacheEntrySnapshot> {
        self.cache.snapshot()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Adapter registry; use `substitute` to swap adapters in tests
    pub fn registry(&self) -> &AdapterRegistry {
        self.collector.registry()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

pub struct OrchestratorBuilder {
    graph: DependencyGraph,
    registry: Option<AdapterRegistry>,
    inputs: Map<String, Value>,
    config: EngineConfig,
}

impl OrchestratorBuilder {
    /// Use this registry instead of the built-in adapters
    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Orchestrator {
        let config = Arc::new(self.config);
        let registry = self.registry.unwrap_or_else(AdapterRegistry::with_defaults);
        Orchestrator {
            graph: Arc::new(self.graph),
            collector: Collector::new(registry, Arc::clone(&config)),
            cache: TtlCache::new(config.cache.max_entries_per_node),
            inputs: InputStore::new(self.inputs),
            config,
        }
    }
}
