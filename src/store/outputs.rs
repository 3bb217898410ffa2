//! NodeOutputs - per-run node output storage with DashMap
//!
//! Written by nodes as they finish, read by the binding resolver of their
//! dependents. Lives for exactly one run.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

/// Thread-safe storage for node outputs (lock-free)
///
/// Uses Arc<str> keys so the scheduler's node names can be reused as-is.
#[derive(Clone, Default)]
pub struct NodeOutputs {
    /// node name → formatted output
    outputs: Arc<DashMap<Arc<str>, Arc<Value>>>,
}

impl NodeOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: Arc<str>, output: Value) {
        self.outputs.insert(node, Arc::new(output));
    }

    /// Get a node's output
    /// Returns Arc<Value> for O(1) cloning instead of deep copy
    pub fn get(&self, node: &str) -> Option<Arc<Value>> {
        self.outputs.get(node).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, node: &str) -> bool {
        self.outputs.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Collect every output into a result map
    pub fn to_map(&self) -> Map<String, Value> {
        self.outputs
            .iter()
            .map(|entry| (entry.key().to_string(), (**entry.value()).clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_and_get_output() {
        let outputs = NodeOutputs::new();
        outputs.insert(Arc::from("groups"), json!(["a", "b"]));

        assert!(outputs.contains("groups"));
        assert_eq!(*outputs.get("groups").unwrap(), json!(["a", "b"]));
        assert!(outputs.get("streams").is_none());
    }

    #[test]
    fn clones_share_storage() {
        let outputs = NodeOutputs::new();
        let other = outputs.clone();
        other.insert(Arc::from("n"), json!(1));
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn to_map_collects_everything() {
        let outputs = NodeOutputs::new();
        assert!(outputs.is_empty());
        outputs.insert(Arc::from("a"), json!(1));
        outputs.insert(Arc::from("b"), json!({"x": 2}));

        let map = outputs.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"]["x"], 2);
    }
}
