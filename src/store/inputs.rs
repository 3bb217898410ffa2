//! Named external inputs
//!
//! Inputs are one JSON object addressed by dotted paths, so
//! `set("aws.region", "eu-west-1")` and `get("aws")` see the same data.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::util::path;

/// Shared, mutable input store
#[derive(Clone)]
pub struct InputStore {
    values: Arc<RwLock<Value>>,
}

impl Default for InputStore {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl InputStore {
    pub fn new(initial: Map<String, Value>) -> Self {
        Self {
            values: Arc::new(RwLock::new(Value::Object(initial))),
        }
    }

    /// Set the value at `path`, creating intermediate objects
    pub fn set(&self, path: &str, value: Value) -> Result<()> {
        path::set(&mut self.values.write(), path, value)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        path::get(&self.values.read(), path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        path::get(&self.values.read(), path).is_some()
    }

    /// Copy of every input
    pub fn snapshot(&self) -> Value {
        self.values.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get_nested() {
        let inputs = InputStore::default();
        inputs.set("aws.region", json!("eu-west-1")).unwrap();

        assert_eq!(inputs.get("aws.region"), Some(json!("eu-west-1")));
        assert_eq!(inputs.get("aws"), Some(json!({"region": "eu-west-1"})));
        assert!(inputs.contains("aws.region"));
        assert!(!inputs.contains("aws.profile"));
    }

    #[test]
    fn test_initial_values() {
        let mut initial = Map::new();
        initial.insert("user".into(), json!("ada"));
        let inputs = InputStore::new(initial);
        assert_eq!(inputs.snapshot(), json!({"user": "ada"}));
    }

    #[test]
    fn test_clones_share_state() {
        let inputs = InputStore::default();
        let handle = inputs.clone();
        handle.set("x", json!(1)).unwrap();
        assert_eq!(inputs.get("x"), Some(json!(1)));
    }
}
