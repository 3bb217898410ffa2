//! TTL cache
//!
//! One slot per `(node, resolved arguments)`. A refresh overwrites the slot
//! in place; expired slots are purged whenever their node is written, and
//! each node keeps at most `max_entries_per_node` slots (oldest evicted
//! first, 0 = unbounded).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::schema::Params;

#[derive(Debug, Clone)]
struct CacheEntry {
    args: Params,
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Read-only view of one cache slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntrySnapshot {
    pub node: String,
    pub args: Params,
    pub value: Value,
    pub age_ms: u64,
}

#[derive(Clone, Default)]
pub struct TtlCache {
    entries: Arc<DashMap<Arc<str>, Vec<CacheEntry>>>,
    max_entries_per_node: usize,
}

impl TtlCache {
    pub fn new(max_entries_per_node: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries_per_node,
        }
    }

    /// Stored value for these arguments, if younger than `ttl`
    ///
    /// The node's current TTL applies, not the one it was stored with.
    pub fn get_fresh(&self, node: &str, args: &Params, ttl: Duration) -> Option<Value> {
        let entries = self.entries.get(node)?;
        let now = Instant::now();
        entries
            .iter()
            .find(|entry| entry.args == *args)
            .filter(|entry| now.duration_since(entry.stored_at) < ttl)
            .map(|entry| entry.value.clone())
    }

    /// Store or refresh the slot for these arguments
    pub fn insert(&self, node: Arc<str>, args: Params, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.entry(node.clone()).or_default();

        entries.retain(|entry| entry.args == args || entry.is_fresh(now));

        match entries.iter_mut().find(|entry| entry.args == args) {
            Some(slot) => {
                slot.value = value;
                slot.stored_at = now;
                slot.ttl = ttl;
            }
            None => entries.push(CacheEntry {
                args,
                value,
                stored_at: now,
                ttl,
            }),
        }

        if self.max_entries_per_node > 0 && entries.len() > self.max_entries_per_node {
            entries.sort_by_key(|entry| entry.stored_at);
            let excess = entries.len() - self.max_entries_per_node;
            entries.drain(..excess);
            debug!(node = %node, evicted = excess, "cache full, evicted oldest entries");
        }
    }

    /// Slots of every node, sorted by node name
    pub fn snapshot(&self) -> Vec<CacheEntrySnapshot> {
        let now = Instant::now();
        let mut snapshot: Vec<CacheEntrySnapshot> = self
            .entries
            .iter()
            .flat_map(|node| {
                let name = node.key().to_string();
                node.value()
                    .iter()
                    .map(|entry| CacheEntrySnapshot {
                        node: name.clone(),
                        args: entry.args.clone(),
                        value: entry.value.clone(),
                        age_ms: now.duration_since(entry.stored_at).as_millis() as u64,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        snapshot.sort_by(|a, b| a.node.cmp(&b.node));
        snapshot
    }

    /// Number of slots across all nodes
    pub fn len(&self) -> usize {
        self.entries.iter().map(|node| node.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_hit_requires_equal_args() {
        let cache = TtlCache::new(0);
        cache.insert(Arc::from("n"), args(json!({"a": 1})), json!([1]), TTL);

        assert_eq!(cache.get_fresh("n", &args(json!({"a": 1})), TTL), Some(json!([1])));
        assert_eq!(cache.get_fresh("n", &args(json!({"a": 2})), TTL), None);
        assert_eq!(cache.get_fresh("other", &args(json!({"a": 1})), TTL), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_misses_then_overwrites_in_place() {
        let cache = TtlCache::new(0);
        let ttl = Duration::from_millis(100);
        cache.insert(Arc::from("n"), args(json!({"a": 1})), json!("old"), ttl);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(cache.get_fresh("n", &args(json!({"a": 1})), ttl), None);

        cache.insert(Arc::from("n"), args(json!({"a": 1})), json!("new"), ttl);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_fresh("n", &args(json!({"a": 1})), ttl), Some(json!("new")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_siblings_are_purged_on_write() {
        let cache = TtlCache::new(0);
        let ttl = Duration::from_millis(100);
        cache.insert(Arc::from("n"), args(json!({"t": 1})), json!(1), ttl);
        tokio::time::advance(Duration::from_millis(150)).await;
        cache.insert(Arc::from("n"), args(json!({"t": 2})), json!(2), ttl);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].args, args(json!({"t": 2})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_per_node() {
        let cache = TtlCache::new(2);
        for t in 0..4 {
            cache.insert(Arc::from("n"), args(json!({"t": t})), json!(t), TTL);
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        cache.insert(Arc::from("m"), args(json!({})), json!(0), TTL);

        assert_eq!(cache.len(), 3);
        assert!(cache.get_fresh("n", &args(json!({"t": 0})), TTL).is_none());
        assert!(cache.get_fresh("n", &args(json!({"t": 3})), TTL).is_some());
    }

    #[tokio::test]
    async fn test_snapshot_sorted_by_node() {
        let cache = TtlCache::default();
        assert!(cache.is_empty());
        cache.insert(Arc::from("b"), args(json!({})), json!(2), TTL);
        cache.insert(Arc::from("a"), args(json!({})), json!(1), TTL);

        let nodes: Vec<_> = cache.snapshot().into_iter().map(|e| e.node).collect();
        assert_eq!(nodes, vec!["a", "b"]);

        cache.clear();
        assert!(cache.is_empty());
    }
}
