//! Call Metrics Collection
//!
//! Lightweight per-node metrics with atomic counters.
//!
//! # Features
//!
//! - Adapter invocation counting (success/error)
//! - Retry and page counting
//! - Cache-sourced flag
//! - Nested metrics for default-source recursions
//!
//! # Example
//!
//! ```rust
//! use quarry::metrics::CallRecorder;
//!
//! let recorder = CallRecorder::new();
//! recorder.record_call();
//! recorder.record_success();
//!
//! let snapshot = recorder.snapshot();
//! assert_eq!(snapshot.calls, 1);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Live counters for one node execution (or one default-source lookup)
pub struct CallRecorder {
    /// Adapter invocations, including retries
    calls: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    /// Attempts beyond the first for a request
    retries: AtomicU64,
    /// Pages merged into results
    pages: AtomicU64,
    cached: AtomicBool,
    children: Mutex<Vec<(String, Arc<CallRecorder>)>>,
    start_time: Instant,
}

impl Default for CallRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CallRecorder {
    pub fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            pages: AtomicU64::new(0),
            cached: AtomicBool::new(false),
            children: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::SeqCst);
    }

    /// Tag the result as served from the TTL cache
    pub fn mark_cached(&self) {
        self.cached.store(true, Ordering::SeqCst);
    }

    /// Nested recorder for a default-source lookup, keyed
    /// `<param>.<source>.<schema>`
    pub fn child(&self, key: impl Into<String>) -> Arc<CallRecorder> {
        let child = Arc::new(CallRecorder::new());
        self.children.lock().push((key.into(), Arc::clone(&child)));
        child
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> CallMetrics {
        let default_sources = self
            .children
            .lock()
            .iter()
            .map(|(key, child)| (key.clone(), child.snapshot()))
            .collect();

        CallMetrics {
            cached: self.cached.load(Ordering::SeqCst),
            calls: self.calls.load(Ordering::SeqCst),
            successes: self.successes.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            pages: self.pages.load(Ordering::SeqCst),
            duration_ms: self.start_time.elapsed().as_millis() as u64,
            default_sources,
        }
    }
}

/// Point-in-time snapshot of one node's call metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetrics {
    pub cached: bool,
    pub calls: u64,
    pub successes: u64,
    pub errors: u64,
    pub retries: u64,
    pub pages: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_sources: BTreeMap<String, CallMetrics>,
}

impl CallMetrics {
    /// Calls including nested default-source lookups
    pub fn total_calls(&self) -> u64 {
        self.calls
            + self
                .default_sources
                .values()
                .map(CallMetrics::total_calls)
                .sum::<u64>()
    }
}

/// Metrics for one resolution run keyed `<node>.<source>.<schema>`
///
/// Schema names may contain dots (`synthetic.echo`), so keys are looked up
/// whole. Node names never do, which keeps the first segment exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunMetrics {
    nodes: BTreeMap<String, CallMetrics>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics key for a node bound to a schema
    pub fn key(node: &str, schema: &Schema) -> String {
        format!("{}.{}.{}", node, schema.source, schema.name)
    }

    pub fn insert(&mut self, key: String, metrics: CallMetrics) {
        self.nodes.insert(key, metrics);
    }

    pub fn get(&self, key: &str) -> Option<&CallMetrics> {
        self.nodes.get(key)
    }

    /// The entry whose first key segment is `node`
    pub fn for_node(&self, node: &str) -> Option<&CallMetrics> {
        self.nodes
            .iter()
            .find(|(key, _)| key.split_once('.').is_some_and(|(name, _)| name == node))
            .map(|(_, metrics)| metrics)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CallMetrics)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adapter invocations across every node, nested lookups included
    pub fn total_calls(&self) -> u64 {
        self.nodes.values().map(CallMetrics::total_calls).sum()
    }
}
