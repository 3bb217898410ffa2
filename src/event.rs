//! Run event log
//!
//! Audit trail of one resolution run.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run-level and node-level variants
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in a run's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since run start (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        targets: Vec<String>,
        node_count: usize,
    },
    RunCompleted {
        node_count: usize,
        total_duration_ms: u64,
    },
    RunFailed {
        error: String,
        failed_node: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    NodeScheduled {
        node: Arc<str>,
        dependencies: Vec<Arc<str>>,
    },
    /// Parameters resolved, call about to be issued
    NodeStarted {
        node: Arc<str>,
        params: Value,
    },
    NodeCacheHit {
        node: Arc<str>,
    },
    NodeCompleted {
        node: Arc<str>,
        calls: u64,
        duration_ms: u64,
    },
    NodeFailed {
        node: Arc<str>,
        error: String,
    },
}

impl EventKind {
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::NodeScheduled { node, .. }
            | Self::NodeStarted { node, .. }
            | Self::NodeCacheHit { node }
            | Self::NodeCompleted { node, .. }
            | Self::NodeFailed { node, .. } => Some(node),
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. } => None,
        }
    }

    pub fn is_run_event(&self) -> bool {
        self.node().is_none()
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at run start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    pub fn filter_node(&self, node: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.node() == Some(node))
            .collect()
    }

    pub fn run_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_run_event())
            .collect()
    }

    /// Serialize to JSON for debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_assigns_sequential_ids() {
        let log = EventLog::new();
        let first = log.emit(EventKind::RunStarted {
            targets: vec![],
            node_count: 2,
        });
        let second = log.emit(EventKind::NodeCacheHit { node: "a".into() });

        assert_eq!((first, second), (0, 1));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_filter_node_and_run_events() {
        let log = EventLog::new();
        log.emit(EventKind::RunStarted {
            targets: vec!["b".into()],
            node_count: 2,
        });
        log.emit(EventKind::NodeScheduled {
            node: "a".into(),
            dependencies: vec![],
        });
        log.emit(EventKind::NodeStarted {
            node: "b".into(),
            params: json!({}),
        });
        log.emit(EventKind::NodeFailed {
            node: "b".into(),
            error: "boom".into(),
        });

        assert_eq!(log.filter_node("b").len(), 2);
        assert_eq!(log.run_events().len(), 1);
    }

    #[test]
    fn test_to_json_is_tagged() {
        let log = EventLog::new();
        log.emit(EventKind::NodeCacheHit { node: "a".into() });

        let json = log.to_json();
        assert_eq!(json[0]["kind"]["type"], "node_cache_hit");
        assert_eq!(json[0]["kind"]["node"], "a");
    }

    #[test]
    fn test_clones_share_log() {
        let log = EventLog::default();
        assert!(log.is_empty());
        log.clone().emit(EventKind::RunFailed {
            error: "x".into(),
            failed_node: None,
        });
        assert_eq!(log.len(), 1);
    }
}
