//! Run requests and their outcomes

use serde_json::{Map, Value};

use crate::error::{QuarryError, Result};
use crate::event::EventLog;
use crate::metrics::RunMetrics;
use crate::util::path;

/// Node name → formatted result
pub type ResultMap = Map<String, Value>;

/// What to resolve and with which one-shot input overrides
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Empty = every node
    pub targets: Vec<String>,
    /// Shadow stored inputs for this run only
    pub overrides: Value,
}

impl Default for ResolveRequest {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            overrides: Value::Object(Map::new()),
        }
    }
}

impl ResolveRequest {
    /// Resolve the whole graph
    pub fn all() -> Self {
        Self::default()
    }

    pub fn target(name: impl Into<String>) -> Self {
        Self::targets([name])
    }

    pub fn targets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Override the input at `path` for this run
    pub fn with_override(mut self, path: &str, value: Value) -> Result<Self> {
        path::set(&mut self.overrides, path, value)?;
        Ok(self)
    }

    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        path::deep_merge(&mut self.overrides, &Value::Object(overrides));
        self
    }
}

/// Outcome of one run
///
/// On error there is no result map; metrics cover the work finished
/// before the abort.
#[derive(Debug)]
pub struct Resolution {
    pub result: Result<ResultMap>,
    pub metrics: RunMetrics,
    pub events: EventLog,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&QuarryError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<ResultMap> {
        self.result
    }
}
