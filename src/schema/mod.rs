//! Schema Module - static call contracts
//!
//! A [`Schema`] describes how to call one kind of source: which parameters
//! it needs, how to detect and split multi-valued parameters, where the
//! result lives in a response, how to paginate and merge, and which adapter
//! performs the call.
//!
//! Schemas are immutable once built and shared as `Arc<Schema>` between
//! nodes and default-source chains.

mod pagination;
mod param;

pub use pagination::{Indicator, NextPage, NextPageFn, Pagination};
pub use param::{ArrayDetection, ParamDescriptor, PredicateFn};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::AdapterFailure;

/// One concrete (or logical) parameter set
pub type Params = Map<String, Value>;

/// Per-value formatter applied to parameter values before the call
pub type ValueFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Pairwise merge used between pages
pub type MergeFn = Arc<dyn Fn(Value, Value) -> Value + Send + Sync>;

/// Combines the per-call results of a fanned-out request
pub type MergeAllFn = Arc<dyn Fn(Vec<Value>) -> Value + Send + Sync>;

/// Result extractor returning `None` when the result is absent
pub type ExtractFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Inspects `(error, response, params)` after each attempt and returns the
/// effective error, if any. Returning `None` marks the attempt successful.
pub type ErrorDetector =
    Arc<dyn Fn(Option<&AdapterFailure>, Option<&Value>, &Params) -> Option<AdapterFailure> + Send + Sync>;

/// Runs once retries are exhausted and may recover with a synthetic response
pub type ErrorHandler =
    Arc<dyn Fn(AdapterFailure, Option<Value>) -> Result<Value, AdapterFailure> + Send + Sync>;

/// How the concrete calls of one fanned-out request are issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One after another, each awaiting its completion
    #[default]
    Sequential,
    /// Concurrently, bounded by the node's `parallel_limit`
    Parallel,
    /// One after another through the adapter's blocking entry point
    Synchronous,
}

/// Where the result lives in a response
#[derive(Clone, Default)]
pub enum ResultLocator {
    /// The response itself
    #[default]
    Whole,
    /// A dotted path into the response
    Path(String),
    /// A custom extractor
    Extract(ExtractFn),
}

impl fmt::Debug for ResultLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => write!(f, "Whole"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Extract(_) => write!(f, "Extract(<fn>)"),
        }
    }
}

impl ResultLocator {
    /// Human-readable form used in error messages
    pub fn describe(&self) -> &str {
        match self {
            Self::Whole => "$",
            Self::Path(path) => path,
            Self::Extract(_) => "<extractor>",
        }
    }
}

/// Result extraction rules
#[derive(Debug, Clone, Default)]
pub struct ResultSpec {
    pub locator: ResultLocator,
    /// An absent result is treated as an empty list instead of an error
    pub maybe_empty: bool,
    /// Sort the merged result by this path when it is a list
    pub sort_by: Option<String>,
}

/// Static call contract for one kind of source
#[derive(Clone)]
pub struct Schema {
    pub name: String,
    /// Adapter name in the registry
    pub source: String,
    pub method: Option<String>,
    /// Positional argument order for function-style adapters
    pub argument_order: Vec<String>,
    /// Fixed parameters merged under every call's resolved parameters
    pub params: Params,
    pub required: BTreeMap<String, ParamDescriptor>,
    pub optional: BTreeMap<String, ParamDescriptor>,
    pub result: ResultSpec,
    pub pagination: Option<Pagination>,
    /// Merge between pages (default: concat)
    pub merge_pages: Option<MergeFn>,
    /// Merge across fanned-out calls (default: flatten)
    pub merge_calls: Option<MergeAllFn>,
    pub on_error: Option<ErrorHandler>,
    pub detect_errors: Option<ErrorDetector>,
    pub mode: ExecutionMode,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("method", &self.method)
            .field("required", &self.required.keys().collect::<Vec<_>>())
            .field("optional", &self.optional.keys().collect::<Vec<_>>())
            .field("result", &self.result)
            .field("paginated", &self.pagination.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

impl Schema {
    /// Create a schema calling `source` with no parameters
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            method: None,
            argument_order: Vec::new(),
            params: Params::new(),
            required: BTreeMap::new(),
            optional: BTreeMap::new(),
            result: ResultSpec::default(),
            pagination: None,
            merge_pages: None,
            merge_calls: None,
            on_error: None,
            detect_errors: None,
            mode: ExecutionMode::default(),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn argument_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argument_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Add a fixed parameter sent with every call
    pub fn static_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn required(mut self, name: impl Into<String>, descriptor: ParamDescriptor) -> Self {
        self.required.insert(name.into(), descriptor);
        self
    }

    pub fn optional(mut self, name: impl Into<String>, descriptor: ParamDescriptor) -> Self {
        self.optional.insert(name.into(), descriptor);
        self
    }

    /// Extract the result from a dotted path of the response
    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.result.locator = ResultLocator::Path(path.into());
        self
    }

    /// Extract the result with a custom function
    pub fn result_with(
        mut self,
        extract: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.result.locator = ResultLocator::Extract(Arc::new(extract));
        self
    }

    pub fn maybe_empty(mut self) -> Self {
        self.result.maybe_empty = true;
        self
    }

    pub fn sort_by(mut self, path: impl Into<String>) -> Self {
        self.result.sort_by = Some(path.into());
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn merge_pages_with(
        mut self,
        merge: impl Fn(Value, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.merge_pages = Some(Arc::new(merge));
        self
    }

    pub fn merge_calls_with(
        mut self,
        merge: impl Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.merge_calls = Some(Arc::new(merge));
        self
    }

    pub fn on_error(
        mut self,
        handler: impl Fn(AdapterFailure, Option<Value>) -> Result<Value, AdapterFailure>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn detect_errors(
        mut self,
        detector: impl Fn(Option<&AdapterFailure>, Option<&Value>, &Params) -> Option<AdapterFailure>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.detect_errors = Some(Arc::new(detector));
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Look up a parameter descriptor, required first
    pub fn descriptor(&self, name: &str) -> Option<&ParamDescriptor> {
        self.required.get(name).or_else(|| self.optional.get(name))
    }

    /// Required and optional descriptors, required first
    pub fn descriptors(&self) -> impl Iterator<Item = (&String, &ParamDescriptor)> {
        self.required.iter().chain(self.optional.iter())
    }

    /// Required parameters whose value is absent or null
    pub fn missing_required<'a>(&'a self, params: &Params) -> Vec<&'a str> {
        self.required
            .keys()
            .filter(|name| params.get(name.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_descriptors() {
        let schema = Schema::new("listStreams", "logs")
            .method("describeLogStreams")
            .required("logGroupName", ParamDescriptor::new())
            .optional("limit", ParamDescriptor::new().never_array())
            .result_path("logStreams")
            .sort_by("creationTime");

        assert_eq!(schema.method.as_deref(), Some("describeLogStreams"));
        assert!(schema.descriptor("limit").is_some());
        assert!(schema.descriptor("nope").is_none());
        assert_eq!(schema.descriptors().count(), 2);
        assert_eq!(schema.result.locator.describe(), "logStreams");
        assert_eq!(schema.result.sort_by.as_deref(), Some("creationTime"));
    }

    #[test]
    fn test_missing_required_treats_null_as_absent() {
        let schema = Schema::new("s", "mock")
            .required("a", ParamDescriptor::new())
            .required("b", ParamDescriptor::new());
        let mut params = Params::new();
        params.insert("a".into(), json!(null));
        assert_eq!(schema.missing_required(&params), vec!["a", "b"]);

        params.insert("a".into(), json!(0));
        assert_eq!(schema.missing_required(&params), vec!["b"]);
    }

    #[test]
    fn test_execution_mode_serde() {
        let mode: ExecutionMode = serde_yaml::from_str("parallel").unwrap();
        assert_eq!(mode, ExecutionMode::Parallel);
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
    }

    #[test]
    fn test_debug_hides_closures() {
        let schema = Schema::new("s", "mock").result_with(|v| Some(v.clone()));
        let debug = format!("{:?}", schema);
        assert!(debug.contains("Extract(<fn>)"));
    }
}
