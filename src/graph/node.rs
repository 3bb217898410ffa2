//! Dependency nodes and parameter bindings

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::adapter::AdapterFailure;
use crate::collector::RetryConfig;
use crate::schema::{ErrorDetector, ErrorHandler, Params, Schema};

/// Combines the referenced values of a binding into the parameter value
///
/// Receives `{reference name: value}` for every referenced input or node.
pub type BindingFormatter = Arc<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>;

/// Produces a fresh value for every resolution
pub type Generator = Arc<dyn Fn() -> Value + Send + Sync>;

/// Shapes a node's raw result; receives `(raw result, inputs merged with overrides)`
pub type ResultFormatter = Arc<dyn Fn(Value, &Value) -> Value + Send + Sync>;

/// How one parameter of a node gets its value
#[derive(Clone)]
pub enum ParameterBinding {
    Literal(Value),
    /// Named external inputs (dotted paths into the input store)
    Input {
        names: Vec<String>,
        formatter: Option<BindingFormatter>,
    },
    /// Outputs of sibling nodes
    Source {
        nodes: Vec<String>,
        formatter: Option<BindingFormatter>,
    },
    Generated(Generator),
}

impl fmt::Debug for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Input { names, formatter } => f
                .debug_struct("Input")
                .field("names", names)
                .field("formatted", &formatter.is_some())
                .finish(),
            Self::Source { nodes, formatter } => f
                .debug_struct("Source")
                .field("nodes", nodes)
                .field("formatted", &formatter.is_some())
                .finish(),
            Self::Generated(_) => write!(f, "Generated(<fn>)"),
        }
    }
}

impl ParameterBinding {
    pub fn value(value: Value) -> Self {
        Self::Literal(value)
    }

    pub fn input(name: impl Into<String>) -> Self {
        Self::Input {
            names: vec![name.into()],
            formatter: None,
        }
    }

    pub fn inputs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Input {
            names: names.into_iter().map(Into::into).collect(),
            formatter: None,
        }
    }

    pub fn source(node: impl Into<String>) -> Self {
        Self::Source {
            nodes: vec![node.into()],
            formatter: None,
        }
    }

    pub fn sources<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Source {
            nodes: nodes.into_iter().map(Into::into).collect(),
            formatter: None,
        }
    }

    pub fn generated(generator: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self::Generated(Arc::new(generator))
    }

    /// Attach a formatter to an input or source binding
    ///
    /// Literal and generated bindings are returned unchanged.
    pub fn formatted(
        self,
        formatter: impl Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        let formatter: BindingFormatter = Arc::new(formatter);
        match self {
            Self::Input { names, .. } => Self::Input {
                names,
                formatter: Some(formatter),
            },
            Self::Source { nodes, .. } => Self::Source {
                nodes,
                formatter: Some(formatter),
            },
            other => other,
        }
    }

    /// Sibling nodes referenced by this binding
    pub fn source_nodes(&self) -> &[String] {
        match self {
            Self::Source { nodes, .. } => nodes,
            _ => &[],
        }
    }

    /// External inputs referenced by this binding
    pub fn input_names(&self) -> &[String] {
        match self {
            Self::Input { names, .. } => names,
            _ => &[],
        }
    }
}

/// Per-node overrides of execution behavior
#[derive(Clone, Default)]
pub struct Behaviors {
    /// Concurrent calls allowed for a parallel fan-out (None = unbounded)
    pub parallel_limit: Option<usize>,
    pub retry: RetryConfig,
    /// Takes precedence over the schema's and the adapter's detector
    pub detect_errors: Option<ErrorDetector>,
    /// Takes precedence over the schema's handler
    pub on_error: Option<ErrorHandler>,
    /// Cache successful results for this long
    pub cache_ttl: Option<Duration>,
}

impl fmt::Debug for Behaviors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviors")
            .field("parallel_limit", &self.parallel_limit)
            .field("retry", &self.retry)
            .field("detect_errors", &self.detect_errors.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl Behaviors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallel_limit(mut self, limit: usize) -> Self {
        self.parallel_limit = Some(limit.max(1));
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
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
}

/// One named unit of work
#[derive(Clone)]
pub struct DependencyNode {
    pub name: String,
    pub schema: Arc<Schema>,
    pub params: BTreeMap<String, ParameterBinding>,
    pub behaviors: Behaviors,
    pub formatter: Option<ResultFormatter>,
}

impl fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyNode")
            .field("name", &self.name)
            .field("schema", &self.schema.name)
            .field("params", &self.params)
            .field("behaviors", &self.behaviors)
            .field("formatted", &self.formatter.is_some())
            .finish()
    }
}

impl DependencyNode {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            name: name.into(),
            schema,
            params: BTreeMap::new(),
            behaviors: Behaviors::default(),
            formatter: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, binding: ParameterBinding) -> Self {
        self.params.insert(name.into(), binding);
        self
    }

    pub fn behaviors(mut self, behaviors: Behaviors) -> Self {
        self.behaviors = behaviors;
        self
    }

    pub fn format_with(
        mut self,
        formatter: impl Fn(Value, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Sibling nodes this node reads from, deduplicated, in parameter order
    pub fn source_nodes(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for binding in self.params.values() {
            for node in binding.source_nodes() {
                if !seen.contains(&node.as_str()) {
                    seen.push(node.as_str());
                }
            }
        }
        seen
    }

    /// `(parameter, input name)` pairs
    pub fn input_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().flat_map(|(param, binding)| {
            binding
                .input_names()
                .iter()
                .map(move |name| (param.as_str(), name.as_str()))
        })
    }

    /// `(parameter, node name)` pairs
    pub fn source_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().flat_map(|(param, binding)| {
            binding
                .source_nodes()
                .iter()
                .map(move |name| (param.as_str(), name.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("s", "mock"))
    }

    #[test]
    fn test_source_nodes_deduplicated() {
        let node = DependencyNode::new("n", schema())
            .param("a", ParameterBinding::source("x"))
            .param("b", ParameterBinding::sources(["x", "y"]))
            .param("c", ParameterBinding::input("region"));
        assert_eq!(node.source_nodes(), vec!["x", "y"]);
        assert_eq!(node.input_refs().collect::<Vec<_>>(), vec![("c", "region")]);
        assert_eq!(node.source_refs().count(), 3);
    }

    #[test]
    fn test_formatted_only_applies_to_references() {
        let literal = ParameterBinding::value(json!(1)).formatted(|_| json!(2));
        assert!(matches!(literal, ParameterBinding::Literal(_)));

        let input = ParameterBinding::input("x").formatted(|m| m["x"].clone());
        assert!(matches!(input, ParameterBinding::Input { formatter: Some(_), .. }));
    }

    #[test]
    fn test_behaviors_builder() {
        let behaviors = Behaviors::new()
            .parallel_limit(0)
            .cache_ttl(Duration::from_secs(5))
            .retry(RetryConfig::default().with_times(3));
        assert_eq!(behaviors.parallel_limit, Some(1));
        assert_eq!(behaviors.cache_ttl, Some(Duration::from_secs(5)));
        assert_eq!(behaviors.retry.times, 3);
    }
}
