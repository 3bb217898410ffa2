//! YAML graph definitions
//!
//! A definition names a schema per node and binds its parameters:
//!
//! ```yaml
//! config:
//!   debug: false
//! inputs:
//!   region: eu-west-1
//! nodes:
//!   groups:
//!     schema: synthetic.echo
//!     params:
//!       region: { input: region }
//!     behaviors:
//!       cache_ttl_ms: 60000
//!   streams:
//!     schema: synthetic.echo
//!     params:
//!       group: { source: groups, path: region }
//!       limit: { value: 10 }
//!       at: { generate: timestamp_ms }
//!     pick: group
//! ```
//!
//! Binding forms (serde auto-detects via untagged, one key each):
//! 1. `{ value: V }` literal
//! 2. `{ input: name | [names], path? }` external input(s)
//! 3. `{ source: node | [nodes], path? }` sibling output(s)
//! 4. `{ generate: timestamp_ms | timestamp_secs }` fresh per resolution

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::adapter::HttpAdapter;
use crate::collector::RetryConfig;
use crate::config::EngineConfig;
use crate::error::{QuarryError, Result};
use crate::graph::{Behaviors, DependencyGraph, DependencyNode, ParameterBinding};
use crate::orchestrator::Orchestrator;
use crate::schema::{ExecutionMode, Schema};
use crate::util::path;

/// Root of a graph definition file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDefinition {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    pub nodes: BTreeMap<String, NodeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDefinition {
    pub schema: String,
    #[serde(default)]
    pub params: BTreeMap<String, BindingDefinition>,
    #[serde(default)]
    pub behaviors: BehaviorDefinition,
    /// Keep only this path of the result
    #[serde(default)]
    pub pick: Option<String>,
}

/// One name or a list of names
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name],
            Self::Many(names) => names,
        }
    }
}

/// Order matters for serde untagged: each form rejects the others' keys
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BindingDefinition {
    Literal(LiteralBinding),
    Input(InputBinding),
    Source(SourceBinding),
    Generated(GeneratedBinding),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralBinding {
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputBinding {
    pub input: OneOrMany,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceBinding {
    pub source: OneOrMany,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedBinding {
    pub generate: GeneratorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    TimestampMs,
    TimestampSecs,
}

impl GeneratorKind {
    fn generate(self) -> Value {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        match self {
            Self::TimestampMs => Value::from(now.as_millis() as u64),
            Self::TimestampSecs => Value::from(now.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorDefinition {
    #[serde(default)]
    pub parallel_limit: Option<usize>,
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,
    #[serde(default)]
    pub retry: Option<RetryDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryDefinition {
    #[serde(default = "default_times")]
    pub times: u32,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub backoff: Option<f64>,
}

fn default_times() -> u32 {
    1
}

impl GraphDefinition {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Build the dependency graph, resolving schema names in `catalog`
    pub fn build(&self, catalog: &SchemaCatalog) -> Result<DependencyGraph> {
        let nodes = self
            .nodes
            .iter()
            .map(|(name, node)| node.build(name, catalog))
            .collect::<Result<Vec<_>>>()?;
        DependencyGraph::new(nodes)
    }

    /// Orchestrator with the built-in adapters, this file's config (env
    /// overrides applied) and its initial inputs
    pub fn into_orchestrator(self, catalog: &SchemaCatalog) -> Result<Orchestrator> {
        let graph = self.build(catalog)?;
        Ok(Orchestrator::builder(graph)
            .config(self.config.with_env())
            .inputs(self.inputs)
            .build())
    }
}

impl NodeDefinition {
    fn build(&self, name: &str, catalog: &SchemaCatalog) -> Result<DependencyNode> {
        let schema = catalog
            .get(&self.schema)
            .ok_or_else(|| QuarryError::UnknownSchema {
                node: name.to_string(),
                schema: self.schema.clone(),
            })?;

        let mut node = DependencyNode::new(name, schema).behaviors(self.behaviors.build());
        for (param, binding) in &self.params {
            node = node.param(param.clone(), binding.build());
        }
        if let Some(pick) = self.pick.clone() {
            node = node.format_with(move |raw, _| pluck(&raw, &pick));
        }
        Ok(node)
    }
}

impl BindingDefinition {
    fn build(&self) -> ParameterBinding {
        match self {
            Self::Literal(LiteralBinding { value }) => ParameterBinding::value(value.clone()),
            Self::Input(InputBinding { input, path }) => {
                with_path(ParameterBinding::inputs(input.clone().into_vec()), path)
            }
            Self::Source(SourceBinding { source, path }) => {
                with_path(ParameterBinding::sources(source.clone().into_vec()), path)
            }
            Self::Generated(GeneratedBinding { generate }) => {
                let kind = *generate;
                ParameterBinding::generated(move || kind.generate())
            }
        }
    }
}

/// Apply `path` to every referenced value
fn with_path(binding: ParameterBinding, path: &Option<String>) -> ParameterBinding {
    let Some(path) = path.clone() else {
        return binding;
    };
    binding.formatted(move |gathered| {
        let mut picked: Map<String, Value> = gathered
            .iter()
            .map(|(name, value)| (name.clone(), pluck(value, &path)))
            .collect();
        if picked.len() == 1 {
            if let Some((_, value)) = picked.iter_mut().next() {
                return value.take();
            }
        }
        Value::Object(picked)
    })
}

/// Value at `path`; for arrays, the path is applied to each element and
/// elements without it are dropped
fn pluck(value: &Value, at: &str) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter_map(|item| path::get(item, at).cloned())
                .collect(),
        ),
        other => path::get(other, at).cloned().unwrap_or(Value::Null),
    }
}

impl BehaviorDefinition {
    fn build(&self) -> Behaviors {
        let mut behaviors = Behaviors::new();
        if let Some(limit) = self.parallel_limit {
            behaviors = behaviors.parallel_limit(limit);
        }
        if let Some(ttl) = self.cache_ttl_ms {
            behaviors = behaviors.cache_ttl(Duration::from_millis(ttl));
        }
        if let Some(retry) = &self.retry {
            let mut config = RetryConfig::default()
                .with_times(retry.times)
                .with_interval(Duration::from_millis(retry.interval_ms));
            if let Some(multiplier) = retry.backoff {
                config = config.with_backoff_multiplier(multiplier);
            }
            behaviors = behaviors.retry(config);
        }
        behaviors
    }
}

/// Schema name → schema
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, Arc<Schema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas served by the built-in adapters
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            Schema::new("synthetic.echo", "synthetic")
                .method("echo")
                .mode(ExecutionMode::Synchronous),
        );
        catalog.register(HttpAdapter::request_schema());
        catalog.register(HttpAdapter::paged_schema());
        catalog
    }

    /// Register under the schema's own name
    pub fn register(&mut self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.schemas.insert(schema.name.clone(), Arc::clone(&schema));
        schema
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
inputs:
  region: eu-west-1
nodes:
  groups:
    schema: synthetic.echo
    params:
      region: { input: region }
      names: { value: [a, b] }
    behaviors:
      cache_ttl_ms: 1000
      retry: { times: 3, interval_ms: 5 }
  streams:
    schema: synthetic.echo
    params:
      group: { source: groups, path: region }
      at: { generate: timestamp_secs }
    pick: group
"#;

    #[test]
    fn test_parse_binding_forms() {
        let def = GraphDefinition::from_yaml(YAML).unwrap();
        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.inputs["region"], json!("eu-west-1"));

        let groups = &def.nodes["groups"];
        assert!(matches!(groups.params["region"], BindingDefinition::Input(_)));
        assert!(matches!(groups.params["names"], BindingDefinition::Literal(_)));
        assert_eq!(groups.behaviors.cache_ttl_ms, Some(1000));

        let streams = &def.nodes["streams"];
        assert!(matches!(streams.params["group"], BindingDefinition::Source(_)));
        assert!(matches!(
            streams.params["at"],
            BindingDefinition::Generated(GeneratedBinding {
                generate: GeneratorKind::TimestampSecs
            })
        ));
    }

    #[test]
    fn test_build_graph() {
        let def = GraphDefinition::from_yaml(YAML).unwrap();
        let graph = def.build(&SchemaCatalog::builtin()).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.has_path("groups", "streams"));
        let groups = graph.node("groups").unwrap();
        assert_eq!(groups.behaviors.retry.times, 3);
        assert_eq!(groups.behaviors.cache_ttl, Some(Duration::from_secs(1)));
        assert!(graph.node("streams").unwrap().formatter.is_some());
    }

    #[test]
    fn test_unknown_schema() {
        let def = GraphDefinition::from_yaml("nodes:\n  a:\n    schema: nope.nope\n").unwrap();
        let err = def.build(&SchemaCatalog::builtin()).unwrap_err();
        assert_eq!(err.code(), "QRY-008");
    }

    #[test]
    fn test_unknown_binding_form_rejected() {
        let yaml = "nodes:\n  a:\n    schema: synthetic.echo\n    params:\n      x: { from: b }\n";
        let err = GraphDefinition::from_yaml(yaml).unwrap_err();
        assert_eq!(err.code(), "QRY-001");
    }

    #[test]
    fn test_pluck() {
        assert_eq!(pluck(&json!({"a": {"b": 1}}), "a.b"), json!(1));
        assert_eq!(pluck(&json!([{"id": 1}, {"x": 2}, {"id": 3}]), "id"), json!([1, 3]));
        assert_eq!(pluck(&json!({"a": 1}), "missing"), Value::Null);
    }

    #[test]
    fn test_path_binding_formatter() {
        let binding = with_path(ParameterBinding::sources(["x", "y"]), &Some("id".into()));
        let ParameterBinding::Source {
            formatter: Some(format),
            ..
        } = binding
        else {
            panic!("expected formatted source binding");
        };
        let mut gathered = Map::new();
        gathered.insert("x".into(), json!({"id": 1}));
        gathered.insert("y".into(), json!([{"id": 2}]));
        assert_eq!(format(&gathered), json!({"x": 1, "y": [2]}));

        gathered.remove("y");
        assert_eq!(format(&gathered), json!(1));
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = SchemaCatalog::builtin();
        assert_eq!(catalog.names(), vec!["http.paged", "http.request", "synthetic.echo"]);
    }
}
