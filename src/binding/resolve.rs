//! Parameter resolution

use serde_json::{Map, Value};

use crate::error::{QuarryError, Result};
use crate::graph::{BindingFormatter, DependencyNode, ParameterBinding};
use crate::schema::Params;
use crate::store::NodeOutputs;
use crate::util::path;

/// Values visible to a node while its parameters are resolved
#[derive(Clone, Copy)]
pub struct BindingContext<'a> {
    /// Stored inputs at run start
    pub inputs: &'a Value,
    /// One-shot overrides for this run
    pub overrides: &'a Value,
    pub outputs: &'a NodeOutputs,
}

impl<'a> BindingContext<'a> {
    pub fn new(inputs: &'a Value, overrides: &'a Value, outputs: &'a NodeOutputs) -> Self {
        Self {
            inputs,
            overrides,
            outputs,
        }
    }

    /// Input value at `name`, overrides taking precedence
    pub fn input(&self, name: &str) -> Option<&'a Value> {
        path::get(self.overrides, name).or_else(|| path::get(self.inputs, name))
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }
}

/// Resolve every binding of `node`
pub fn resolve_params(node: &DependencyNode, ctx: &BindingContext<'_>) -> Result<Params> {
    let mut params = Params::new();

    for (param, binding) in &node.params {
        let value = match binding {
            ParameterBinding::Literal(value) => value.clone(),
            ParameterBinding::Generated(generate) => generate(),
            ParameterBinding::Input { names, formatter } => {
                let mut gathered = Map::new();
                for name in names {
                    let value = ctx.input(name).ok_or_else(|| QuarryError::BindingError {
                        node: node.name.clone(),
                        param: param.clone(),
                        reason: format!("input '{}' is not set", name),
                    })?;
                    gathered.insert(name.clone(), value.clone());
                }
                combine(gathered, formatter.as_ref())
            }
            ParameterBinding::Source { nodes, formatter } => {
                let mut gathered = Map::new();
                for source in nodes {
                    let output = ctx.outputs.get(source).ok_or_else(|| QuarryError::BindingError {
                        node: node.name.clone(),
                        param: param.clone(),
                        reason: format!("node '{}' has not produced an output", source),
                    })?;
                    gathered.insert(source.clone(), (*output).clone());
                }
                combine(gathered, formatter.as_ref())
            }
        };
        params.insert(param.clone(), value);
    }

    Ok(params)
}

/// A formatter sees every referenced value by name. Without one, a single
/// reference yields its value and several yield the name → value object.
fn combine(gathered: Map<String, Value>, formatter: Option<&BindingFormatter>) -> Value {
    if let Some(format) = formatter {
        return format(&gathered);
    }
    if gathered.len() == 1 {
        if let Some((_, value)) = gathered.into_iter().next() {
            return value;
        }
        return Value::Null;
    }
    Value::Object(gathered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;
    use std::sync::Arc;

    fn node() -> DependencyNode {
        DependencyNode::new("n", Arc::new(Schema::new("s", "mock")))
    }

    #[test]
    fn test_literal_and_generated() {
        let node = node()
            .param("a", ParameterBinding::value(json!(1)))
            .param("b", ParameterBinding::generated(|| json!("fresh")));
        let outputs = NodeOutputs::new();
        let ctx = BindingContext::new(&Value::Null, &Value::Null, &outputs);

        let params = resolve_params(&node, &ctx).unwrap();
        assert_eq!(params["a"], json!(1));
        assert_eq!(params["b"], json!("fresh"));
    }

    #[test]
    fn test_overrides_shadow_inputs() {
        let node = node()
            .param("region", ParameterBinding::input("aws.region"))
            .param("user", ParameterBinding::input("user"));
        let inputs = json!({"aws": {"region": "eu"}, "user": "ada"});
        let overrides = json!({"aws": {"region": "us"}});
        let outputs = NodeOutputs::new();
        let ctx = BindingContext::new(&inputs, &overrides, &outputs);

        let params = resolve_params(&node, &ctx).unwrap();
        assert_eq!(params["region"], json!("us"));
        assert_eq!(params["user"], json!("ada"));
    }

    #[test]
    fn test_sources_single_and_multiple() {
        let outputs = NodeOutputs::new();
        outputs.insert(Arc::from("x"), json!([1]));
        outputs.insert(Arc::from("y"), json!([2]));
        let node = node()
            .param("one", ParameterBinding::source("x"))
            .param("both", ParameterBinding::sources(["x", "y"]))
            .param(
                "joined",
                ParameterBinding::sources(["x", "y"]).formatted(|m| {
                    json!([m["x"][0].clone(), m["y"][0].clone()])
                }),
            );
        let ctx = BindingContext::new(&Value::Null, &Value::Null, &outputs);

        let params = resolve_params(&node, &ctx).unwrap();
        assert_eq!(params["one"], json!([1]));
        assert_eq!(params["both"], json!({"x": [1], "y": [2]}));
        assert_eq!(params["joined"], json!([1, 2]));
    }

    #[test]
    fn test_missing_reference_is_binding_error() {
        let node = node().param("a", ParameterBinding::source("ghost"));
        let outputs = NodeOutputs::new();
        let ctx = BindingContext::new(&Value::Null, &Value::Null, &outputs);

        let err = resolve_params(&node, &ctx).unwrap_err();
        assert_eq!(err.code(), "QRY-023");
        assert!(!ctx.has_input("anything"));
    }
}
