//! Graph Validation - reference checks run before any call
//!
//! Validates:
//! - Node name format
//! - Source bindings point at existing nodes (whole graph, even outside
//!   the requested targets)
//! - Input bindings of planned nodes resolve against stored inputs or the
//!   run's overrides
//!
//! Error codes:
//! - QRY-002: source references unknown node
//! - QRY-003: input references a name absent from inputs and overrides
//! - QRY-007: invalid node name

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{QuarryError, Result};

use super::flow::DependencyGraph;
use super::plan::ExecutionPlan;

static NODE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("node name regex is valid"));

/// Validate a node name (letters, digits, `_`, `-`; no dots)
pub fn validate_node_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(QuarryError::InvalidNodeName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if !NODE_NAME.is_match(name) {
        return Err(QuarryError::InvalidNodeName {
            name: name.to_string(),
            reason: "must start with a letter or '_' and contain only letters, digits, '_' or '-'"
                .to_string(),
        });
    }
    Ok(())
}

/// Every source binding in the graph must name an existing node
pub fn validate_sources(graph: &DependencyGraph) -> Result<()> {
    for node in graph.nodes() {
        for (param, reference) in node.source_refs() {
            if !graph.contains(reference) {
                return Err(QuarryError::UnknownSource {
                    node: node.name.clone(),
                    param: param.to_string(),
                    reference: reference.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Every input binding of a planned node must resolve
pub fn validate_inputs(
    graph: &DependencyGraph,
    plan: &ExecutionPlan,
    has_input: impl Fn(&str) -> bool,
) -> Result<()> {
    for name in plan.order() {
        let Some(node) = graph.node(name) else { continue };
        for (param, input) in node.input_refs() {
            if !has_input(input) {
                return Err(QuarryError::UnknownInput {
                    node: node.name.clone(),
                    param: param.to_string(),
                    input: input.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{DependencyNode, ParameterBinding};
    use crate::schema::Schema;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("s", "mock"))
    }

    #[test]
    fn node_names() {
        assert!(validate_node_name("dataSource1").is_ok());
        assert!(validate_node_name("_private-node").is_ok());
        assert!(validate_node_name("").is_err());
        assert!(validate_node_name("1st").is_err());
        assert!(validate_node_name("a.b").is_err());
    }

    #[test]
    fn inputs_checked_only_for_planned_nodes() {
        let graph = DependencyGraph::new([
            DependencyNode::new("a", schema()).param("x", ParameterBinding::input("present")),
            DependencyNode::new("b", schema()).param("y", ParameterBinding::input("absent")),
        ])
        .unwrap();

        let only_a = graph.plan(&["a".to_string()]).unwrap();
        assert!(validate_inputs(&graph, &only_a, |name| name == "present").is_ok());

        let all = graph.plan(&[]).unwrap();
        let err = validate_inputs(&graph, &all, |name| name == "present").unwrap_err();
        assert!(matches!(err, QuarryError::UnknownInput { ref input, .. } if input == "absent"));
    }

    #[test]
    fn sources_checked_graph_wide() {
        let graph = DependencyGraph::new([
            DependencyNode::new("ok", schema()),
            DependencyNode::new("m", schema()).param("p", ParameterBinding::source("z")),
        ])
        .unwrap();
        let err = validate_sources(&graph).unwrap_err();
        assert!(err.to_string().contains("invalid source 'z'"));
    }
}
