//! Dependency graph built from nodes (Arc<str> optimized)
//!
//! Edges come from SiblingSource bindings: `a → b` when `b` reads `a`.
//! References to unknown nodes are kept so validation can report them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{QuarryError, Result};

use super::node::DependencyNode;
use super::plan::ExecutionPlan;
use super::validate;

/// Graph of data dependencies
///
/// Uses Arc<str> internally for zero-cost cloning of node names.
pub struct DependencyGraph {
    nodes: HashMap<Arc<str>, Arc<DependencyNode>>,
    /// node -> nodes reading it
    adjacency: HashMap<Arc<str>, Vec<Arc<str>>>,
    /// node -> nodes it reads (dependencies)
    predecessors: HashMap<Arc<str>, Vec<Arc<str>>>,
    /// All node names in declaration order
    names: Vec<Arc<str>>,
}

impl DependencyGraph {
    /// Build a graph, rejecting invalid or duplicate node names
    pub fn new(nodes: impl IntoIterator<Item = DependencyNode>) -> Result<Self> {
        let nodes: Vec<DependencyNode> = nodes.into_iter().collect();
        let capacity = nodes.len();
        let mut by_name: HashMap<Arc<str>, Arc<DependencyNode>> = HashMap::with_capacity(capacity);
        let mut names: Vec<Arc<str>> = Vec::with_capacity(capacity);

        for node in nodes {
            validate::validate_node_name(&node.name)?;
            let name: Arc<str> = Arc::from(node.name.as_str());
            if by_name.contains_key(&name) {
                return Err(QuarryError::DuplicateNode {
                    name: node.name.clone(),
                });
            }
            names.push(Arc::clone(&name));
            by_name.insert(name, Arc::new(node));
        }

        let mut adjacency: HashMap<Arc<str>, Vec<Arc<str>>> = HashMap::with_capacity(capacity);
        let mut predecessors: HashMap<Arc<str>, Vec<Arc<str>>> = HashMap::with_capacity(capacity);

        for name in &names {
            adjacency.entry(Arc::clone(name)).or_default();
            let deps: Vec<Arc<str>> = by_name[name]
                .source_nodes()
                .into_iter()
                .map(|dep| {
                    // Reuse the node's Arc when it exists
                    by_name
                        .get_key_value(dep)
                        .map(|(key, _)| Arc::clone(key))
                        .unwrap_or_else(|| Arc::from(dep))
                })
                .collect();

            for dep in &deps {
                adjacency
                    .entry(Arc::clone(dep))
                    .or_default()
                    .push(Arc::clone(name));
            }
            predecessors.insert(Arc::clone(name), deps);
        }

        Ok(Self {
            nodes: by_name,
            adjacency,
            predecessors,
            names,
        })
    }

    pub fn node(&self, name: &str) -> Option<&Arc<DependencyNode>> {
        self.nodes.get(name)
    }

    /// Node names in declaration order
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<DependencyNode>> {
        self.names.iter().filter_map(|name| self.nodes.get(name))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get dependencies of a node (returns Arc<str> slice)
    #[inline]
    pub fn get_dependencies(&self, name: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.predecessors
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Get nodes that read this node's output
    #[inline]
    pub fn get_dependents(&self, name: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.adjacency
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Nodes without dependencies
    pub fn roots(&self) -> Vec<Arc<str>> {
        self.names
            .iter()
            .filter(|name| self.get_dependencies(name).is_empty())
            .cloned()
            .collect()
    }

    /// Check if `to` (transitively) reads `from` (BFS)
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.get_dependents(current) {
                if neighbor.as_ref() == to {
                    return true;
                }
                if visited.insert(neighbor.as_ref()) {
                    queue.push_back(neighbor.as_ref());
                }
            }
        }

        false
    }

    /// Graph-wide checks: every source reference exists and there is no cycle
    pub fn validate(&self) -> Result<()> {
        validate::validate_sources(self)?;
        ExecutionPlan::build(self, &[])?;
        Ok(())
    }

    /// Plan the targets plus their transitive dependencies (empty = all)
    pub fn plan(&self, targets: &[String]) -> Result<ExecutionPlan> {
        ExecutionPlan::build(self, targets)
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("nodes", &self.names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ParameterBinding;
    use crate::schema::Schema;

    fn node(name: &str, sources: &[&str]) -> DependencyNode {
        let schema = Arc::new(Schema::new("s", "mock"));
        sources.iter().enumerate().fold(DependencyNode::new(name, schema), |n, (i, src)| {
            n.param(format!("p{i}"), ParameterBinding::source(*src))
        })
    }

    #[test]
    fn test_edges() {
        let graph = DependencyGraph::new([
            node("groups", &[]),
            node("streams", &["groups"]),
            node("events", &["groups", "streams"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.get_dependencies("events").len(), 2);
        assert_eq!(graph.get_dependents("groups").len(), 2);
        assert_eq!(graph.roots(), vec![Arc::<str>::from("groups")]);
        assert!(graph.has_path("groups", "events"));
        assert!(!graph.has_path("events", "groups"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = DependencyGraph::new([node("a", &[]), node("a", &[])]).unwrap_err();
        assert_eq!(err.code(), "QRY-006");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = DependencyGraph::new([node("has space", &[])]).unwrap_err();
        assert_eq!(err.code(), "QRY-007");
    }

    #[test]
    fn test_unknown_source_kept_for_validation() {
        let graph = DependencyGraph::new([node("m", &["z"])]).unwrap();
        assert_eq!(graph.get_dependencies("m")[0].as_ref(), "z");
        assert_eq!(graph.validate().unwrap_err().code(), "QRY-002");
    }

    #[test]
    fn test_cycle_rejected_graph_wide() {
        let graph = DependencyGraph::new([node("a", &["b"]), node("b", &["a"]), node("c", &[])]).unwrap();
        let err = graph.validate().unwrap_err();
        assert_eq!(err.code(), "QRY-005");
    }
}
