//! Execution plan: targets plus their transitive dependency closure
//!
//! Built by recursive descent: planning a node first plans every node it
//! reads, short-circuiting on nodes already scheduled. The resulting order
//! lists dependencies before dependents.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{QuarryError, Result};

use super::flow::DependencyGraph;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    order: Vec<Arc<str>>,
}

impl ExecutionPlan {
    /// Plan `targets` (empty = every node)
    pub fn build(graph: &DependencyGraph, targets: &[String]) -> Result<Self> {
        let roots: Vec<Arc<str>> = if targets.is_empty() {
            graph.names().to_vec()
        } else {
            targets
                .iter()
                .map(|target| {
                    if graph.contains(target) {
                        Ok(Arc::from(target.as_str()))
                    } else {
                        Err(QuarryError::UnknownTarget {
                            target: target.clone(),
                        })
                    }
                })
                .collect::<Result<_>>()?
        };

        let mut planner = Planner {
            graph,
            order: Vec::with_capacity(graph.len()),
            scheduled: HashSet::with_capacity(graph.len()),
            stack: Vec::new(),
        };
        for root in &roots {
            planner.visit(root)?;
        }

        Ok(Self {
            order: planner.order,
        })
    }

    /// Nodes in dependency order
    pub fn order(&self) -> &[Arc<str>] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n.as_ref() == name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct Planner<'g> {
    graph: &'g DependencyGraph,
    order: Vec<Arc<str>>,
    scheduled: HashSet<Arc<str>>,
    stack: Vec<Arc<str>>,
}

impl Planner<'_> {
    fn visit(&mut self, name: &Arc<str>) -> Result<()> {
        if self.scheduled.contains(name) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut cycle: Vec<&str> = self.stack[pos..].iter().map(|n| n.as_ref()).collect();
            cycle.push(name);
            return Err(QuarryError::CycleDetected {
                cycle: cycle.join(" -> "),
            });
        }

        self.stack.push(Arc::clone(name));
        let graph = self.graph;
        for dep in graph.get_dependencies(name) {
            // Unknown sources are reported by reference validation
            if graph.contains(dep) {
                self.visit(dep)?;
            }
        }
        self.stack.pop();

        self.scheduled.insert(Arc::clone(name));
        self.order.push(Arc::clone(name));
        Ok(())
    }
}
