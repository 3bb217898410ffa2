//! Graph Module - nodes, bindings, dependency graph and planning
//!
//! - `node`: DependencyNode, ParameterBinding, Behaviors
//! - `flow`: DependencyGraph (edges from source bindings)
//! - `plan`: ExecutionPlan (target closure in dependency order)
//! - `validate`: reference and name validation

mod flow;
mod node;
mod plan;
pub mod validate;

pub use flow::DependencyGraph;
pub use node::{
    Behaviors, BindingFormatter, DependencyNode, Generator, ParameterBinding, ResultFormatter,
};
pub use plan::ExecutionPlan;
