//! Binding Module - parameter resolution for one node
//!
//! Turns a node's `ParameterBinding`s into a concrete parameter set:
//! literals are copied, inputs are read from the input snapshot (run
//! overrides first), sources are read from the outputs of finished
//! siblings, and generated values are computed fresh.
//!
//! Data flow:
//! ```text
//! DependencyNode.params ──┐
//! inputs + overrides ─────┼─→ resolve_params ─→ Params ─→ Collector
//! NodeOutputs ────────────┘
//! ```

mod resolve;

pub use resolve::{resolve_params, BindingContext};
