//! Quarry - declarative data-dependency graph resolver
//!
//! Nodes name a schema (the call contract of a data source) and bind its
//! parameters to literals, external inputs, sibling outputs or generated
//! values. Resolving a target plans its dependency closure, runs ready
//! nodes concurrently and returns one merged result per node.
//!
//! Architecture:
//! ```text
//! Orchestrator ─ graph, TTL cache, inputs, adapter registry
//!   └─ Collector ─ one dependency
//!        ├─ default sources (recursive)
//!        ├─ fan-out of multi-valued params
//!        ├─ pagination
//!        └─ retry around one Adapter call
//! ```

pub mod adapter;
pub mod binding;
pub mod collector;
pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod graph;
pub mod metrics;
pub mod orchestrator;
pub mod schema;
pub mod store;
pub mod util;

pub use adapter::{
    Adapter, AdapterCall, AdapterConfig, AdapterFailure, AdapterOverride, AdapterRegistry,
    FunctionAdapter, HttpAdapter, MockAdapter,
};
pub use collector::{Collection, Collector, RetryConfig};
pub use config::EngineConfig;
pub use definition::{GraphDefinition, SchemaCatalog};
pub use error::{FixSuggestion, QuarryError, Result};
pub use event::{Event, EventKind, EventLog};
pub use graph::{Behaviors, DependencyGraph, DependencyNode, ExecutionPlan, ParameterBinding};
pub use metrics::{CallMetrics, RunMetrics};
pub use orchestrator::{Orchestrator, Resolution, ResolveRequest, ResultMap};
pub use schema::{ExecutionMode, NextPage, Pagination, ParamDescriptor, Params, Schema};
