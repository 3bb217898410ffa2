//! Run loop: validation, DAG scheduling and per-node execution

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use super::{Orchestrator, Resolution, ResolveRequest, ResultMap};
use crate::binding::{resolve_params, BindingContext};
use crate::collector::panic_message;
use crate::error::{QuarryError, Result};
use crate::event::{EventKind, EventLog};
use crate::graph::validate::validate_inputs;
use crate::graph::{DependencyNode, ExecutionPlan};
use crate::metrics::{CallMetrics, CallRecorder, RunMetrics};
use crate::store::NodeOutputs;
use crate::util::path;

/// What one node's execution produced
struct NodeOutcome {
    name: Arc<str>,
    metrics_key: String,
    metrics: CallMetrics,
    result: Result<Value>,
}

impl Orchestrator {
    /// Resolve the requested targets (or the whole graph)
    ///
    /// Fails fast: the first node error aborts the run and no partial
    /// result map is returned.
    #[instrument(skip(self, request), fields(targets = ?request.targets))]
    pub async fn resolve(&self, request: ResolveRequest) -> Resolution {
        let events = EventLog::new();
        let mut metrics = RunMetrics::new();
        let result = self.run(&request, &events, &mut metrics).await;

        match &result {
            Ok(map) => {
                info!(nodes = map.len(), calls = metrics.total_calls(), "run completed");
            }
            Err(e) => {
                error!(error = %e, "run failed");
                events.emit(EventKind::RunFailed {
                    error: e.to_string(),
                    failed_node: e.failed_node().map(Arc::from),
                });
            }
        }

        Resolution {
            result,
            metrics,
            events,
        }
    }

    /// Resolve, then hand `(error, result, metrics)` to `callback`
    ///
    /// A panic inside the callback is caught and logged; it never reaches
    /// the engine or the caller.
    pub async fn resolve_with<F>(&self, request: ResolveRequest, callback: F) -> Resolution
    where
        F: FnOnce(Option<&QuarryError>, Option<&ResultMap>, &RunMetrics),
    {
        let resolution = self.resolve(request).await;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &resolution.result {
            Ok(map) => callback(None, Some(map), &resolution.metrics),
            Err(e) => callback(Some(e), None, &resolution.metrics),
        }));
        if let Err(payload) = outcome {
            let error = QuarryError::CallbackError {
                reason: panic_message(payload.as_ref()),
            };
            error!(error = %error, "error in completion callback");
        }

        resolution
    }

    /// Validate everything a run depends on before any call is issued
    fn prepare(&self, request: &ResolveRequest) -> Result<ExecutionPlan> {
        self.graph.validate()?;
        let plan = self.graph.plan(&request.targets)?;
        validate_inputs(&self.graph, &plan, |name| {
            path::get(&request.overrides, name).is_some() || self.inputs.contains(name)
        })?;
        Ok(plan)
    }

    async fn run(
        &self,
        request: &ResolveRequest,
        events: &EventLog,
        metrics: &mut RunMetrics,
    ) -> Result<ResultMap> {
        let started = Instant::now();
        let plan = self.prepare(request)?;
        events.emit(EventKind::RunStarted {
            targets: request.targets.clone(),
            node_count: plan.len(),
        });

        let inputs = self.inputs.snapshot();
        let mut formatter_inputs = inputs.clone();
        path::deep_merge(&mut formatter_inputs, &request.overrides);

        let outputs = NodeOutputs::new();
        let ctx = BindingContext::new(&inputs, &request.overrides, &outputs);
        let mut pending: Vec<Arc<str>> = plan.order().to_vec();
        let mut running = FuturesUnordered::new();

        loop {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|name| {
                self.graph
                    .get_dependencies(name)
                    .iter()
                    .all(|dep| outputs.contains(dep))
            });
            pending = waiting;

            for name in ready {
                let Some(node) = self.graph.node(&name) else {
                    continue;
                };
                events.emit(EventKind::NodeScheduled {
                    node: Arc::clone(&name),
                    dependencies: self.graph.get_dependencies(&name).to_vec(),
                });
                running.push(self.run_node(Arc::clone(node), name, ctx, &formatter_inputs, events));
            }

            let Some(outcome) = running.next().await else {
                if pending.is_empty() {
                    break;
                }
                let names: Vec<&str> = pending.iter().map(|name| name.as_ref()).collect();
                return Err(QuarryError::Deadlock {
                    pending: names.join(", "),
                });
            };

            metrics.insert(outcome.metrics_key, outcome.metrics);
            match outcome.result {
                Ok(value) => outputs.insert(outcome.name, value),
                Err(e) => {
                    return Err(QuarryError::NodeFailed {
                        node: outcome.name.to_string(),
                        error: Box::new(e),
                    })
                }
            }
        }

        events.emit(EventKind::RunCompleted {
            node_count: outputs.len(),
            total_duration_ms: started.elapsed().as_millis() as u64,
        });
        Ok(outputs.to_map())
    }

    /// Bind params, serve from cache or call the collector, then format
    #[instrument(skip(self, node, name, ctx, formatter_inputs, events), fields(node = %name))]
    async fn run_node(
        &self,
        node: Arc<DependencyNode>,
        name: Arc<str>,
        ctx: BindingContext<'_>,
        formatter_inputs: &Value,
        events: &EventLog,
    ) -> NodeOutcome {
        let metrics_key = RunMetrics::key(&node.name, &node.schema);
        let started = Instant::now();

        let params = match resolve_params(&node, &ctx) {
            Ok(params) => params,
            Err(e) => return self.failed(name, metrics_key, CallMetrics::default(), e, events),
        };

        let ttl = node.behaviors.cache_ttl;
        if let Some(raw) = ttl.and_then(|ttl| self.cache.get_fresh(&node.name, &params, ttl)) {
            // Cache hits complete asynchronously like live calls
            tokio::task::yield_now().await;
            debug!("served from cache");
            let recorder = CallRecorder::new();
            recorder.mark_cached();
            events.emit(EventKind::NodeCacheHit {
                node: Arc::clone(&name),
            });
            return NodeOutcome {
                result: Ok(format_result(&node, raw, formatter_inputs)),
                metrics: recorder.snapshot(),
                metrics_key,
                name,
            };
        }

        events.emit(EventKind::NodeStarted {
            node: Arc::clone(&name),
            params: if self.config.debug {
                Value::Object(params.clone())
            } else {
                Value::Null
            },
        });

        let collection = self
            .collector
            .execute(&node.schema, params.clone(), &node.behaviors)
            .await;

        match collection.result {
            Ok(raw) => {
                if let Some(ttl) = ttl {
                    self.cache.insert(Arc::clone(&name), params, raw.clone(), ttl);
                }
                events.emit(EventKind::NodeCompleted {
                    node: Arc::clone(&name),
                    calls: collection.metrics.total_calls(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                NodeOutcome {
                    result: Ok(format_result(&node, raw, formatter_inputs)),
                    metrics: collection.metrics,
                    metrics_key,
                    name,
                }
            }
            Err(e) => self.failed(name, metrics_key, collection.metrics, e, events),
        }
    }

    fn failed(
        &self,
        name: Arc<str>,
        metrics_key: String,
        metrics: CallMetrics,
        error: QuarryError,
        events: &EventLog,
    ) -> NodeOutcome {
        events.emit(EventKind::NodeFailed {
            node: Arc::clone(&name),
            error: error.to_string(),
        });
        NodeOutcome {
            name,
            metrics_key,
            metrics,
            result: Err(error),
        }
    }
}

/// The formatter sees the raw result plus inputs merged with overrides
fn format_result(node: &DependencyNode, raw: Value, inputs: &Value) -> Value {
    match &node.formatter {
        Some(format) => format(raw, inputs),
        None => raw,
    }
}
