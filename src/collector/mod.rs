//! Collector execution engine
//!
//! Fetches one dependency: fills missing required parameters from default
//! sources, fans the parameter set out into concrete calls, drives each
//! call through pagination and retry, and merges the per-call results.
//!
//! ```text
//! execute(schema, params, behaviors)
//!   └─ lookup            default sources, resolved recursively
//!        └─ fan-out      one concrete parameter set per call
//!             └─ fetch_all       pagination
//!                  └─ request    retry + error detection
//! ```

mod fanout;
mod paginate;
mod retry;

pub use fanout::expand;
pub use retry::{RetryConfig, RetryExhausted, RetryPolicy};
pub(crate) use retry::panic_message;

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::adapter::{AdapterConfig, AdapterRegistry};
use crate::config::EngineConfig;
use crate::error::{debug_detail, QuarryError, Result};
use crate::graph::Behaviors;
use crate::metrics::{CallMetrics, CallRecorder};
use crate::schema::{ExecutionMode, Params, Schema};
use crate::util::constants::ADAPTER_CONFIG_PARAM;
use crate::util::{path, value};

/// Outcome of one `execute`: the merged result and the work it took
#[derive(Debug)]
pub struct Collection {
    pub result: Result<Value>,
    pub metrics: CallMetrics,
}

/// Executes schemas against the adapters of a registry
#[derive(Clone)]
pub struct Collector {
    registry: AdapterRegistry,
    config: Arc<EngineConfig>,
}

impl Collector {
    pub fn new(registry: AdapterRegistry, config: Arc<EngineConfig>) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch one dependency
    #[instrument(skip(self, schema, params, behaviors), fields(schema = %schema.name))]
    pub async fn execute(&self, schema: &Schema, params: Params, behaviors: &Behaviors) -> Collection {
        let recorder = CallRecorder::new();
        let result = self.lookup(schema, params, behaviors, &recorder, Vec::new()).await;
        Collection {
            result,
            metrics: recorder.snapshot(),
        }
    }

    /// Resolve missing required parameters through default sources, then
    /// run the request
    ///
    /// `chain` holds the schemas currently being resolved above this one.
    fn lookup<'a>(
        &'a self,
        schema: &'a Schema,
        params: Params,
        behaviors: &'a Behaviors,
        recorder: &'a CallRecorder,
        chain: Vec<String>,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            let mut params = params;

            if chain.contains(&schema.name) || chain.len() > self.config.max_default_source_depth {
                let mut links = chain.clone();
                links.push(schema.name.clone());
                return Err(QuarryError::DefaultSourceCycle {
                    schema: chain.first().cloned().unwrap_or_else(|| schema.name.clone()),
                    chain: links.join(" -> "),
                });
            }

            let mut effective = schema.params.clone();
            effective.extend(params.clone());

            let mut defaults = Vec::new();
            for name in schema.missing_required(&effective) {
                let default = schema
                    .required
                    .get(name)
                    .and_then(|descriptor| descriptor.default_source.clone());
                match default {
                    Some(default) => defaults.push((name.to_string(), default)),
                    None => {
                        return Err(QuarryError::MissingParameter {
                            schema: schema.name.clone(),
                            param: name.to_string(),
                            detail: debug_detail(self.config.debug, "params", &params),
                        })
                    }
                }
            }

            if !defaults.is_empty() {
                let mut chain = chain;
                chain.push(schema.name.clone());

                // Default sources only inherit the caller's adapter config
                let mut inherited = Params::new();
                if let Some(config) = params.get(ADAPTER_CONFIG_PARAM) {
                    inherited.insert(ADAPTER_CONFIG_PARAM.to_string(), config.clone());
                }

                let lookups = defaults.iter().map(|(name, default)| {
                    let child = recorder.child(format!("{}.{}.{}", name, default.source, default.name));
                    let inherited = inherited.clone();
                    let chain = chain.clone();
                    async move {
                        debug!(schema = %schema.name, param = %name, default = %default.name, "resolving default source");
                        let value = self.lookup(default, inherited, behaviors, &child, chain).await?;
                        Ok::<_, QuarryError>((name.clone(), value))
                    }
                });

                for (name, value) in try_join_all(lookups).await? {
                    if value.is_null() {
                        return Err(QuarryError::MissingParameter {
                            schema: schema.name.clone(),
                            param: name,
                            detail: debug_detail(self.config.debug, "params", &params),
                        });
                    }
                    params.insert(name, value);
                }
            }

            let mut result = self.execute_request(schema, params, behaviors, recorder).await?;
            if let (Some(key), Value::Array(items)) = (&schema.result.sort_by, &mut result) {
                items.sort_by(|a, b| value::compare(path::get(a, key), path::get(b, key)));
            }
            Ok(result)
        }
        .boxed()
    }

    /// Fan out and issue every concrete call, then merge per-call results
    async fn execute_request(
        &self,
        schema: &Schema,
        params: Params,
        behaviors: &Behaviors,
        recorder: &CallRecorder,
    ) -> Result<Value> {
        let sets = fanout::expand(schema, &params, self.config.debug)?;

        let adapter = self
            .registry
            .get(&schema.source)
            .ok_or_else(|| QuarryError::AdapterLookup {
                source_name: schema.source.clone(),
                schema: schema.name.clone(),
            })?;
        let adapter = adapter.as_ref();

        let synchronous = self.synchronicity(schema, &sets)?;
        debug!(schema = %schema.name, calls = sets.len(), synchronous, "issuing calls");

        let results: Vec<Value> = if !synchronous && schema.mode == ExecutionMode::Parallel {
            let limit = behaviors.parallel_limit.unwrap_or(sets.len()).max(1);
            stream::iter(sets)
                .map(|set| self.fetch_all(schema, adapter, set, behaviors, recorder, false))
                .buffered(limit)
                .try_collect()
                .await?
        } else {
            let mut results = Vec::with_capacity(sets.len());
            for set in sets {
                results.push(
                    self.fetch_all(schema, adapter, set, behaviors, recorder, synchronous)
                        .await?,
                );
            }
            results
        };

        Ok(match &schema.merge_calls {
            Some(merge) => merge(results),
            None => value::flatten(results),
        })
    }

    /// Decide once for the whole call whether it runs synchronously
    ///
    /// `apiConfig.synchronous` overrides the schema's mode per set; the sets
    /// must agree.
    fn synchronicity(&self, schema: &Schema, sets: &[Params]) -> Result<bool> {
        let default = schema.mode == ExecutionMode::Synchronous;
        let mut decided = None;

        for set in sets {
            let config = AdapterConfig::from_params(&schema.name, set)?;
            let synchronous = config.synchronous.unwrap_or(default);
            match decided {
                None => decided = Some(synchronous),
                Some(previous) if previous != synchronous => {
                    return Err(QuarryError::MixedSynchronicity {
                        schema: schema.name.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(decided.unwrap_or(default))
    }
}
