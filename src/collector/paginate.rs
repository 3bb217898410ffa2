//! Pagination driver
//!
//! Requests a page, extracts its result and merges it into the running
//! collection. While the response reports itself incomplete the schema
//! builds next-page params: one set continues serially, several sets are
//! fetched concurrently (each following its own chain) and folded in one
//! by one, in order.

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use super::Collector;
use crate::adapter::Adapter;
use crate::error::{debug_detail, QuarryError, Result};
use crate::graph::Behaviors;
use crate::metrics::CallRecorder;
use crate::schema::{NextPage, Params, ResultLocator, Schema};
use crate::util::{path, value};

impl Collector {
    /// Fetch every page reachable from `params`
    pub(super) fn fetch_all<'a>(
        &'a self,
        schema: &'a Schema,
        adapter: &'a dyn Adapter,
        params: Params,
        behaviors: &'a Behaviors,
        recorder: &'a CallRecorder,
        synchronous: bool,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            let mut params = params;
            let mut page_number = 1usize;

            let response = self
                .request(schema, adapter, &params, behaviors, recorder, synchronous)
                .await?;
            recorder.record_page();
            let mut collected = self.extract(schema, &response)?;
            let mut response = response;

            loop {
                let Some(pagination) = &schema.pagination else {
                    break;
                };
                if !pagination.is_incomplete(&response) {
                    break;
                }

                let next = pagination
                    .next_page(&params, &response)
                    .map_err(|reason| QuarryError::Pagination {
                        schema: schema.name.clone(),
                        reason,
                    })?;

                match next {
                    NextPage::Single(next_params) => {
                        page_number += 1;
                        debug!(schema = %schema.name, page = page_number, "fetching next page");
                        params = next_params;
                        response = self
                            .request(schema, adapter, &params, behaviors, recorder, synchronous)
                            .await?;
                        recorder.record_page();
                        let page = self.extract(schema, &response)?;
                        collected = merge_page(schema, collected, page);
                    }
                    NextPage::Fanout(sets) => {
                        debug!(schema = %schema.name, branches = sets.len(), "fanning out next pages");
                        let limit = if synchronous {
                            1
                        } else {
                            behaviors.parallel_limit.unwrap_or(sets.len()).max(1)
                        };
                        let pages: Vec<Value> = stream::iter(sets)
                            .map(|set| self.fetch_all(schema, adapter, set, behaviors, recorder, synchronous))
                            .buffered(limit)
                            .try_collect()
                            .await?;
                        for page in pages {
                            collected = merge_page(schema, collected, page);
                        }
                        break;
                    }
                }
            }

            Ok(collected)
        }
        .boxed()
    }

    /// Pull the result out of a response
    ///
    /// A missing or null result is an error unless the schema allows it to
    /// be empty, in which case it reads as `[]`.
    pub(super) fn extract(&self, schema: &Schema, response: &Value) -> Result<Value> {
        let found = match &schema.result.locator {
            ResultLocator::Whole => Some(response.clone()),
            ResultLocator::Path(p) => path::get(response, p).cloned(),
            ResultLocator::Extract(extract) => extract(response),
        };

        match found {
            Some(result) if !result.is_null() => Ok(result),
            _ if schema.result.maybe_empty => Ok(Value::Array(Vec::new())),
            _ => Err(QuarryError::ResultPath {
                schema: schema.name.clone(),
                path: schema.result.locator.describe().to_string(),
                detail: debug_detail(self.config.debug, "response", response),
            }),
        }
    }
}

fn merge_page(schema: &Schema, acc: Value, page: Value) -> Value {
    match &schema.merge_pages {
        Some(merge) => merge(acc, page),
        None => value::concat(acc, page),
    }
}
