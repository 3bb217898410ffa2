//! # Adapter Abstraction Layer
//!
//! Trait and implementations for data sources.
//!
//! ## Overview
//!
//! An adapter performs exactly one concrete call. Batching, pagination,
//! retries and merging all live in the collector and are adapter-agnostic.
//!
//! - [`Adapter`] - Core trait for executing one call
//! - [`AdapterRegistry`] - Source name → adapter map owned by an orchestrator
//! - [`FunctionAdapter`] - Named local functions (and the `synthetic` source)
//! - [`HttpAdapter`] - Generic HTTP source built on reqwest
//! - [`MockAdapter`] - Test adapter with scripted responses
//!
//! ## Adapter Trait
//!
//! ```rust,ignore
//! #[async_trait]
//! pub trait Adapter: Send + Sync {
//!     fn name(&self) -> &str;
//!     async fn invoke(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure>;
//!     fn invoke_sync(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure>;
//!     fn detect_errors(&self) -> Option<ErrorDetector>;
//! }
//! ```

mod function;
mod http;
pub mod mock;
mod registry;

pub use function::{FunctionAdapter, FunctionInput};
pub use http::HttpAdapter;
pub use mock::MockAdapter;
pub use registry::{AdapterOverride, AdapterRegistry};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{QuarryError, Result};
use crate::schema::{ErrorDetector, Params, Schema};
use crate::util::constants::ADAPTER_CONFIG_PARAM;

/// Failure reported by an adapter for one attempt
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AdapterFailure {
    pub message: String,
    /// Source-specific error code (HTTP status, SDK error name, ...)
    pub code: Option<String>,
}

impl AdapterFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Structured adapter configuration carried by the reserved `apiConfig` param
///
/// Known fields are typed; anything adapter-specific lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronous: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdapterConfig {
    /// Parse the `apiConfig` entry of a parameter set (absent = default)
    pub fn from_params(schema: &str, params: &Params) -> Result<Self> {
        match params.get(ADAPTER_CONFIG_PARAM) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| QuarryError::AdapterConfig {
                schema: schema.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Everything an adapter needs for one concrete call
#[derive(Debug, Clone, Copy)]
pub struct AdapterCall<'a> {
    pub schema: &'a Schema,
    /// Concrete parameters, including `apiConfig` if present
    pub params: &'a Params,
    pub config: &'a AdapterConfig,
}

impl<'a> AdapterCall<'a> {
    pub fn new(schema: &'a Schema, params: &'a Params, config: &'a AdapterConfig) -> Self {
        Self {
            schema,
            params,
            config,
        }
    }

    /// Method from apiConfig, falling back to the schema
    pub fn method(&self) -> Option<&'a str> {
        self.config
            .method
            .as_deref()
            .or(self.schema.method.as_deref())
    }

    pub fn argument_order(&self) -> &'a [String] {
        self.config
            .argument_order
            .as_deref()
            .unwrap_or(&self.schema.argument_order)
    }

    /// Parameters without the reserved `apiConfig` entry
    pub fn call_params(&self) -> Params {
        let mut params = self.params.clone();
        params.remove(ADAPTER_CONFIG_PARAM);
        params
    }

    /// Positional arguments following the argument order (missing = null)
    pub fn positional_args(&self) -> Vec<Value> {
        self.argument_order()
            .iter()
            .map(|name| self.params.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// Core trait for data sources
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name (used in metrics keys)
    fn name(&self) -> &str;

    /// Perform exactly one call
    async fn invoke(&self, call: &AdapterCall<'_>) -> std::result::Result<Value, AdapterFailure>;

    /// Blocking entry point used by the synchronous execution mode
    fn invoke_sync(&self, _call: &AdapterCall<'_>) -> std::result::Result<Value, AdapterFailure> {
        Err(AdapterFailure::new(format!(
            "adapter '{}' does not support synchronous calls",
            self.name()
        )))
    }

    /// Adapter-level error detector, consulted after behaviors and schema
    fn detect_errors(&self) -> Option<ErrorDetector> {
        None
    }
}
