//! Local function adapter
//!
//! Dispatches on the call's method to a registered function. Sync
//! functions also serve the synchronous execution mode. The `synthetic`
//! source is a function adapter preloaded with transformations over the
//! call parameters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::{Adapter, AdapterCall, AdapterFailure};
use crate::schema::Params;

/// What a registered function receives
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInput {
    /// Call parameters without `apiConfig`
    pub params: Params,
    /// Values in argument order
    pub args: Vec<Value>,
}

type SyncFn = Arc<dyn Fn(FunctionInput) -> Result<Value, String> + Send + Sync>;
type AsyncFn = Arc<dyn Fn(FunctionInput) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

#[derive(Clone)]
enum Function {
    Sync(SyncFn),
    Async(AsyncFn),
}

pub struct FunctionAdapter {
    name: String,
    functions: HashMap<String, Function>,
}

impl FunctionAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: HashMap::new(),
        }
    }

    /// The built-in `synthetic` source
    ///
    /// - `echo`: returns the call parameters as an object
    /// - `args`: returns the positional arguments as a list
    pub fn synthetic() -> Self {
        Self::new("synthetic")
            .register_sync("echo", |input| Ok(Value::Object(input.params)))
            .register_sync("args", |input| Ok(Value::Array(input.args)))
    }

    pub fn register_sync(
        mut self,
        method: impl Into<String>,
        function: impl Fn(FunctionInput) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.functions
            .insert(method.into(), Function::Sync(Arc::new(function)));
        self
    }

    pub fn register_async(
        mut self,
        method: impl Into<String>,
        function: impl Fn(FunctionInput) -> BoxFuture<'static, Result<Value, String>> + Send + Sync + 'static,
    ) -> Self {
        self.functions
            .insert(method.into(), Function::Async(Arc::new(function)));
        self
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    fn lookup(&self, call: &AdapterCall<'_>) -> Result<(Function, FunctionInput), AdapterFailure> {
        let method = call.method().ok_or_else(|| {
            AdapterFailure::new(format!(
                "schema '{}' names no method for function adapter '{}'",
                call.schema.name, self.name
            ))
        })?;
        let function = self.functions.get(method).cloned().ok_or_else(|| {
            AdapterFailure::new(format!(
                "function adapter '{}' has no method '{}'",
                self.name, method
            ))
        })?;
        let input = FunctionInput {
            params: call.call_params(),
            args: call.positional_args(),
        };
        Ok((function, input))
    }
}

#[async_trait]
impl Adapter for FunctionAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure> {
        let (function, input) = self.lookup(call)?;
        let result = match function {
            Function::Sync(f) => {
                tokio::task::yield_now().await;
                f(input)
            }
            Function::Async(f) => f(input).await,
        };
        result.map_err(AdapterFailure::new)
    }

    fn invoke_sync(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure> {
        match self.lookup(call)? {
            (Function::Sync(f), input) => f(input).map_err(AdapterFailure::new),
            (Function::Async(_), _) => Err(AdapterFailure::new(format!(
                "method '{}' of function adapter '{}' is asynchronous",
                call.method().unwrap_or_default(),
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterConfig;
    use crate::schema::Schema;
    use futures::FutureExt;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_synthetic_echo() {
        let adapter = FunctionAdapter::synthetic();
        let schema = Schema::new("echo", "synthetic").method("echo");
        let p = params(&[("a", json!(1)), ("apiConfig", json!({}))]);
        let config = AdapterConfig::default();

        let result = adapter.invoke(&AdapterCall::new(&schema, &p, &config)).await;
        assert_eq!(result, Ok(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_positional_arguments() {
        let adapter = FunctionAdapter::new("math").register_sync("sub", |input| {
            let a = input.args[0].as_i64().ok_or("a must be a number")?;
            let b = input.args[1].as_i64().ok_or("b must be a number")?;
            Ok(json!(a - b))
        });
        let schema = Schema::new("sub", "math").method("sub").argument_order(["a", "b"]);
        let p = params(&[("b", json!(2)), ("a", json!(10))]);
        let config = AdapterConfig::default();
        let call = AdapterCall::new(&schema, &p, &config);

        assert_eq!(adapter.invoke(&call).await, Ok(json!(8)));
        assert_eq!(adapter.invoke_sync(&call), Ok(json!(8)));
    }

    #[tokio::test]
    async fn test_async_function_not_sync_callable() {
        let adapter = FunctionAdapter::new("slow")
            .register_async("later", |_| async { Ok::<_, String>(json!("done")) }.boxed());
        let schema = Schema::new("later", "slow").method("later");
        let p = Params::new();
        let config = AdapterConfig::default();
        let call = AdapterCall::new(&schema, &p, &config);

        assert_eq!(adapter.invoke(&call).await, Ok(json!("done")));
        assert!(adapter.invoke_sync(&call).is_err());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let adapter = FunctionAdapter::synthetic();
        let schema = Schema::new("x", "synthetic").method("nope");
        let p = Params::new();
        let config = AdapterConfig::default();
        let err = adapter
            .invoke(&AdapterCall::new(&schema, &p, &config))
            .await
            .unwrap_err();
        assert!(err.message.contains("no method 'nope'"));
        assert_eq!(adapter.methods(), vec!["args", "echo"]);
    }
}
