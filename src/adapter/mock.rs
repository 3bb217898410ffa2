//! Mock adapter for testing
//!
//! Returns scripted responses without touching any real source.
//! Records every call so tests can assert on the exact parameter sets.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{Adapter, AdapterCall, AdapterFailure};
use crate::schema::{ErrorDetector, Params};

/// One scripted outcome
pub type MockResponse = Result<Value, AdapterFailure>;

type Handler = Arc<dyn Fn(&Params) -> MockResponse + Send + Sync>;

/// Mock adapter that returns predefined responses
pub struct MockAdapter {
    name: String,
    /// Queue of responses to return (FIFO)
    responses: Mutex<VecDeque<MockResponse>>,
    /// Computes a response when the queue is empty
    handler: Option<Handler>,
    /// Response when both queue and handler are absent
    default_response: Option<MockResponse>,
    /// Parameters of every call made (for assertions)
    calls: Mutex<Vec<Params>>,
    delay: Option<Duration>,
    synchronous: bool,
    detector: Option<ErrorDetector>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            default_response: None,
            calls: Mutex::new(Vec::new()),
            delay: None,
            synchronous: false,
            detector: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue a successful response
    pub fn respond(self, value: Value) -> Self {
        self.queue_response(Ok(value));
        self
    }

    /// Queue a failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.queue_response(Err(AdapterFailure::new(message)));
        self
    }

    /// Compute responses from the call parameters once the queue is drained
    pub fn with_handler(mut self, handler: impl Fn(&Params) -> MockResponse + Send + Sync + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_response = Some(Ok(value));
        self
    }

    /// Sleep before answering (makes concurrency observable)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Accept synchronous calls
    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    pub fn with_detector(
        mut self,
        detector: impl Fn(Option<&AdapterFailure>, Option<&Value>, &Params) -> Option<AdapterFailure>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.detector = Some(Arc::new(detector));
        self
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    /// Parameters of all calls made, without `apiConfig`
    pub fn calls(&self) -> Vec<Params> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<Params> {
        self.calls.lock().last().cloned()
    }

    /// Highest number of overlapping async calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn next_response(&self, params: &Params) -> MockResponse {
        if let Some(response) = self.responses.lock().pop_front() {
            return response;
        }
        if let Some(handler) = &self.handler {
            return handler(params);
        }
        self.default_response.clone().unwrap_or_else(|| {
            Err(AdapterFailure::new(format!(
                "mock adapter '{}' has no scripted response",
                self.name
            )))
        })
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure> {
        let params = call.call_params();
        self.calls.lock().push(params.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let response = self.next_response(&params);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn invoke_sync(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure> {
        if !self.synchronous {
            return Err(AdapterFailure::new(format!(
                "mock adapter '{}' does not support synchronous calls",
                self.name
            )));
        }
        let params = call.call_params();
        self.calls.lock().push(params.clone());
        self.next_response(&params)
    }

    fn detect_errors(&self) -> Option<ErrorDetector> {
        self.detector.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterConfig;
    use crate::schema::Schema;
    use serde_json::json;

    fn call_with<'a>(schema: &'a Schema, params: &'a Params, config: &'a AdapterConfig) -> AdapterCall<'a> {
        AdapterCall::new(schema, params, config)
    }

    #[tokio::test]
    async fn test_queue_then_default() {
        let mock = MockAdapter::new("mock")
            .respond(json!(1))
            .fail("nope")
            .with_default(json!("fallback"));
        let schema = Schema::new("s", "mock");
        let params = Params::new();
        let config = AdapterConfig::default();
        let call = call_with(&schema, &params, &config);

        assert_eq!(mock.invoke(&call).await, Ok(json!(1)));
        assert_eq!(mock.invoke(&call).await, Err(AdapterFailure::new("nope")));
        assert_eq!(mock.invoke(&call).await, Ok(json!("fallback")));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_handler_sees_params() {
        let mock = MockAdapter::new("mock").with_handler(|p| Ok(p.get("id").cloned().unwrap_or(Value::Null)));
        let schema = Schema::new("s", "mock");
        let mut params = Params::new();
        params.insert("id".into(), json!("a1"));
        params.insert("apiConfig".into(), json!({"region": "x"}));
        let config = AdapterConfig::default();

        let result = mock.invoke(&call_with(&schema, &params, &config)).await;
        assert_eq!(result, Ok(json!("a1")));
        let recorded = mock.last_call().unwrap();
        assert!(!recorded.contains_key("apiConfig"));
    }

    #[test]
    fn test_sync_requires_opt_in() {
        let schema = Schema::new("s", "mock");
        let params = Params::new();
        let config = AdapterConfig::default();

        let async_only = MockAdapter::new("a").with_default(json!(1));
        assert!(async_only.invoke_sync(&call_with(&schema, &params, &config)).is_err());

        let sync = MockAdapter::new("b").with_default(json!(1)).synchronous();
        assert_eq!(sync.invoke_sync(&call_with(&schema, &params, &config)), Ok(json!(1)));
    }

    #[tokio::test]
    async fn test_exhausted_queue_fails() {
        let mock = MockAdapter::new("empty");
        let schema = Schema::new("s", "mock");
        let params = Params::new();
        let config = AdapterConfig::default();
        let err = mock.invoke(&call_with(&schema, &params, &config)).await.unwrap_err();
        assert!(err.message.contains("no scripted response"));
    }
}
