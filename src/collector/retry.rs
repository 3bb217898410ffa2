//! Bounded retry around the low-level request
//!
//! Every attempt's `(error, response)` pair goes through the error
//! detector; whatever it reports as an error is retried until the attempt
//! budget is spent. Delays are a fixed interval by default, with optional
//! exponential backoff and jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry::collector::{RetryConfig, RetryPolicy};
//!
//! let policy = RetryPolicy::new(RetryConfig::default().with_times(3));
//! let result = policy.execute(|attempt| async move { call_source(attempt).await }).await;
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::Collector;
use crate::adapter::{Adapter, AdapterCall, AdapterConfig, AdapterFailure};
use crate::error::{debug_detail, QuarryError, Result};
use crate::graph::Behaviors;
use crate::metrics::CallRecorder;
use crate::schema::{Params, Schema};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first (at least 1)
    pub times: u32,
    /// Delay before the first retry
    pub interval: Duration,
    /// Multiplier applied per retry (1.0 = fixed interval)
    pub backoff_multiplier: f64,
    /// Maximum delay between retries
    pub max_interval: Duration,
    /// Optional jitter factor (0.0 to 1.0) to add randomness
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            times: 1,
            interval: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Set the total attempt budget (clamped to at least 1)
    pub fn with_times(mut self, times: u32) -> Self {
        self.times = times.max(1);
        self
    }

    /// Set delay before the first retry
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Set max delay cap
    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max;
        self
    }

    /// Set jitter factor (0.0 to 1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

/// Error returned once the attempt budget is spent
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    /// Error of the last attempt
    pub error: E,
    pub attempts: u32,
}

/// Retry policy that executes operations with bounded attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Calculate delay before retry number `retry` (0-indexed)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let base_delay = self.config.interval.as_millis() as f64
            * self.config.backoff_multiplier.powi(retry as i32);

        let capped_delay = base_delay.min(self.config.max_interval.as_millis() as f64);

        let jittered_delay = if self.config.jitter > 0.0 {
            let jitter_range = capped_delay * self.config.jitter;
            let jitter_offset = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
            (capped_delay + jitter_offset).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(jittered_delay as u64)
    }

    /// Execute an operation with retry logic
    ///
    /// The operation receives the 0-indexed attempt number. Every failure is
    /// retried; there is no error classification at this layer.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> std::result::Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let budget = self.config.times.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= budget {
                        return Err(RetryExhausted {
                            error,
                            attempts: attempt,
                        });
                    }

                    let delay = self.calculate_delay(attempt - 1);
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// A detected failure and the response that accompanied it, if any
#[derive(Debug, Clone)]
struct FailedAttempt {
    failure: AdapterFailure,
    response: Option<Value>,
}

impl Collector {
    /// One concrete request under the node's retry policy
    ///
    /// Detector precedence: behaviors, schema, adapter, identity. After the
    /// budget is spent the error handler (behaviors, then schema) may still
    /// turn the failure into a synthetic response.
    pub(super) async fn request(
        &self,
        schema: &Schema,
        adapter: &dyn Adapter,
        params: &Params,
        behaviors: &Behaviors,
        recorder: &CallRecorder,
        synchronous: bool,
    ) -> Result<Value> {
        let config = AdapterConfig::from_params(&schema.name, params)?;
        let call = AdapterCall::new(schema, params, &config);
        let detector = behaviors
            .detect_errors
            .clone()
            .or_else(|| schema.detect_errors.clone())
            .or_else(|| adapter.detect_errors());

        let policy = RetryPolicy::new(behaviors.retry.clone());
        let call = &call;
        let detector = &detector;

        let outcome = policy
            .execute(|attempt| async move {
                if attempt > 0 {
                    recorder.record_retry();
                    warn!(schema = %schema.name, attempt = attempt + 1, "retrying request");
                }
                recorder.record_call();

                let (error, response) = invoke_once(adapter, call, synchronous).await;
                let error = match detector {
                    Some(detect) => detect(error.as_ref(), response.as_ref(), params),
                    None => error,
                };

                match error {
                    Some(failure) => {
                        recorder.record_error();
                        Err(FailedAttempt { failure, response })
                    }
                    None => {
                        recorder.record_success();
                        Ok(response.unwrap_or(Value::Null))
                    }
                }
            })
            .await;

        let RetryExhausted { error, attempts } = match outcome {
            Ok(value) => return Ok(value),
            Err(exhausted) => exhausted,
        };

        let handler = behaviors.on_error.as_ref().or(schema.on_error.as_ref());
        let failure = match handler {
            Some(handle) => match handle(error.failure, error.response) {
                Ok(recovered) => return Ok(recovered),
                Err(failure) => failure,
            },
            None => error.failure,
        };

        Err(QuarryError::AdapterCall {
            schema: schema.name.clone(),
            attempts,
            reason: failure.message,
            detail: debug_detail(self.config.debug, "params", params),
        })
    }
}

/// Perform one attempt, mapping every outcome to `(error, response)`
///
/// Synchronous calls yield once first so they never complete inline, and a
/// panic inside the adapter becomes the attempt's error.
async fn invoke_once(
    adapter: &dyn Adapter,
    call: &AdapterCall<'_>,
    synchronous: bool,
) -> (Option<AdapterFailure>, Option<Value>) {
    let outcome = if synchronous {
        tokio::task::yield_now().await;
        match panic::catch_unwind(AssertUnwindSafe(|| adapter.invoke_sync(call))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(AdapterFailure::new(panic_message(payload.as_ref()))),
        }
    } else {
        adapter.invoke(call).await
    };

    match outcome {
        Ok(response) => (None, Some(response)),
        Err(failure) => (Some(failure), None),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "adapter panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.times, 1);
        assert_eq!(config.interval, Duration::ZERO);
        assert!((config.backoff_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::default()
            .with_times(0)
            .with_interval(Duration::from_millis(50))
            .with_max_interval(Duration::from_secs(5))
            .with_backoff_multiplier(1.5)
            .with_jitter(2.0);

        assert_eq!(config.times, 1);
        assert_eq!(config.interval, Duration::from_millis(50));
        assert_eq!(config.max_interval, Duration::from_secs(5));
        assert!((config.backoff_multiplier - 1.5).abs() < f64::EPSILON);
        assert!((config.jitter - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fixed_interval_by_default() {
        let policy = RetryPolicy::new(RetryConfig::default().with_interval(Duration::from_millis(100)));
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(100));
    }

    #[test]
    fn test_calculate_delay_exponential_backoff_capped() {
        let config = RetryConfig::default()
            .with_interval(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_max_interval(Duration::from_millis(500));
        let policy = RetryPolicy::new(config);

        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(500));
    }

    #[test]
    fn test_calculate_delay_with_jitter_within_bounds() {
        let config = RetryConfig::default()
            .with_interval(Duration::from_millis(100))
            .with_jitter(0.5);
        let policy = RetryPolicy::new(config);

        for _ in 0..100 {
            let delay = policy.calculate_delay(0);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_execute_succeeds_on_first_try() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let result: std::result::Result<&str, RetryExhausted<String>> = policy
            .execute(|_| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok("success")
                }
            })
            .await;

        assert_eq!(result, Ok("success"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_retries_until_success() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_times(3)
                .with_interval(Duration::from_millis(1)),
        );
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|attempt| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(format!("failure {attempt}"))
                    } else {
                        Ok("success after retries")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("success after retries"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_exhausts_with_last_error() {
        let policy = RetryPolicy::new(RetryConfig::default().with_times(2));

        let result: std::result::Result<(), _> = policy
            .execute(|attempt| async move { Err(format!("failure {attempt}")) })
            .await;

        assert_eq!(
            result,
            Err(RetryExhausted {
                error: "failure 1".to_string(),
                attempts: 2
            })
        );
    }

    #[tokio::test]
    async fn test_default_config_does_not_retry() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));

        let result: std::result::Result<(), RetryExhausted<&str>> = policy
            .execute(|_| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("nope")
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "adapter panicked");
    }
}
