//! Parameter descriptors
//!
//! Multi-valued detection is decided by an explicit [`ArrayDetection`] tag
//! rather than by inspecting values ad hoc at every call site.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{Schema, ValueFn};

/// Predicate deciding whether a parameter value holds several logical values
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// How a parameter value is classified as single- or multi-valued
#[derive(Clone, Default)]
pub enum ArrayDetection {
    /// Any JSON array fans out, one call per element
    #[default]
    Elements,
    /// Only an array of arrays fans out (the parameter itself takes a list)
    Nested,
    /// Never fans out
    Never,
    /// Custom predicate
    Custom(PredicateFn),
}

impl fmt::Debug for ArrayDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elements => write!(f, "Elements"),
            Self::Nested => write!(f, "Nested"),
            Self::Never => write!(f, "Never"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl ArrayDetection {
    pub fn is_multi(&self, value: &Value) -> bool {
        match self {
            Self::Elements => value.is_array(),
            Self::Nested => matches!(
                value,
                Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_array)
            ),
            Self::Never => false,
            Self::Custom(predicate) => predicate(value),
        }
    }
}

/// Descriptor for one required or optional parameter
#[derive(Clone, Default)]
pub struct ParamDescriptor {
    pub detect: ArrayDetection,
    /// Applied to each concrete value before the call
    pub formatter: Option<ValueFn>,
    /// Largest list accepted in one call; longer single values are chunked
    pub max_batch: Option<usize>,
    /// Schema resolved to supply this parameter when it is missing
    pub default_source: Option<Arc<Schema>>,
}

impl fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("detect", &self.detect)
            .field("formatted", &self.formatter.is_some())
            .field("max_batch", &self.max_batch)
            .field(
                "default_source",
                &self.default_source.as_ref().map(|s| s.name.as_str()),
            )
            .finish()
    }
}

impl ParamDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parameter takes a list; only arrays of arrays fan out
    pub fn nested_arrays(mut self) -> Self {
        self.detect = ArrayDetection::Nested;
        self
    }

    pub fn never_array(mut self) -> Self {
        self.detect = ArrayDetection::Never;
        self
    }

    pub fn detect_with(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.detect = ArrayDetection::Custom(Arc::new(predicate));
        self
    }

    pub fn format_with(mut self, formatter: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn max_batch(mut self, max: usize) -> Self {
        self.max_batch = Some(max.max(1));
        self
    }

    pub fn default_source(mut self, schema: Arc<Schema>) -> Self {
        self.default_source = Some(schema);
        self
    }

    /// Apply the formatter (identity when none)
    pub fn format(&self, value: &Value) -> Value {
        match &self.formatter {
            Some(formatter) => formatter(value),
            None => value.clone(),
        }
    }

    /// Split a value into its per-call values
    ///
    /// Returns `None` for a single logical value that fits in one call.
    /// A single list longer than `max_batch` is chunked into sub-lists.
    pub fn split(&self, value: &Value) -> Option<Vec<Value>> {
        if self.detect.is_multi(value) {
            return Some(match value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            });
        }

        match (self.max_batch, value) {
            (Some(max), Value::Array(items)) if items.len() > max => Some(
                items
                    .chunks(max)
                    .map(|chunk| Value::Array(chunk.to_vec()))
                    .collect(),
            ),
            _ => None,
        }
    }
}
