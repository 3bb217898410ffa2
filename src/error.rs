// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Quarry Error Types with Error Codes
//!
//! Error code ranges:
//! - QRY-000-019: Graph definition / validation errors
//! - QRY-020-029: Parameter and binding errors
//! - QRY-030-039: Adapter errors
//! - QRY-040-049: Result extraction / pagination errors
//! - QRY-050-059: Run errors
//! - QRY-060-069: Configuration / IO errors

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuarryError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Render the `with params {...}` tail appended to messages in debug mode.
///
/// Returns an empty string when debug is off so secrets held in parameters
/// never reach default error text.
pub fn debug_detail(debug: bool, label: &str, value: &impl Serialize) -> String {
    if !debug {
        return String::new();
    }
    match serde_json::to_string(value) {
        Ok(json) => format!(" with {label} {json}"),
        Err(_) => String::new(),
    }
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum QuarryError {
    // ═══════════════════════════════════════════
    // GRAPH ERRORS (000-019)
    // ═══════════════════════════════════════════
    #[error("[QRY-001] Failed to parse graph definition: {details}")]
    ParseError { details: String },

    #[error("[QRY-002] Node '{node}' has an invalid source '{reference}' for parameter '{param}': no such node")]
    UnknownSource {
        node: String,
        param: String,
        reference: String,
    },

    #[error("[QRY-003] Node '{node}' has an invalid input '{input}' for parameter '{param}': not present in inputs")]
    UnknownInput {
        node: String,
        param: String,
        input: String,
    },

    #[error("[QRY-004] Unknown target '{target}'")]
    UnknownTarget { target: String },

    #[error("[QRY-005] Cycle detected between nodes: {cycle}")]
    CycleDetected { cycle: String },

    #[error("[QRY-006] Duplicate node '{name}'")]
    DuplicateNode { name: String },

    #[error("[QRY-007] Invalid node name '{name}': {reason}")]
    InvalidNodeName { name: String, reason: String },

    #[error("[QRY-008] Node '{node}' references unknown schema '{schema}'")]
    UnknownSchema { node: String, schema: String },

    // ═══════════════════════════════════════════
    // PARAMETER ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[QRY-020] Missing required parameter '{param}' for schema '{schema}'{detail}")]
    MissingParameter {
        schema: String,
        param: String,
        detail: String,
    },

    #[error("[QRY-021] Multi-valued parameters for schema '{schema}' must have equal lengths: '{param}' has {actual} values, expected {expected}{detail}")]
    ArrayLengthMismatch {
        schema: String,
        param: String,
        expected: usize,
        actual: usize,
        detail: String,
    },

    #[error("[QRY-022] Default-source cycle while resolving schema '{schema}': {chain}")]
    DefaultSourceCycle { schema: String, chain: String },

    #[error("[QRY-023] Binding for parameter '{param}' of node '{node}' failed: {reason}")]
    BindingError {
        node: String,
        param: String,
        reason: String,
    },

    #[error("[QRY-024] Invalid path syntax: '{path}'")]
    InvalidPath { path: String },

    // ═══════════════════════════════════════════
    // ADAPTER ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[QRY-030] No adapter registered for source '{source_name}' (schema '{schema}')")]
    AdapterLookup { source_name: String, schema: String },

    #[error("[QRY-031] Error fetching results for schema '{schema}' after {attempts} attempt(s): {reason}{detail}")]
    AdapterCall {
        schema: String,
        attempts: u32,
        reason: String,
        detail: String,
    },

    #[error("[QRY-032] Calls for schema '{schema}' mix synchronous and asynchronous execution")]
    MixedSynchronicity { schema: String },

    #[error("[QRY-033] Invalid apiConfig for schema '{schema}': {reason}")]
    AdapterConfig { schema: String, reason: String },

    // ═══════════════════════════════════════════
    // RESULT ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[QRY-040] Schema '{schema}' specifies result path '{path}' but it is not present on the response{detail}")]
    ResultPath {
        schema: String,
        path: String,
        detail: String,
    },

    #[error("[QRY-041] Pagination failed for schema '{schema}': {reason}")]
    Pagination { schema: String, reason: String },

    // ═══════════════════════════════════════════
    // RUN ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[QRY-050] Node '{node}' failed: {error}")]
    NodeFailed {
        node: String,
        #[source]
        error: Box<QuarryError>,
    },

    #[error("[QRY-051] Completion callback panicked: {reason}")]
    CallbackError { reason: String },

    #[error("[QRY-052] Nodes can never become ready: {pending}")]
    Deadlock { pending: String },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[QRY-060] Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("[QRY-061] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuarryError {
    /// Get the error code (e.g., "QRY-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "QRY-001",
            Self::UnknownSource { .. } => "QRY-002",
            Self::UnknownInput { .. } => "QRY-003",
            Self::UnknownTarget { .. } => "QRY-004",
            Self::CycleDetected { .. } => "QRY-005",
            Self::DuplicateNode { .. } => "QRY-006",
            Self::InvalidNodeName { .. } => "QRY-007",
            Self::UnknownSchema { .. } => "QRY-008",
            Self::MissingParameter { .. } => "QRY-020",
            Self::ArrayLengthMismatch { .. } => "QRY-021",
            Self::DefaultSourceCycle { .. } => "QRY-022",
            Self::BindingError { .. } => "QRY-023",
            Self::InvalidPath { .. } => "QRY-024",
            Self::AdapterLookup { .. } => "QRY-030",
            Self::AdapterCall { .. } => "QRY-031",
            Self::MixedSynchronicity { .. } => "QRY-032",
            Self::AdapterConfig { .. } => "QRY-033",
            Self::ResultPath { .. } => "QRY-040",
            Self::Pagination { .. } => "QRY-041",
            Self::NodeFailed { .. } => "QRY-050",
            Self::CallbackError { .. } => "QRY-051",
            Self::Deadlock { .. } => "QRY-052",
            Self::ConfigError { .. } => "QRY-060",
            Self::Io(_) => "QRY-061",
        }
    }

    /// Graph validation errors are raised before any adapter call is issued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownSource { .. }
                | Self::UnknownInput { .. }
                | Self::UnknownTarget { .. }
                | Self::CycleDetected { .. }
                | Self::DuplicateNode { .. }
                | Self::InvalidNodeName { .. }
                | Self::UnknownSchema { .. }
        )
    }

    /// Check if error is recoverable (a later run may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::AdapterCall { .. } | Self::Io(_) => true,
            Self::NodeFailed { error, .. } => error.is_recoverable(),
            _ => false,
        }
    }

    /// Strip `NodeFailed` wrappers down to the error that caused the abort.
    pub fn root(&self) -> &QuarryError {
        match self {
            Self::NodeFailed { error, .. } => error.root(),
            other => other,
        }
    }

    /// Name of the node whose failure aborted the run, if any.
    pub fn failed_node(&self) -> Option<&str> {
        match self {
            Self::NodeFailed { node, .. } => Some(node),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for QuarryError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ParseError {
            details: err.to_string(),
        }
    }
}

impl FixSuggestion for QuarryError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::ParseError { .. } => Some("Check YAML syntax: indentation and quoting"),
            Self::UnknownSource { .. } => {
                Some("Point the binding at an existing node name or add the missing node")
            }
            Self::UnknownInput { .. } => {
                Some("Set the input before resolving, or pass it as a one-shot override")
            }
            Self::UnknownTarget { .. } => Some("Use one of the node names declared in the graph"),
            Self::CycleDetected { .. } => {
                Some("Remove the circular source binding - a node cannot depend on itself")
            }
            Self::DuplicateNode { .. } => Some("Use unique node names"),
            Self::InvalidNodeName { .. } => {
                Some("Use letters, digits, '_' or '-' and start with a letter or '_'")
            }
            Self::UnknownSchema { .. } => Some("Run `quarry schemas` to list available schemas"),
            Self::MissingParameter { .. } => {
                Some("Bind the parameter on the node or declare a default source on the schema")
            }
            Self::ArrayLengthMismatch { .. } => {
                Some("Multi-valued parameters are zipped: give them the same number of values")
            }
            Self::DefaultSourceCycle { .. } => {
                Some("Break the loop between default-source schemas")
            }
            Self::BindingError { .. } => Some("Check the binding's path and formatter"),
            Self::InvalidPath { .. } => Some("Use dotted paths like a.b.c or a.items[0].name"),
            Self::AdapterLookup { .. } => {
                Some("Register an adapter for the schema's source before resolving")
            }
            Self::AdapterCall { .. } => {
                Some("Set QUARRY_DEBUG=1 to include call parameters, or raise retry.times")
            }
            Self::MixedSynchronicity { .. } => {
                Some("Use the same apiConfig.synchronous value for every fanned-out value")
            }
            Self::AdapterConfig { .. } => Some("Check the apiConfig parameter's field types"),
            Self::ResultPath { .. } => {
                Some("Fix the schema's result path or mark the result as maybe-empty")
            }
            Self::Pagination { .. } => Some("Check the schema's next-page constructor"),
            Self::NodeFailed { error, .. } => error.fix_suggestion(),
            Self::CallbackError { .. } => None,
            Self::Deadlock { .. } => Some("Check that every source binding points into the plan"),
            Self::ConfigError { .. } => Some("Check the config block and QUARRY_* variables"),
            Self::Io(_) => Some("Check file path and permissions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_prefix_matches_code() {
        let err = QuarryError::UnknownTarget {
            target: "nope".to_string(),
        };
        assert_eq!(err.code(), "QRY-004");
        assert!(err.to_string().starts_with("[QRY-004]"));
    }

    #[test]
    fn test_node_failed_unwraps_to_root() {
        let err = QuarryError::NodeFailed {
            node: "repos".to_string(),
            error: Box::new(QuarryError::AdapterCall {
                schema: "listRepos".to_string(),
                attempts: 2,
                reason: "boom".to_string(),
                detail: String::new(),
            }),
        };
        assert_eq!(err.failed_node(), Some("repos"));
        assert_eq!(err.root().code(), "QRY-031");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_validation_classifier() {
        assert!(QuarryError::UnknownSource {
            node: "a".into(),
            param: "p".into(),
            reference: "z".into(),
        }
        .is_validation());
        assert!(!QuarryError::Deadlock {
            pending: "a".into()
        }
        .is_validation());
    }

    #[test]
    fn test_debug_detail_hidden_by_default() {
        let params = serde_json::json!({"token": "secret"});
        assert_eq!(debug_detail(false, "params", &params), "");
        assert_eq!(
            debug_detail(true, "params", &params),
            r#" with params {"token":"secret"}"#
        );
    }

    #[test]
    fn test_missing_parameter_has_suggestion() {
        let err = QuarryError::MissingParameter {
            schema: "s".into(),
            param: "p".into(),
            detail: String::new(),
        };
        assert!(err.fix_suggestion().is_some());
    }
}
