use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::VendorError;

/// Structural mismatch on a single wire unit
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("schema violation at `{path}`: expected {expected}")]
pub struct SchemaViolation {
    /// Offending field path, e.g. `choices[0].delta.tool_calls`
    pub path: String,
    /// Expected shape at that path
    pub expected: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
        }
    }
}

/// Errors that can occur while normalizing chat wire traffic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// A unit did not match the expected shape; the unit is dropped
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// Vendor reported an error inside an otherwise well-formed payload
    #[error("vendor error: {0}")]
    Vendor(VendorError),

    /// Deltas disagreed with earlier state; merged best-effort
    #[error("protocol inconsistency: {0}")]
    ProtocolInconsistency(String),

    /// The transport collaborator failed mid-stream
    #[error("transport failure: {0}")]
    Transport(String),

    /// Canonical request could not be expressed for the vendor
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Named dialect is neither configured nor a built-in preset
    #[error("unknown dialect: {name}")]
    UnknownDialect { name: String },

    /// No in-flight stream is registered under this request id
    #[error("unknown stream: {request_id}")]
    UnknownStream { request_id: String },

    /// Caller aborted the stream
    #[error("stream cancelled")]
    Cancelled,
}

impl WireError {
    /// Whether this error ends the request rather than a single unit
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Vendor(_) | Self::Transport(_) | Self::Cancelled)
    }
}

/// Kind of an absorbed per-unit failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Unit dropped for a structural mismatch
    SchemaViolation,
    /// Unit applied best-effort despite disagreeing with earlier state
    ProtocolInconsistency,
}

/// Record of a failure absorbed while assembling a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Zero-based sequence number of the unit within the stream
    pub unit: u64,
    /// Human-readable detail
    pub message: String,
}
