use serde::{Deserialize, Serialize};

use super::response::{CompletedChoice, FinishReason, Usage};

/// Observable event produced while assembling a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Incremental content for one choice
    Delta(StreamDelta),
    /// Usage totals reported by the vendor (last one wins)
    Usage(Usage),
    /// Non-fatal vendor warning
    Warning(String),
    /// Vendor error payload; terminal for the request
    VendorError(VendorError),
    /// A choice's final message, emitted once the stream ends
    Finished(CompletedChoice),
    /// Request-level totals, emitted last
    Summary(StreamSummary),
}

/// Incremental update within a streaming response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Choice index this delta belongs to
    pub index: u32,
    /// Incremental text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool call data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<StreamToolCall>,
    /// Canonical finish reason, on the delta that finalized the choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    /// Text-only delta
    pub fn text(index: u32, content: impl Into<String>) -> Self {
        Self {
            index,
            content: Some(content.into()),
            tool_call: None,
            finish_reason: None,
        }
    }

    /// Tool-call fragment delta
    pub const fn tool_call(index: u32, tool_call: StreamToolCall) -> Self {
        Self {
            index,
            content: None,
            tool_call: Some(tool_call),
            finish_reason: None,
        }
    }

    /// Delta carrying only a finish reason
    pub const fn finish(index: u32, finish_reason: FinishReason) -> Self {
        Self {
            index,
            content: None,
            tool_call: None,
            finish_reason: Some(finish_reason),
        }
    }
}

/// Partial tool call data within a stream delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamToolCall {
    /// Resolved position of this tool call within the choice
    pub index: u32,
    /// Tool call ID (usually on the first fragment only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Partial function call data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<StreamFunctionCall>,
}

/// Partial function call data within a streaming tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name (usually on the first fragment only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Incremental arguments fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Error payload a vendor embedded in an otherwise well-formed unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorError {
    /// Human-readable message
    pub message: String,
    /// Vendor error code, stringified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Vendor error type/category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl std::fmt::Display for VendorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.code) {
            (Some(kind), Some(code)) => write!(f, "{kind} ({code}): {}", self.message),
            (Some(label), None) | (None, Some(label)) => write!(f, "{label}: {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Request-level summary closing a stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Last usage totals seen on any unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Terminal failure, if the request did not finish normally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
