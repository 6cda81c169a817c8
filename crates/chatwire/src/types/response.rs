use serde::{Deserialize, Serialize};

use super::message::AssistantMessage;
use super::stream::{StreamEvent, StreamSummary};
use crate::error::{Diagnostic, WireError};

/// Canonical reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
    /// Vendor reported a generation error
    Error,
    /// Token not recognised, or the stream ended without one
    Unknown,
}

impl FinishReason {
    /// Canonical literal for this reason
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this is anything other than `Unknown`
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl From<chatwire_config::FinishReasonTarget> for FinishReason {
    fn from(target: chatwire_config::FinishReasonTarget) -> Self {
        use chatwire_config::FinishReasonTarget;

        match target {
            FinishReasonTarget::Stop => Self::Stop,
            FinishReasonTarget::Length => Self::Length,
            FinishReasonTarget::ToolCalls => Self::ToolCalls,
            FinishReasonTarget::ContentFilter => Self::ContentFilter,
            FinishReasonTarget::Error => Self::Error,
            FinishReasonTarget::Unknown => Self::Unknown,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion)
    pub total_tokens: u32,
}

/// A finished choice: the assembled message and its terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedChoice {
    /// Index of this choice
    pub index: u32,
    /// Assembled assistant message
    pub message: AssistantMessage,
    /// Why generation stopped
    pub finish_reason: FinishReason,
}

/// Assembled response, streaming or not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Vendor response identifier, if one was seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model reported by the vendor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Completed choices ordered by index
    pub choices: Vec<CompletedChoice>,
    /// Request-level token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Vendor warnings carried alongside the payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Per-unit failures absorbed while assembling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics beyond the retention limit, counted but not kept
    #[serde(default)]
    pub dropped_diagnostics: u64,
}

impl ChatResponse {
    /// Look up a choice by index
    pub fn choice(&self, index: u32) -> Option<&CompletedChoice> {
        self.choices.iter().find(|choice| choice.index == index)
    }
}

/// Terminal state handed to the chat application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Stream or body finished normally
    Completed(ChatResponse),
    /// Request-terminal failure; `partial` holds whatever was assembled
    Failed {
        /// The vendor or transport failure
        error: WireError,
        /// Partial output accumulated before the failure
        partial: ChatResponse,
    },
    /// Stream was aborted by the caller; no messages are delivered
    Cancelled {
        /// Diagnostics gathered before the abort
        diagnostics: Vec<Diagnostic>,
    },
}

impl ChatOutcome {
    /// Completed response, if the request finished normally
    pub const fn completed(&self) -> Option<&ChatResponse> {
        match self {
            Self::Completed(response) => Some(response),
            _ => None,
        }
    }

    /// Response content regardless of failure: complete or partial
    pub const fn response(&self) -> Option<&ChatResponse> {
        match self {
            Self::Completed(response) | Self::Failed { partial: response, .. } => Some(response),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whether the caller aborted the stream
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Closing events for a live stream: one `Finished` per choice, then a summary
    ///
    /// A cancelled stream yields only the summary.
    pub fn terminal_events(&self) -> Vec<StreamEvent> {
        let (response, error) = match self {
            Self::Completed(response) => (Some(response), None),
            Self::Failed { error, partial } => (Some(partial), Some(error.to_string())),
            Self::Cancelled { .. } => (None, Some(WireError::Cancelled.to_string())),
        };

        let mut events: Vec<StreamEvent> = response
            .into_iter()
            .flat_map(|response| response.choices.iter().cloned().map(StreamEvent::Finished))
            .collect();

        events.push(StreamEvent::Summary(StreamSummary {
            usage: response.and_then(|response| response.usage),
            error,
        }));

        events
    }
}
