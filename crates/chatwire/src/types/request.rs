use serde::{Deserialize, Serialize};

use super::message::{Message, UserContent};
use super::tool::{ToolChoice, ToolDefinition, is_valid_tool_name};
use crate::error::WireError;

/// Parameters controlling text generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Frequency penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty (-2.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Random seed for deterministic generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Number of completions; vendors default this to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// Internal canonical chat request
///
/// Built once and treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Generation parameters
    #[serde(default)]
    pub params: SamplingParams,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model should select tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Start a request for `model` with the given messages
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            params: SamplingParams::default(),
            tools: None,
            tool_choice: None,
            stream: false,
        }
    }

    /// Check the request invariants
    ///
    /// # Errors
    ///
    /// Returns `WireError::InvalidRequest` if there are no messages, an
    /// assistant message has neither content nor tool calls, a tool name is
    /// not a valid identifier, or a named tool choice references a tool that
    /// is not defined
    pub fn validate(&self) -> Result<(), WireError> {
        if self.model.trim().is_empty() {
            return Err(WireError::InvalidRequest("model must not be empty".to_owned()));
        }

        if self.messages.is_empty() {
            return Err(WireError::InvalidRequest("messages must not be empty".to_owned()));
        }

        for (position, message) in self.messages.iter().enumerate() {
            match message {
                Message::User {
                    content: UserContent::Parts(parts),
                    ..
                } if parts.is_empty() => {
                    return Err(WireError::InvalidRequest(format!(
                        "messages[{position}]: user content parts must not be empty"
                    )));
                }
                Message::Assistant(assistant) if assistant.content.is_none() && assistant.tool_calls.is_empty() => {
                    return Err(WireError::InvalidRequest(format!(
                        "messages[{position}]: assistant message needs content or tool_calls"
                    )));
                }
                _ => {}
            }
        }

        let tools = self.tools.as_deref().unwrap_or_default();

        for tool in tools {
            if !is_valid_tool_name(&tool.function.name) {
                return Err(WireError::InvalidRequest(format!(
                    "invalid tool name '{}': expected 1-64 letters, digits, '_' or '-'",
                    tool.function.name
                )));
            }
        }

        if let Some(ToolChoice::Named { name }) = &self.tool_choice {
            if !is_valid_tool_name(name) {
                return Err(WireError::InvalidRequest(format!("invalid tool name '{name}' in tool_choice")));
            }
            if !tools.iter().any(|tool| &tool.function.name == name) {
                return Err(WireError::InvalidRequest(format!(
                    "tool_choice references undefined tool '{name}'"
                )));
            }
        }

        Ok(())
    }
}
