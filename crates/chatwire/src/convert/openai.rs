//! Conversion between internal types and the `OpenAI`-compatible wire format

use serde_json::Value;

use crate::assembler::StreamAssembler;
use crate::dialect::{Dialect, NamedToolChoiceStyle};
use crate::error::{Diagnostic, DiagnosticKind, WireError};
use crate::finish::FinishReasonMapper;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiContent, OpenAiContentPart, OpenAiErrorDetail, OpenAiFunction, OpenAiFunctionCall,
    OpenAiImageUrl, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChoice, OpenAiStreamChunk,
    OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamOptions, OpenAiStreamToolCall, OpenAiTool,
    OpenAiToolCall, OpenAiUsage,
};
use crate::schema::{self, WireUnit};
use crate::types::{
    AssistantMessage, ChatOutcome, ChatRequest, ChatResponse, CompletedChoice, ContentPart, FunctionDefinition,
    ImageDetail, Message, SamplingParams, ToolCall, ToolChoice, ToolDefinition, Usage, UserContent, VendorError,
};

/// Vendor request body ready for the transport collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct VendorRequest {
    /// JSON body
    pub body: Value,
    /// Whether the transport should expect an SSE stream
    pub stream: bool,
}

// -- Inbound: wire format -> internal types --

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage
                .total_tokens
                .unwrap_or_else(|| usage.prompt_tokens.saturating_add(usage.completion_tokens)),
        }
    }
}

impl From<OpenAiErrorDetail> for VendorError {
    fn from(detail: OpenAiErrorDetail) -> Self {
        match detail {
            OpenAiErrorDetail::Object {
                message,
                error_type,
                code,
                ..
            } => Self {
                message: message.unwrap_or_else(|| "unspecified vendor error".to_owned()),
                code: code.and_then(|code| match code {
                    Value::Null => None,
                    Value::String(code) => Some(code),
                    other => Some(other.to_string()),
                }),
                kind: error_type,
            },
            OpenAiErrorDetail::Message(message) => Self {
                message,
                code: None,
                kind: None,
            },
        }
    }
}

/// Human-readable text of a vendor `warning` field
pub fn warning_text(warning: &Value) -> String {
    match warning {
        Value::String(text) => text.clone(),
        Value::Object(object) => object
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| warning.to_string(), str::to_owned),
        other => other.to_string(),
    }
}

impl TryFrom<OpenAiRequest> for ChatRequest {
    type Error = WireError;

    fn try_from(req: OpenAiRequest) -> Result<Self, Self::Error> {
        let messages = req
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            model: req.model,
            messages,
            params: SamplingParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_tokens,
                stop: req.stop,
                frequency_penalty: req.frequency_penalty,
                presence_penalty: req.presence_penalty,
                seed: req.seed,
                n: req.n,
            },
            tools: req.tools.map(|tools| tools.into_iter().map(Into::into).collect()),
            tool_choice: req.tool_choice.as_ref().and_then(parse_tool_choice),
            stream: req.stream.unwrap_or(false),
        })
    }
}

impl TryFrom<OpenAiMessage> for Message {
    type Error = WireError;

    fn try_from(msg: OpenAiMessage) -> Result<Self, Self::Error> {
        let text = msg.content.as_ref().map(OpenAiContent::as_text);

        match msg.role.as_str() {
            "system" | "developer" => Ok(Self::System {
                content: text.unwrap_or_default(),
                name: msg.name,
            }),
            "user" => {
                let content = match msg.content {
                    Some(OpenAiContent::Parts(parts)) => {
                        UserContent::Parts(parts.into_iter().filter_map(content_part).collect())
                    }
                    Some(OpenAiContent::Text(text)) => UserContent::Text(text),
                    None => UserContent::Text(String::new()),
                };
                Ok(Self::User {
                    content,
                    name: msg.name,
                })
            }
            "assistant" => Ok(Self::Assistant(AssistantMessage {
                content: text,
                tool_calls: msg
                    .tool_calls
                    .into_iter()
                    .flatten()
                    .enumerate()
                    .map(|(position, call)| tool_call(call, 0, position))
                    .collect(),
                name: msg.name,
            })),
            "tool" => Ok(Self::Tool {
                tool_call_id: msg.tool_call_id.ok_or_else(|| {
                    WireError::InvalidRequest("tool message without tool_call_id".to_owned())
                })?,
                content: text.unwrap_or_default(),
            }),
            other => Err(WireError::InvalidRequest(format!("unsupported message role '{other}'"))),
        }
    }
}

fn content_part(part: OpenAiContentPart) -> Option<ContentPart> {
    match part {
        OpenAiContentPart::Text { text } => Some(ContentPart::Text { text }),
        OpenAiContentPart::ImageUrl { image_url } => Some(ContentPart::Image {
            url: image_url.url,
            detail: image_url.detail.as_deref().and_then(ImageDetail::parse),
        }),
        OpenAiContentPart::Other => None,
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            tool_type: tool.tool_type,
            function: FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

/// Parse the flexible `tool_choice` field; `any` is Mistral's `required`
fn parse_tool_choice(value: &Value) -> Option<ToolChoice> {
    match value {
        Value::String(mode) => match mode.as_str() {
            "none" => Some(ToolChoice::None),
            "auto" => Some(ToolChoice::Auto),
            "required" | "any" => Some(ToolChoice::Required),
            _ => None,
        },
        Value::Object(object) => object
            .get("function")
            .and_then(|function| function.get("name"))
            .and_then(Value::as_str)
            .map(|name| ToolChoice::Named { name: name.to_owned() }),
        _ => None,
    }
}

/// Complete wire tool call; a missing id gets a deterministic `call_{choice}_{position}`
fn tool_call(call: OpenAiToolCall, choice: u32, position: usize) -> ToolCall {
    ToolCall::new(
        call.id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{choice}_{position}")),
        call.function.name,
        call.function.arguments,
    )
}

// -- Outbound: internal request -> vendor request --

/// Translate a canonical request into the body a dialect accepts
///
/// Tool-choice literals follow the dialect, fields it does not accept are
/// omitted, and `n` defaults to 1 where the dialect accepts it. Message
/// order and roles are preserved verbatim.
pub fn normalize_request(
    req: &ChatRequest,
    dialect: &Dialect,
    include_usage: bool,
) -> Result<VendorRequest, WireError> {
    req.validate()?;

    let n = if dialect.accepts_n {
        Some(req.params.n.unwrap_or(1))
    } else {
        if req.params.n.is_some_and(|n| n > 1) {
            tracing::warn!(dialect = %dialect.name, "dialect does not accept n; requesting a single completion");
        }
        None
    };

    let (tools, tool_choice) = if dialect.accepts_tools {
        (
            req.tools.as_ref().map(|tools| tools.iter().map(Into::into).collect()),
            req.tool_choice.as_ref().map(|choice| tool_choice_value(choice, dialect)),
        )
    } else {
        if req.tools.as_ref().is_some_and(|tools| !tools.is_empty()) {
            tracing::warn!(dialect = %dialect.name, "dialect does not accept tools; omitting tool definitions");
        }
        (None, None)
    };

    let wire = OpenAiRequest {
        model: req.model.clone(),
        messages: req.messages.iter().map(Into::into).collect(),
        temperature: req.params.temperature,
        top_p: req.params.top_p,
        max_tokens: req.params.max_tokens,
        stop: req.params.stop.clone(),
        frequency_penalty: req.params.frequency_penalty,
        presence_penalty: req.params.presence_penalty,
        seed: req.params.seed,
        n,
        stream: req.stream.then_some(true),
        tools,
        tool_choice,
        stream_options: (req.stream && include_usage && dialect.accepts_stream_options)
            .then_some(OpenAiStreamOptions { include_usage: true }),
    };

    let mut body = serde_json::to_value(&wire).map_err(|e| WireError::InvalidRequest(e.to_string()))?;

    if let Value::Object(object) = &mut body {
        for field in &dialect.omit_fields {
            if object.remove(field).is_some() {
                tracing::debug!(dialect = %dialect.name, field = %field, "omitting field the dialect does not accept");
            }
        }
    }

    Ok(VendorRequest {
        body,
        stream: req.stream,
    })
}

/// Tool choice in the dialect's accepted literal set
fn tool_choice_value(choice: &ToolChoice, dialect: &Dialect) -> Value {
    match choice {
        ToolChoice::None => Value::String("none".to_owned()),
        ToolChoice::Auto => Value::String("auto".to_owned()),
        ToolChoice::Required => Value::String(dialect.required_tool_choice.clone()),
        ToolChoice::Named { name } => match dialect.named_tool_choice {
            NamedToolChoiceStyle::Object => serde_json::json!({
                "type": "function",
                "function": { "name": name }
            }),
            NamedToolChoiceStyle::Unsupported => {
                tracing::debug!(dialect = %dialect.name, tool = %name, "named tool choice unsupported; requiring any tool");
                Value::String(dialect.required_tool_choice.clone())
            }
        },
    }
}

impl From<&ToolDefinition> for OpenAiTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            tool_type: tool.tool_type.clone(),
            function: OpenAiFunction {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                parameters: tool.function.parameters.clone(),
            },
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let mut wire = Self {
            role: msg.role().as_str().to_owned(),
            content: None,
            name: None,
            tool_calls: None,
            tool_call_id: None,
        };

        match msg {
            Message::System { content, name } => {
                wire.content = Some(OpenAiContent::Text(content.clone()));
                wire.name.clone_from(name);
            }
            Message::User { content, name } => {
                wire.content = Some(match content {
                    UserContent::Text(text) => OpenAiContent::Text(text.clone()),
                    UserContent::Parts(parts) => OpenAiContent::Parts(parts.iter().map(Into::into).collect()),
                });
                wire.name.clone_from(name);
            }
            Message::Assistant(assistant) => {
                wire.content = assistant.content.clone().map(OpenAiContent::Text);
                wire.name.clone_from(&assistant.name);
                if !assistant.tool_calls.is_empty() {
                    wire.tool_calls = Some(
                        assistant
                            .tool_calls
                            .iter()
                            .map(|call| OpenAiToolCall {
                                id: Some(call.id.clone()),
                                tool_type: "function".to_owned(),
                                function: OpenAiFunctionCall {
                                    name: call.function.name.clone(),
                                    arguments: call.function.arguments.clone(),
                                },
                            })
                            .collect(),
                    );
                }
            }
            Message::Tool { tool_call_id, content } => {
                wire.content = Some(OpenAiContent::Text(content.clone()));
                wire.tool_call_id = Some(tool_call_id.clone());
            }
        }

        wire
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { url, detail } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: url.clone(),
                    detail: detail.map(|detail| detail.as_str().to_owned()),
                },
            },
        }
    }
}

// -- Non-streaming responses --

/// Normalize a whole (non-streaming) response body
///
/// An `error` field yields [`ChatOutcome::Failed`] with whatever choices
/// were present. A chunk-shaped body is folded through a one-unit stream.
pub fn normalize_completion(value: &Value, mapper: &FinishReasonMapper) -> Result<ChatOutcome, WireError> {
    match schema::classify(value)? {
        WireUnit::Completion(completion) => Ok(completion_outcome(*completion, mapper)),
        WireUnit::Error(error) => Ok(ChatOutcome::Failed {
            error: WireError::Vendor(error),
            partial: ChatResponse::default(),
        }),
        WireUnit::Chunk(chunk) => {
            tracing::debug!("response body is chunk-shaped, assembling as a single-unit stream");
            let mut assembler = StreamAssembler::new(std::sync::Arc::new(mapper.clone()), usize::MAX);
            assembler.push_chunk(&chunk);
            Ok(assembler.finish())
        }
    }
}

fn completion_outcome(completion: OpenAiResponse, mapper: &FinishReasonMapper) -> ChatOutcome {
    let mut diagnostics = Vec::new();
    let mut choices: Vec<CompletedChoice> = completion
        .choices
        .into_iter()
        .map(|choice| {
            if !schema::is_assistant_role(choice.message.role.as_deref()) {
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::ProtocolInconsistency,
                    unit: 0,
                    message: format!(
                        "choice {} has role '{}'; treating as assistant",
                        choice.index,
                        choice.message.role.as_deref().unwrap_or_default()
                    ),
                });
            }
            completed_choice(choice, mapper)
        })
        .collect();
    choices.sort_by_key(|choice| choice.index);

    let response = ChatResponse {
        id: completion.id.filter(|id| !id.is_empty()),
        model: completion.model.filter(|model| !model.is_empty()),
        choices,
        usage: completion.usage.map(Into::into),
        warnings: completion.warning.as_ref().map(warning_text).into_iter().collect(),
        diagnostics,
        dropped_diagnostics: 0,
    };

    match completion.error {
        Some(detail) => {
            let error = VendorError::from(detail);
            tracing::warn!(error = %error, "vendor error in response body");
            ChatOutcome::Failed {
                error: WireError::Vendor(error),
                partial: response,
            }
        }
        None => ChatOutcome::Completed(response),
    }
}

fn completed_choice(choice: OpenAiChoice, mapper: &FinishReasonMapper) -> CompletedChoice {
    let index = choice.index;
    let message = choice.message;

    let mut tool_calls: Vec<ToolCall> = message
        .tool_calls
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(position, call)| tool_call(call, index, position))
        .collect();

    if let Some(function) = message.function_call {
        let position = tool_calls.len();
        tool_calls.push(ToolCall::new(
            format!("call_{index}_{position}"),
            function.name,
            function.arguments,
        ));
    }

    let content = match message.content.as_ref().map(OpenAiContent::as_text) {
        None if tool_calls.is_empty() => Some(String::new()),
        content => content,
    };

    CompletedChoice {
        index,
        message: AssistantMessage {
            content,
            tool_calls,
            name: None,
        },
        finish_reason: mapper.map(choice.finish_reason.as_deref()),
    }
}

/// Re-express a completion-shaped unit received mid-stream as a chunk
pub fn completion_to_chunk(completion: OpenAiResponse) -> OpenAiStreamChunk {
    OpenAiStreamChunk {
        id: completion.id.unwrap_or_default(),
        object: completion.object,
        created: completion.created,
        model: completion.model,
        choices: completion
            .choices
            .into_iter()
            .map(|choice| OpenAiStreamChoice {
                index: choice.index,
                delta: Some(OpenAiStreamDelta {
                    role: choice.message.role,
                    content: choice.message.content,
                    tool_calls: choice.message.tool_calls.map(|calls| {
                        calls
                            .into_iter()
                            .enumerate()
                            .map(|(position, call)| OpenAiStreamToolCall {
                                index: u32::try_from(position).ok(),
                                id: call.id,
                                tool_type: Some(call.tool_type),
                                function: Some(OpenAiStreamFunctionCall {
                                    name: Some(call.function.name),
                                    arguments: Some(call.function.arguments),
                                }),
                            })
                            .collect()
                    }),
                    function_call: choice.message.function_call.map(|function| OpenAiStreamFunctionCall {
                        name: Some(function.name),
                        arguments: Some(function.arguments),
                    }),
                }),
                message: None,
                finish_reason: choice.finish_reason,
            })
            .collect(),
        usage: completion.usage,
        error: completion.error,
        warning: completion.warning,
    }
}
