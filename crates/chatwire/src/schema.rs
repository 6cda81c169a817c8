//! Permissive structural validation of vendor wire units
//!
//! Required and typed fields are enumerated as [`FieldRule`] tables. Fields
//! missing from a table are never inspected, so undocumented vendor fields
//! pass through. `null` is accepted wherever a field is optional.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::SchemaViolation;
use crate::protocol::openai::{OpenAiErrorResponse, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};
use crate::types::VendorError;

/// `object` tag of a streaming chunk
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// `object` tag of a whole completion body
pub const COMPLETION_OBJECT: &str = "chat.completion";

/// JSON type a field must have when present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Non-negative integer fitting in 32 bits
    Count,
    /// Non-negative integer (timestamps, seeds)
    Integer,
    Number,
    Bool,
    Object,
    Array,
    /// Message content: a string or an array of content parts
    Content,
    /// A string or an object (tool choice, error, function arguments)
    StringOrObject,
    /// A string or an array of strings
    StringOrArray,
}

impl FieldKind {
    /// Shape description used in violations
    pub const fn expected(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Count => "non-negative 32-bit integer",
            Self::Integer => "non-negative integer",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Content => "string or array of content parts",
            Self::StringOrObject => "string or object",
            Self::StringOrArray => "string or array of strings",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Count => value.as_u64().is_some_and(|n| u32::try_from(n).is_ok()),
            Self::Integer => value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Content => value.is_string() || value.is_array(),
            Self::StringOrObject => value.is_string() || value.is_object(),
            Self::StringOrArray => {
                value.is_string() || value.as_array().is_some_and(|items| items.iter().all(Value::is_string))
            }
        }
    }
}

/// How a present field is checked beyond its kind
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Leaf,
    /// Object fields checked against nested rules
    Object(&'static [FieldRule]),
    /// Every array element checked against nested rules
    Items(&'static [FieldRule]),
    /// Array elements are content parts, checked by their `type`
    Parts,
}

/// One enumerated field of a wire shape
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub shape: Shape,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            shape: Shape::Leaf,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            shape: Shape::Leaf,
        }
    }

    const fn with(self, shape: Shape) -> Self {
        Self { shape, ..self }
    }
}

use FieldKind as K;
use FieldRule as R;

const USAGE: &[FieldRule] = &[
    R::optional("prompt_tokens", K::Count),
    R::optional("completion_tokens", K::Count),
    R::optional("total_tokens", K::Count),
];

const ERROR_DETAIL: &[FieldRule] = &[R::optional("message", K::String), R::optional("type", K::String)];

const STREAM_FUNCTION: &[FieldRule] = &[
    R::optional("name", K::String),
    R::optional("arguments", K::StringOrObject),
];

const STREAM_TOOL_CALL: &[FieldRule] = &[
    R::optional("index", K::Count),
    R::optional("id", K::String),
    R::optional("type", K::String),
    R::optional("function", K::Object).with(Shape::Object(STREAM_FUNCTION)),
];

const DELTA: &[FieldRule] = &[
    R::optional("role", K::String),
    R::optional("content", K::Content).with(Shape::Parts),
    R::optional("tool_calls", K::Array).with(Shape::Items(STREAM_TOOL_CALL)),
    R::optional("function_call", K::Object).with(Shape::Object(STREAM_FUNCTION)),
];

const STREAM_CHOICE: &[FieldRule] = &[
    R::optional("index", K::Count),
    R::optional("delta", K::Object).with(Shape::Object(DELTA)),
    R::optional("message", K::Object).with(Shape::Object(DELTA)),
    R::optional("finish_reason", K::String),
];

/// Streaming chunk; only `id` and `choices` are structurally required
pub const CHUNK: &[FieldRule] = &[
    R::required("id", K::String),
    R::optional("object", K::String),
    R::optional("created", K::Integer),
    R::optional("model", K::String),
    R::required("choices", K::Array).with(Shape::Items(STREAM_CHOICE)),
    R::optional("usage", K::Object).with(Shape::Object(USAGE)),
    R::optional("error", K::StringOrObject).with(Shape::Object(ERROR_DETAIL)),
];

const FUNCTION_CALL: &[FieldRule] = &[
    R::required("name", K::String),
    R::optional("arguments", K::StringOrObject),
];

const TOOL_CALL: &[FieldRule] = &[
    R::optional("id", K::String),
    R::optional("type", K::String),
    R::required("function", K::Object).with(Shape::Object(FUNCTION_CALL)),
];

const RESPONSE_MESSAGE: &[FieldRule] = &[
    R::optional("role", K::String),
    R::optional("content", K::Content).with(Shape::Parts),
    R::optional("tool_calls", K::Array).with(Shape::Items(TOOL_CALL)),
    R::optional("function_call", K::Object).with(Shape::Object(FUNCTION_CALL)),
];

const COMPLETION_CHOICE: &[FieldRule] = &[
    R::optional("index", K::Count),
    R::required("message", K::Object).with(Shape::Object(RESPONSE_MESSAGE)),
    R::optional("finish_reason", K::String),
];

/// Non-streaming completion body
pub const COMPLETION: &[FieldRule] = &[
    R::optional("id", K::String),
    R::optional("object", K::String),
    R::optional("created", K::Integer),
    R::optional("model", K::String),
    R::required("choices", K::Array).with(Shape::Items(COMPLETION_CHOICE)),
    R::optional("usage", K::Object).with(Shape::Object(USAGE)),
    R::optional("error", K::StringOrObject).with(Shape::Object(ERROR_DETAIL)),
];

/// Request message; role-specific requirements are checked in [`validate_message`]
pub const MESSAGE: &[FieldRule] = &[
    R::required("role", K::String),
    R::optional("content", K::Content).with(Shape::Parts),
    R::optional("name", K::String),
    R::optional("tool_calls", K::Array).with(Shape::Items(TOOL_CALL)),
    R::optional("tool_call_id", K::String),
];

const FUNCTION_DEFINITION: &[FieldRule] = &[
    R::required("name", K::String),
    R::optional("description", K::String),
    R::optional("parameters", K::Object),
];

const TOOL: &[FieldRule] = &[
    R::required("type", K::String),
    R::required("function", K::Object).with(Shape::Object(FUNCTION_DEFINITION)),
];

const STREAM_OPTIONS: &[FieldRule] = &[R::optional("include_usage", K::Bool)];

/// Request body
pub const REQUEST: &[FieldRule] = &[
    R::required("model", K::String),
    R::required("messages", K::Array).with(Shape::Items(MESSAGE)),
    R::optional("temperature", K::Number),
    R::optional("top_p", K::Number),
    R::optional("max_tokens", K::Count),
    R::optional("stop", K::StringOrArray),
    R::optional("frequency_penalty", K::Number),
    R::optional("presence_penalty", K::Number),
    R::optional("seed", K::Integer),
    R::optional("n", K::Count),
    R::optional("stream", K::Bool),
    R::optional("tools", K::Array).with(Shape::Items(TOOL)),
    R::optional("tool_choice", K::StringOrObject),
    R::optional("stream_options", K::Object).with(Shape::Object(STREAM_OPTIONS)),
];

const ERROR_ONLY: &[FieldRule] = &[R::required("error", K::StringOrObject).with(Shape::Object(ERROR_DETAIL))];

const PART: &[FieldRule] = &[R::required("type", K::String)];

const TEXT_PART: &[FieldRule] = &[R::required("text", K::String)];

const IMAGE_URL: &[FieldRule] = &[R::required("url", K::String), R::optional("detail", K::String)];

const IMAGE_PART: &[FieldRule] = &[R::required("image_url", K::Object).with(Shape::Object(IMAGE_URL))];

/// A validated inbound unit, dispatched by shape
#[derive(Debug, Clone)]
pub enum WireUnit {
    /// Streaming chunk
    Chunk(Box<OpenAiStreamChunk>),
    /// Whole completion body, or a completion-tagged unit without deltas
    Completion(Box<OpenAiResponse>),
    /// Error payload without `choices`
    Error(VendorError),
}

/// Check `value` against `rules`, reporting the first violation
pub fn check(value: &Value, rules: &[FieldRule]) -> Result<(), SchemaViolation> {
    check_at(value, rules, "")
}

fn check_at(value: &Value, rules: &[FieldRule], path: &str) -> Result<(), SchemaViolation> {
    let Some(object) = value.as_object() else {
        return Err(SchemaViolation::new(display_path(path), "object"));
    };

    for rule in rules {
        let field_path = join(path, rule.name);

        let field = match object.get(rule.name) {
            None | Some(Value::Null) if rule.required => {
                return Err(SchemaViolation::new(field_path, rule.kind.expected()));
            }
            None | Some(Value::Null) => continue,
            Some(field) => field,
        };

        if !rule.kind.matches(field) {
            return Err(SchemaViolation::new(field_path, rule.kind.expected()));
        }

        match (rule.shape, field) {
            (Shape::Object(nested), Value::Object(_)) => check_at(field, nested, &field_path)?,
            (Shape::Items(nested), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    check_at(item, nested, &format!("{field_path}[{i}]"))?;
                }
            }
            (Shape::Parts, Value::Array(parts)) => {
                for (i, part) in parts.iter().enumerate() {
                    check_part(part, &format!("{field_path}[{i}]"))?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Text and image parts need their payload; other part types are passed through
fn check_part(part: &Value, path: &str) -> Result<(), SchemaViolation> {
    check_at(part, PART, path)?;

    match part.get("type").and_then(Value::as_str) {
        Some("text") => check_at(part, TEXT_PART, path),
        Some("image_url") => check_at(part, IMAGE_PART, path),
        _ => Ok(()),
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() { "$".to_owned() } else { path.to_owned() }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, SchemaViolation> {
    T::deserialize(value).map_err(|e| SchemaViolation::new("$", e.to_string()))
}

/// Validate a streaming chunk
pub fn validate_chunk(value: &Value) -> Result<OpenAiStreamChunk, SchemaViolation> {
    check(value, CHUNK)?;
    decode(value)
}

/// Validate a whole completion body
pub fn validate_completion(value: &Value) -> Result<OpenAiResponse, SchemaViolation> {
    check(value, COMPLETION)?;
    decode(value)
}

/// Validate a single request message, including its role-specific fields
pub fn validate_message(value: &Value) -> Result<OpenAiMessage, SchemaViolation> {
    validate_message_at(value, "")
}

fn validate_message_at(value: &Value, path: &str) -> Result<OpenAiMessage, SchemaViolation> {
    check_at(value, MESSAGE, path)?;

    let role_path = join(path, "role");
    let needs = |field: &str| {
        value
            .get(field)
            .is_some_and(|v| !v.is_null())
            .then_some(())
            .ok_or_else(|| SchemaViolation::new(join(path, field), "present for this role"))
    };

    match value.get("role").and_then(Value::as_str) {
        Some("system" | "developer" | "user") => needs("content")?,
        Some("tool") => {
            needs("tool_call_id")?;
            needs("content")?;
        }
        Some("assistant") => {
            if needs("content").is_err() && needs("tool_calls").is_err() {
                return Err(SchemaViolation::new(join(path, "content"), "content or tool_calls"));
            }
        }
        _ => {
            return Err(SchemaViolation::new(
                role_path,
                "one of system, developer, user, assistant, tool",
            ));
        }
    }

    decode(value)
}

/// Validate a request body and each of its messages
pub fn validate_request(value: &Value) -> Result<OpenAiRequest, SchemaViolation> {
    check(value, REQUEST)?;

    if let Some(messages) = value.get("messages").and_then(Value::as_array) {
        for (i, message) in messages.iter().enumerate() {
            validate_message_at(message, &format!("messages[{i}]"))?;
        }
    }

    decode(value)
}

/// Dispatch an inbound unit to its shape and validate it
///
/// Error-only payloads become [`WireUnit::Error`]. A unit tagged
/// `chat.completion` whose choices carry `delta` is still a chunk, and an
/// untagged or empty-tagged unit is classified by whether its choices carry
/// `delta` or `message`.
pub fn classify(value: &Value) -> Result<WireUnit, SchemaViolation> {
    let Some(object) = value.as_object() else {
        return Err(SchemaViolation::new("$", "object"));
    };

    if is_error_only(object) {
        check(value, ERROR_ONLY)?;
        let payload: OpenAiErrorResponse = decode(value)?;
        return Ok(WireUnit::Error(payload.error.into()));
    }

    if is_completion_shaped(object) {
        validate_completion(value).map(|completion| WireUnit::Completion(Box::new(completion)))
    } else {
        validate_chunk(value).map(|chunk| WireUnit::Chunk(Box::new(chunk)))
    }
}

fn is_error_only(object: &Map<String, Value>) -> bool {
    !object.contains_key("choices")
        && object.get("error").is_some_and(|error| !error.is_null())
}

fn is_completion_shaped(object: &Map<String, Value>) -> bool {
    let choices = object.get("choices").and_then(Value::as_array);
    let has = |field: &str| choices.is_some_and(|choices| choices.iter().any(|c| c.get(field).is_some()));

    match object.get("object").and_then(Value::as_str) {
        Some(CHUNK_OBJECT) => false,
        Some(COMPLETION_OBJECT) => !has("delta"),
        tag => {
            if let Some(tag) = tag
                && !tag.is_empty()
            {
                tracing::debug!(object = tag, "unrecognised object tag, classifying by shape");
            }
            !has("delta") && has("message")
        }
    }
}

/// Whether a delta `role` is one an assistant stream may carry
pub fn is_assistant_role(role: Option<&str>) -> bool {
    matches!(role, None | Some("" | "assistant"))
}
