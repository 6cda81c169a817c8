//! Internal canonical types for chat request/response representation
//!
//! These types are vendor-agnostic and serve as the normalized internal
//! representation that every dialect converts to and from.

pub mod catalog;
pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use catalog::{Benchmark, ModelCatalog, ModelDescription, ModelInterface, Pricing};
pub use message::{AssistantMessage, ContentPart, FunctionCall, ImageDetail, Message, Role, ToolCall, UserContent};
pub use request::{ChatRequest, SamplingParams};
pub use response::{ChatOutcome, ChatResponse, CompletedChoice, FinishReason, Usage};
pub use stream::{StreamDelta, StreamEvent, StreamFunctionCall, StreamSummary, StreamToolCall, VendorError};
pub use tool::{FunctionDefinition, ToolChoice, ToolDefinition, is_valid_tool_name};
