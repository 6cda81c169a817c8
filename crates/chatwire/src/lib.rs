//! Wire normalization for `OpenAI`-compatible chat completion APIs
//!
//! Validates vendor payloads against a canonical wire schema, maps
//! vendor finish reasons onto a closed set, folds streamed deltas into
//! complete assistant messages, and shapes outbound requests into the
//! dialect each vendor accepts.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod accumulator;
pub mod assembler;
pub mod convert;
pub mod dialect;
pub mod error;
pub mod finish;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod sse;
pub mod state;
pub mod types;

pub use accumulator::{AccumulatorState, ChoiceAccumulator};
pub use assembler::StreamAssembler;
pub use convert::openai::{VendorRequest, normalize_completion, normalize_request};
pub use dialect::{Dialect, DialectKind, NamedToolChoiceStyle};
pub use error::{Diagnostic, DiagnosticKind, SchemaViolation, WireError};
pub use finish::FinishReasonMapper;
pub use registry::{SharedAssembler, StreamRegistry};
pub use schema::WireUnit;
pub use sse::SseUnit;
pub use state::WireState;
pub use types::{
    ChatOutcome, ChatRequest, ChatResponse, CompletedChoice, FinishReason, Message, StreamEvent, ToolCall, ToolChoice,
    Usage,
};
