//! Per-choice folding of streamed deltas into one assistant message
//!
//! Text is appended, never replaced. Tool-call fragments are addressed by
//! index; a fragment without an index continues the most recently addressed
//! tool call of the same choice. A `null` field is "no update", never "clear".

use std::collections::BTreeMap;

use crate::finish::FinishReasonMapper;
use crate::protocol::openai::{OpenAiContent, OpenAiStreamDelta, OpenAiStreamFunctionCall};
use crate::types::{
    AssistantMessage, CompletedChoice, FinishReason, StreamDelta, StreamFunctionCall, StreamToolCall, ToolCall,
};

/// Lifecycle of one choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Created, nothing applied yet
    Empty,
    /// Received content or tool-call fragments
    Accumulating,
    /// A finish reason arrived; buffers are frozen
    Finalized,
}

#[derive(Debug, Clone, Default)]
struct ToolCallSlot {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Result of applying one delta
#[derive(Debug, Default)]
pub struct Applied {
    /// Observable increments, in application order
    pub deltas: Vec<StreamDelta>,
    /// Disagreements with earlier state that were merged best-effort
    pub inconsistencies: Vec<String>,
}

/// One tool-call fragment, from `tool_calls[]` or a legacy `function_call`
struct Fragment<'a> {
    index: Option<u32>,
    id: Option<&'a str>,
    function: Option<&'a OpenAiStreamFunctionCall>,
}

/// Running state of one choice
#[derive(Debug, Clone)]
pub struct ChoiceAccumulator {
    index: u32,
    state: AccumulatorState,
    content: Option<String>,
    tool_calls: BTreeMap<u32, ToolCallSlot>,
    last_tool_index: Option<u32>,
    finish_reason: Option<FinishReason>,
}

impl ChoiceAccumulator {
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            state: AccumulatorState::Empty,
            content: None,
            tool_calls: BTreeMap::new(),
            last_tool_index: None,
            finish_reason: None,
        }
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn state(&self) -> AccumulatorState {
        self.state
    }

    pub const fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Fold one delta into the buffers
    ///
    /// Content and tool-call fragments arriving after finalization are
    /// ignored and reported as inconsistencies.
    pub fn apply_delta(&mut self, delta: &OpenAiStreamDelta) -> Applied {
        let mut applied = Applied::default();

        let text = delta.content.as_ref().map(OpenAiContent::as_text).unwrap_or_default();
        let fragments = fragments(delta);

        if self.state == AccumulatorState::Finalized {
            if !text.is_empty() || !fragments.is_empty() {
                applied.inconsistencies.push(format!(
                    "choice {} received content after its finish reason; ignored",
                    self.index
                ));
            }
            return applied;
        }

        if !text.is_empty() {
            self.content.get_or_insert_with(String::new).push_str(&text);
            self.state = AccumulatorState::Accumulating;
            applied.deltas.push(StreamDelta::text(self.index, text));
        }

        for fragment in fragments {
            let tool_call = self.apply_fragment(&fragment, &mut applied.inconsistencies);
            self.state = AccumulatorState::Accumulating;
            applied.deltas.push(StreamDelta::tool_call(self.index, tool_call));
        }

        applied
    }

    fn apply_fragment(&mut self, fragment: &Fragment<'_>, inconsistencies: &mut Vec<String>) -> StreamToolCall {
        let id = fragment.id.filter(|id| !id.is_empty());
        let position = self.resolve_index(fragment.index, id, inconsistencies);
        let choice = self.index;
        let slot = self.tool_calls.entry(position).or_default();

        if let Some(id) = id {
            if let Some(previous) = &slot.id
                && previous != id
            {
                inconsistencies.push(format!(
                    "choice {choice} tool call {position} id changed from '{previous}' to '{id}'"
                ));
            }
            slot.id = Some(id.to_owned());
        }

        let name = fragment
            .function
            .and_then(|function| function.name.as_deref())
            .filter(|name| !name.is_empty());
        if let Some(name) = name {
            match &slot.name {
                None => slot.name = Some(name.to_owned()),
                Some(first) if first != name => inconsistencies.push(format!(
                    "choice {choice} tool call {position} renamed from '{first}' to '{name}'; keeping the first name"
                )),
                Some(_) => {}
            }
        }

        let arguments = fragment.function.and_then(|function| function.arguments.as_deref());
        if let Some(arguments) = arguments {
            slot.arguments.push_str(arguments);
        }

        self.last_tool_index = Some(position);

        StreamToolCall {
            index: position,
            id: id.map(str::to_owned),
            function: fragment.function.map(|function| StreamFunctionCall {
                name: name.map(str::to_owned),
                arguments: arguments.map(str::to_owned),
            }),
        }
    }

    /// Explicit index, else the last index used by this choice
    ///
    /// An implicit fragment carrying an id that differs from the current
    /// slot's id opens a new slot after the highest index seen.
    fn resolve_index(&self, explicit: Option<u32>, id: Option<&str>, inconsistencies: &mut Vec<String>) -> u32 {
        if let Some(index) = explicit {
            return index;
        }

        let Some(last) = self.last_tool_index else {
            return 0;
        };

        if let Some(id) = id
            && let Some(current) = self.tool_calls.get(&last).and_then(|slot| slot.id.as_deref())
            && current != id
        {
            let next = self.tool_calls.keys().next_back().map_or(0, |max| max.saturating_add(1));
            inconsistencies.push(format!(
                "choice {} tool call without index carries new id '{id}'; opening tool call {next}",
                self.index
            ));
            return next;
        }

        last
    }

    /// Record a vendor finish-reason token
    ///
    /// Returns the effective reason when the choice is (or stays) finalized.
    /// The latest recognised token wins, a token mapping to `Unknown` never
    /// replaces a recognised one, and an empty token does not finalize.
    pub fn apply_finish(&mut self, token: &str, mapper: &FinishReasonMapper) -> Option<FinishReason> {
        let mapped = mapper.map(Some(token));

        if token.is_empty() && !mapped.is_known() {
            tracing::debug!(choice = self.index, "ignoring empty finish reason");
            return None;
        }

        let effective = match self.finish_reason {
            Some(current) if current.is_known() && !mapped.is_known() => current,
            _ => mapped,
        };

        self.finish_reason = Some(effective);
        self.state = AccumulatorState::Finalized;
        Some(effective)
    }

    /// Consume the accumulator into a completed choice
    ///
    /// A choice that never saw a finish reason finishes as `Unknown`.
    /// Tool-call arguments are handed over verbatim, valid JSON or not.
    pub fn finalize(self) -> CompletedChoice {
        let choice = self.index;

        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .map(|(position, slot)| {
                ToolCall::new(
                    slot.id.unwrap_or_else(|| format!("call_{choice}_{position}")),
                    slot.name.unwrap_or_default(),
                    slot.arguments,
                )
            })
            .collect();

        let content = match self.content {
            None if tool_calls.is_empty() => Some(String::new()),
            content => content,
        };

        CompletedChoice {
            index: choice,
            message: AssistantMessage {
                content,
                tool_calls,
                name: None,
            },
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Unknown),
        }
    }
}

fn fragments(delta: &OpenAiStreamDelta) -> Vec<Fragment<'_>> {
    let mut fragments: Vec<Fragment<'_>> = delta
        .tool_calls
        .iter()
        .flatten()
        .map(|call| Fragment {
            index: call.index,
            id: call.id.as_deref(),
            function: call.function.as_ref(),
        })
        .collect();

    if let Some(function) = &delta.function_call {
        fragments.push(Fragment {
            index: None,
            id: None,
            function: Some(function),
        });
    }

    fragments
}
