//! Multi-choice stream assembly
//!
//! A [`StreamAssembler`] owns one request's choice accumulators. Every
//! inbound unit yields zero or more [`StreamEvent`]s for live display; the
//! assembler is consumed by [`finish`](StreamAssembler::finish),
//! [`fail`](StreamAssembler::fail) or [`abort`](StreamAssembler::abort).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::accumulator::{AccumulatorState, ChoiceAccumulator};
use crate::convert::openai::{completion_to_chunk, warning_text};
use crate::error::{Diagnostic, DiagnosticKind, SchemaViolation, WireError};
use crate::finish::FinishReasonMapper;
use crate::protocol::openai::{OpenAiStreamChoice, OpenAiStreamChunk};
use crate::schema::{self, WireUnit};
use crate::types::{ChatOutcome, ChatResponse, StreamDelta, StreamEvent, Usage, VendorError};

/// Default retention limit for diagnostics
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 256;

/// Folds one request's stream of wire units into canonical messages
#[derive(Debug)]
pub struct StreamAssembler {
    mapper: Arc<FinishReasonMapper>,
    max_diagnostics: usize,
    choices: BTreeMap<u32, ChoiceAccumulator>,
    id: Option<String>,
    model: Option<String>,
    usage: Option<Usage>,
    warnings: Vec<String>,
    vendor_error: Option<VendorError>,
    done: bool,
    units: u64,
    diagnostics: Vec<Diagnostic>,
    dropped_diagnostics: u64,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new(Arc::new(FinishReasonMapper::default()), DEFAULT_MAX_DIAGNOSTICS)
    }
}

impl StreamAssembler {
    pub fn new(mapper: Arc<FinishReasonMapper>, max_diagnostics: usize) -> Self {
        Self {
            mapper,
            max_diagnostics,
            choices: BTreeMap::new(),
            id: None,
            model: None,
            usage: None,
            warnings: Vec::new(),
            vendor_error: None,
            done: false,
            units: 0,
            diagnostics: Vec::new(),
            dropped_diagnostics: 0,
        }
    }

    /// Validate and apply one decoded JSON unit
    ///
    /// Malformed units are recorded as diagnostics and dropped; they never
    /// disturb state accumulated for other choices.
    pub fn push_value(&mut self, value: &Value) -> Vec<StreamEvent> {
        let unit = self.next_unit();

        if self.ignoring(unit) {
            return Vec::new();
        }

        match schema::classify(value) {
            Ok(WireUnit::Chunk(chunk)) => self.apply_chunk(unit, &chunk),
            Ok(WireUnit::Completion(completion)) => {
                tracing::debug!(unit, "completion-shaped unit inside a stream, applying as a chunk");
                self.apply_chunk(unit, &completion_to_chunk(*completion))
            }
            Ok(WireUnit::Error(error)) => self.apply_vendor_error(error),
            Err(violation) => {
                self.violation(unit, &violation);
                Vec::new()
            }
        }
    }

    /// Apply an already validated chunk
    pub fn push_chunk(&mut self, chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
        let unit = self.next_unit();

        if self.ignoring(unit) {
            return Vec::new();
        }

        self.apply_chunk(unit, chunk)
    }

    /// Record a unit the transport could not even decode
    pub fn record_violation(&mut self, violation: &SchemaViolation) {
        let unit = self.next_unit();
        self.violation(unit, violation);
    }

    /// Note the vendor's end-of-stream sentinel; later units are ignored
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Whether a vendor error, the done sentinel or a usage-only unit has
    /// ended the stream
    pub const fn is_terminated(&self) -> bool {
        self.done || self.vendor_error.is_some()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub const fn dropped_diagnostics(&self) -> u64 {
        self.dropped_diagnostics
    }

    /// Last usage totals seen on any unit
    pub const fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// State of a choice, if it has received anything
    pub fn choice_state(&self, index: u32) -> Option<AccumulatorState> {
        self.choices.get(&index).map(ChoiceAccumulator::state)
    }

    /// Number of choices that received data
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// End the stream normally
    ///
    /// Every choice that received data is finalized; one never given a
    /// finish reason finishes as `Unknown`. A vendor error seen on any unit
    /// turns the outcome into [`ChatOutcome::Failed`] carrying the partial
    /// response.
    pub fn finish(mut self) -> ChatOutcome {
        match self.vendor_error.take() {
            Some(error) => ChatOutcome::Failed {
                error: WireError::Vendor(error),
                partial: self.into_response(),
            },
            None => ChatOutcome::Completed(self.into_response()),
        }
    }

    /// End the stream on a request-terminal failure, keeping partial output
    pub fn fail(self, error: WireError) -> ChatOutcome {
        tracing::warn!(error = %error, choices = self.choices.len(), "stream failed");
        ChatOutcome::Failed {
            error,
            partial: self.into_response(),
        }
    }

    /// Discard the stream; partial choices are never delivered
    pub fn abort(self) -> ChatOutcome {
        tracing::debug!(choices = self.choices.len(), "stream aborted");
        ChatOutcome::Cancelled {
            diagnostics: self.diagnostics,
        }
    }

    fn into_response(self) -> ChatResponse {
        ChatResponse {
            id: self.id,
            model: self.model,
            choices: self.choices.into_values().map(ChoiceAccumulator::finalize).collect(),
            usage: self.usage,
            warnings: self.warnings,
            diagnostics: self.diagnostics,
            dropped_diagnostics: self.dropped_diagnostics,
        }
    }

    fn next_unit(&mut self) -> u64 {
        let unit = self.units;
        self.units += 1;
        unit
    }

    fn ignoring(&self, unit: u64) -> bool {
        if self.is_terminated() {
            tracing::debug!(unit, "ignoring unit after end of stream");
            return true;
        }
        false
    }

    fn apply_chunk(&mut self, unit: u64, chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if self.id.is_none() && !chunk.id.is_empty() {
            self.id = Some(chunk.id.clone());
        }
        if let Some(model) = chunk.model.as_ref().filter(|model| !model.is_empty()) {
            self.model = Some(model.clone());
        }

        for choice in &chunk.choices {
            self.apply_choice(unit, choice, &mut events);
        }

        if let Some(usage) = chunk.usage {
            let usage = Usage::from(usage);
            self.usage = Some(usage);
            events.push(StreamEvent::Usage(usage));

            // a usage-only unit closes the stream; empty preambles carry no usage
            if chunk.choices.is_empty() {
                tracing::debug!(unit, "usage-only unit ends the stream");
                self.done = true;
            }
        }

        if let Some(warning) = &chunk.warning {
            let text = warning_text(warning);
            tracing::debug!(unit, warning = %text, "vendor warning");
            self.warnings.push(text.clone());
            events.push(StreamEvent::Warning(text));
        }

        if let Some(detail) = chunk.error.clone() {
            events.extend(self.apply_vendor_error(detail.into()));
        }

        events
    }

    fn apply_choice(&mut self, unit: u64, choice: &OpenAiStreamChoice, events: &mut Vec<StreamEvent>) {
        let role = choice.payload().and_then(|delta| delta.role.as_deref());
        if !schema::is_assistant_role(role) {
            self.inconsistency(
                unit,
                format!(
                    "choice {} delta has role '{}'; treating as assistant",
                    choice.index,
                    role.unwrap_or_default()
                ),
            );
        }

        let has_payload = choice.payload().is_some_and(|delta| {
            delta.content.as_ref().is_some_and(|content| !content.as_text().is_empty())
                || delta.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
                || delta.function_call.is_some()
        });

        let finishing = choice.finish_reason.as_deref().is_some_and(|token| !token.is_empty());
        if !has_payload && !finishing && !self.choices.contains_key(&choice.index) {
            return;
        }

        let accumulator = self
            .choices
            .entry(choice.index)
            .or_insert_with(|| ChoiceAccumulator::new(choice.index));

        let mut inconsistencies = Vec::new();

        if let Some(delta) = choice.payload() {
            let applied = accumulator.apply_delta(delta);
            events.extend(applied.deltas.into_iter().map(StreamEvent::Delta));
            inconsistencies = applied.inconsistencies;
        }

        if let Some(token) = choice.finish_reason.as_deref()
            && let Some(reason) = accumulator.apply_finish(token, &self.mapper)
        {
            events.push(StreamEvent::Delta(StreamDelta::finish(choice.index, reason)));
        }

        for message in inconsistencies {
            self.inconsistency(unit, message);
        }
    }

    fn apply_vendor_error(&mut self, error: VendorError) -> Vec<StreamEvent> {
        tracing::warn!(error = %error, choices = self.choices.len(), "vendor error in stream");
        self.vendor_error = Some(error.clone());
        vec![StreamEvent::VendorError(error)]
    }

    fn violation(&mut self, unit: u64, violation: &SchemaViolation) {
        tracing::warn!(unit, error = %violation, "dropping malformed unit");
        self.record(DiagnosticKind::SchemaViolation, unit, violation.to_string());
    }

    fn inconsistency(&mut self, unit: u64, message: String) {
        tracing::warn!(unit, detail = %message, "protocol inconsistency");
        self.record(DiagnosticKind::ProtocolInconsistency, unit, message);
    }

    fn record(&mut self, kind: DiagnosticKind, unit: u64, message: String) {
        if self.diagnostics.len() < self.max_diagnostics {
            self.diagnostics.push(Diagnostic { kind, unit, message });
        } else {
            self.dropped_diagnostics += 1;
        }
    }
}
