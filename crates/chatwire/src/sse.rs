//! Server-sent events edge of the inbound path
//!
//! Decodes an SSE byte stream into JSON units and drives a
//! [`StreamAssembler`] to an outcome. Fetching, reconnecting and
//! backpressure stay with the transport.

use std::fmt::Display;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt, future};
use serde_json::Value;

use crate::assembler::StreamAssembler;
use crate::error::{SchemaViolation, WireError};
use crate::types::{ChatOutcome, StreamEvent};

/// Vendor end-of-stream sentinel
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseUnit {
    /// Event data parsed as JSON
    Json(Value),
    /// The `[DONE]` sentinel
    Done,
    /// Event data that is not JSON, or an undecodable event
    Malformed(SchemaViolation),
}

/// Decode the `data` of one event; keep-alive events with no data yield `None`
pub fn decode_data(data: &str) -> Option<SseUnit> {
    let data = data.trim();

    if data.is_empty() {
        return None;
    }

    if data == DONE_SENTINEL {
        return Some(SseUnit::Done);
    }

    Some(match serde_json::from_str(data) {
        Ok(value) => SseUnit::Json(value),
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "unparseable SSE data");
            SseUnit::Malformed(SchemaViolation::new("$", format!("JSON event data ({e})")))
        }
    })
}

/// Turn an SSE byte stream into decoded units
///
/// Transport errors surface as `WireError::Transport`; undecodable events
/// become [`SseUnit::Malformed`] and the stream continues.
pub fn decode_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseUnit, WireError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    bytes.eventsource().filter_map(|result| {
        future::ready(match result {
            Ok(event) => decode_data(&event.data).map(Ok),
            Err(EventStreamError::Transport(e)) => Some(Err(WireError::Transport(e.to_string()))),
            Err(e) => Some(Ok(SseUnit::Malformed(SchemaViolation::new(
                "$",
                format!("decodable SSE event ({e})"),
            )))),
        })
    })
}

/// Drive `assembler` over `units` until the stream ends
pub async fn assemble<S>(units: S, assembler: StreamAssembler) -> ChatOutcome
where
    S: Stream<Item = Result<SseUnit, WireError>>,
{
    assemble_with(units, assembler, |_| {}).await
}

/// Drive `assembler` over `units`, handing every event to `on_event`
///
/// Reading stops at the done sentinel or a vendor error. The closing
/// `Finished` and `Summary` events are delivered last.
pub async fn assemble_with<S, F>(units: S, mut assembler: StreamAssembler, mut on_event: F) -> ChatOutcome
where
    S: Stream<Item = Result<SseUnit, WireError>>,
    F: FnMut(StreamEvent),
{
    let mut units = std::pin::pin!(units);

    while let Some(unit) = units.next().await {
        match unit {
            Ok(SseUnit::Json(value)) => assembler.push_value(&value).into_iter().for_each(&mut on_event),
            Ok(SseUnit::Done) => assembler.mark_done(),
            Ok(SseUnit::Malformed(violation)) => assembler.record_violation(&violation),
            Err(error) => {
                let outcome = assembler.fail(error);
                outcome.terminal_events().into_iter().for_each(&mut on_event);
                return outcome;
            }
        }

        if assembler.is_terminated() {
            break;
        }
    }

    let outcome = assembler.finish();
    outcome.terminal_events().into_iter().for_each(on_event);
    outcome
}
