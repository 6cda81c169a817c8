//! Scripted vendor SSE streams
//!
//! Builds a raw `text/event-stream` body and replays it to the decoder in
//! arbitrarily sized packets, optionally through a channel so the reader
//! actually waits between packets.

use std::io;
use std::time::Duration;

use chatwire::sse::{self, SseUnit};
use chatwire::{ChatOutcome, StreamAssembler, StreamEvent, WireError};
use futures_util::{Stream, stream};
use serde_json::Value;
use tokio::sync::mpsc;

type Packet = Result<Vec<u8>, io::Error>;

/// Builder for a vendor's SSE response body
#[derive(Debug, Default, Clone)]
pub struct VendorStream {
    body: String,
    failure: Option<String>,
}

impl VendorStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `data:` event carrying a JSON unit
    pub fn chunk(mut self, value: Value) -> Self {
        self.body.push_str(&format!("data: {value}\n\n"));
        self
    }

    /// Append one `data:` event with arbitrary text
    pub fn raw(mut self, data: &str) -> Self {
        self.body.push_str(&format!("data: {data}\n\n"));
        self
    }

    /// Append an SSE comment line (keep-alive)
    pub fn comment(mut self, text: &str) -> Self {
        self.body.push_str(&format!(": {text}\n\n"));
        self
    }

    /// Append the `[DONE]` sentinel
    pub fn done(self) -> Self {
        self.raw(sse::DONE_SENTINEL)
    }

    /// Fail the transport after the body has been delivered
    pub fn then_fail(mut self, message: &str) -> Self {
        self.failure = Some(message.to_owned());
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Body split into packets of `size` bytes
    pub fn packets(&self, size: usize) -> Vec<Packet> {
        let mut packets: Vec<Packet> = self
            .body
            .as_bytes()
            .chunks(size.max(1))
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();

        if let Some(message) = &self.failure {
            packets.push(Err(io::Error::other(message.clone())));
        }

        packets
    }

    /// Decoded units, delivered immediately
    pub fn units(&self, size: usize) -> impl Stream<Item = Result<SseUnit, WireError>> {
        sse::decode_events(stream::iter(self.packets(size)))
    }

    /// Decoded units, with packets trickling through a channel
    pub fn trickle(&self, size: usize, gap: Duration) -> impl Stream<Item = Result<SseUnit, WireError>> {
        let (tx, rx) = mpsc::channel(4);
        let packets = self.packets(size);

        tokio::spawn(async move {
            for packet in packets {
                if tx.send(packet).await.is_err() {
                    break;
                }
                tokio::time::sleep(gap).await;
            }
        });

        let bytes = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|packet| (packet, rx)) });
        sse::decode_events(bytes)
    }
}

/// Replay `vendor` into `assembler`, collecting every event emitted
pub async fn replay(vendor: &VendorStream, size: usize, assembler: StreamAssembler) -> (ChatOutcome, Vec<StreamEvent>) {
    let mut events = Vec::new();
    let outcome = sse::assemble_with(vendor.units(size), assembler, |event| events.push(event)).await;
    (outcome, events)
}

/// Concatenated text deltas for one choice, in arrival order
pub fn streamed_text(events: &[StreamEvent], index: u32) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Delta(delta) if delta.index == index => delta.content.as_deref(),
            _ => None,
        })
        .collect()
}
