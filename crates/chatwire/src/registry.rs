//! In-flight stream bookkeeping
//!
//! Each request owns one [`StreamAssembler`]. Nothing is shared between
//! requests; a [`SharedAssembler`] only serializes workers delivering
//! chunks for the same request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde_json::Value;

use crate::assembler::{DEFAULT_MAX_DIAGNOSTICS, StreamAssembler};
use crate::error::{SchemaViolation, WireError};
use crate::finish::FinishReasonMapper;
use crate::types::{ChatOutcome, StreamEvent};

/// One stream's assembler behind a mutex
///
/// The lock is held only for the synchronous fold of a single unit. Once
/// the stream is finished, failed or aborted, further units are ignored.
#[derive(Debug, Clone)]
pub struct SharedAssembler {
    inner: Arc<Mutex<Option<StreamAssembler>>>,
}

impl SharedAssembler {
    pub fn new(assembler: StreamAssembler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(assembler))),
        }
    }

    /// Accumulator state is plain data, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Option<StreamAssembler>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_value(&self, value: &Value) -> Vec<StreamEvent> {
        match self.lock().as_mut() {
            Some(assembler) => assembler.push_value(value),
            None => {
                tracing::debug!("unit for a closed stream ignored");
                Vec::new()
            }
        }
    }

    pub fn record_violation(&self, violation: &SchemaViolation) {
        if let Some(assembler) = self.lock().as_mut() {
            assembler.record_violation(violation);
        }
    }

    pub fn mark_done(&self) {
        if let Some(assembler) = self.lock().as_mut() {
            assembler.mark_done();
        }
    }

    /// Whether the stream has been finished, failed or aborted
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Finish the stream; `None` if it was already closed
    pub fn finish(&self) -> Option<ChatOutcome> {
        self.lock().take().map(StreamAssembler::finish)
    }

    /// Fail the stream; `None` if it was already closed
    pub fn fail(&self, error: WireError) -> Option<ChatOutcome> {
        self.lock().take().map(|assembler| assembler.fail(error))
    }

    /// Abort the stream; `None` if it was already closed
    pub fn abort(&self) -> Option<ChatOutcome> {
        self.lock().take().map(StreamAssembler::abort)
    }
}

/// Independent in-flight streams keyed by request id
#[derive(Debug)]
pub struct StreamRegistry {
    streams: DashMap<String, SharedAssembler>,
    mapper: Arc<FinishReasonMapper>,
    max_diagnostics: usize,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(Arc::new(FinishReasonMapper::default()), DEFAULT_MAX_DIAGNOSTICS)
    }
}

impl StreamRegistry {
    pub fn new(mapper: Arc<FinishReasonMapper>, max_diagnostics: usize) -> Self {
        Self {
            streams: DashMap::new(),
            mapper,
            max_diagnostics,
        }
    }

    /// Start tracking a stream; an existing stream under the same id is aborted
    pub fn open(&self, request_id: impl Into<String>) -> SharedAssembler {
        let request_id = request_id.into();
        let shared = SharedAssembler::new(StreamAssembler::new(Arc::clone(&self.mapper), self.max_diagnostics));

        if let Some(previous) = self.streams.insert(request_id.clone(), shared.clone()) {
            tracing::warn!(request_id = %request_id, "stream reopened; aborting the previous one");
            previous.abort();
        }

        shared
    }

    pub fn get(&self, request_id: &str) -> Option<SharedAssembler> {
        self.streams.get(request_id).map(|entry| entry.value().clone())
    }

    /// Apply one unit to a tracked stream
    pub fn push(&self, request_id: &str, value: &Value) -> Result<Vec<StreamEvent>, WireError> {
        Ok(self.tracked(request_id)?.push_value(value))
    }

    /// Stop tracking and finish the stream
    pub fn finish(&self, request_id: &str) -> Result<ChatOutcome, WireError> {
        self.close(request_id, SharedAssembler::finish)
    }

    /// Stop tracking and fail the stream with a terminal error
    pub fn fail(&self, request_id: &str, error: WireError) -> Result<ChatOutcome, WireError> {
        self.close(request_id, |shared| shared.fail(error))
    }

    /// Stop tracking and discard the stream
    pub fn abort(&self, request_id: &str) -> Result<ChatOutcome, WireError> {
        self.close(request_id, SharedAssembler::abort)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn tracked(&self, request_id: &str) -> Result<SharedAssembler, WireError> {
        self.get(request_id).ok_or_else(|| unknown(request_id))
    }

    fn close(
        &self,
        request_id: &str,
        end: impl FnOnce(&SharedAssembler) -> Option<ChatOutcome>,
    ) -> Result<ChatOutcome, WireError> {
        let (_, shared) = self.streams.remove(request_id).ok_or_else(|| unknown(request_id))?;
        end(&shared).ok_or_else(|| unknown(request_id))
    }
}

fn unknown(request_id: &str) -> WireError {
    WireError::UnknownStream {
        request_id: request_id.to_owned(),
    }
}
