//! Configured entry point tying dialects, finish-reason table and stream
//! settings together

use std::collections::HashMap;
use std::sync::Arc;

use chatwire_config::{Config, StreamConfig};
use serde_json::Value;

use crate::assembler::StreamAssembler;
use crate::convert::openai::{self, VendorRequest};
use crate::dialect::{Dialect, DialectKind};
use crate::error::WireError;
use crate::finish::FinishReasonMapper;
use crate::registry::StreamRegistry;
use crate::types::{ChatOutcome, ChatRequest};

/// Shared, read-only normalization state built once from configuration
#[derive(Debug, Clone)]
pub struct WireState {
    inner: Arc<WireStateInner>,
}

#[derive(Debug)]
struct WireStateInner {
    mapper: Arc<FinishReasonMapper>,
    dialects: HashMap<String, Dialect>,
    stream: StreamConfig,
}

impl Default for WireState {
    fn default() -> Self {
        Self::with_parts(FinishReasonMapper::default(), HashMap::new(), StreamConfig::default())
    }
}

impl WireState {
    /// Build state from configuration
    ///
    /// # Errors
    ///
    /// Returns `UnknownDialect` if a configured dialect names an unknown base
    pub fn new(config: &Config) -> Result<Self, WireError> {
        let mut dialects = HashMap::with_capacity(config.dialects.len());
        for (name, dialect_config) in &config.dialects {
            let dialect = Dialect::from_config(name, dialect_config)?;
            tracing::debug!(dialect = %name, base = %dialect.kind.name(), "dialect configured");
            dialects.insert(name.to_ascii_lowercase(), dialect);
        }

        let mapper = FinishReasonMapper::with_overrides(&config.finish_reasons);
        tracing::debug!(
            dialects = dialects.len(),
            finish_tokens = mapper.len(),
            "wire state initialized"
        );

        Ok(Self::with_parts(mapper, dialects, config.stream.clone()))
    }

    fn with_parts(mapper: FinishReasonMapper, dialects: HashMap<String, Dialect>, stream: StreamConfig) -> Self {
        Self {
            inner: Arc::new(WireStateInner {
                mapper: Arc::new(mapper),
                dialects,
                stream,
            }),
        }
    }

    /// Resolve a dialect: configured names first, then built-in presets
    pub fn dialect(&self, name: &str) -> Result<Dialect, WireError> {
        if let Some(dialect) = self.inner.dialects.get(&name.to_ascii_lowercase()) {
            return Ok(dialect.clone());
        }

        DialectKind::parse(name)
            .map(Dialect::preset)
            .ok_or_else(|| WireError::UnknownDialect { name: name.to_owned() })
    }

    pub fn mapper(&self) -> &Arc<FinishReasonMapper> {
        &self.inner.mapper
    }

    pub fn stream_config(&self) -> &StreamConfig {
        &self.inner.stream
    }

    /// Fresh assembler for one stream
    pub fn assembler(&self) -> StreamAssembler {
        StreamAssembler::new(Arc::clone(&self.inner.mapper), self.inner.stream.max_diagnostics)
    }

    /// Empty registry sharing this state's finish-reason table
    pub fn registry(&self) -> StreamRegistry {
        StreamRegistry::new(Arc::clone(&self.inner.mapper), self.inner.stream.max_diagnostics)
    }

    /// Translate a request for the named dialect
    pub fn normalize_request(&self, req: &ChatRequest, dialect: &str) -> Result<VendorRequest, WireError> {
        let dialect = self.dialect(dialect)?;
        openai::normalize_request(req, &dialect, self.inner.stream.include_usage)
    }

    /// Normalize a complete non-streaming response body
    pub fn normalize_completion(&self, value: &Value) -> Result<ChatOutcome, WireError> {
        openai::normalize_completion(value, &self.inner.mapper)
    }
}
