//! Vendor finish-reason tokens to canonical [`FinishReason`]
//!
//! The vocabulary is data. New vendor tokens are appended to [`BUILTIN`] or
//! supplied through configuration, never matched inline at call sites.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::types::FinishReason;

/// Built-in vendor vocabulary, append-only
pub const BUILTIN: &[(&str, FinishReason)] = &[
    ("stop", FinishReason::Stop),
    ("STOP", FinishReason::Stop),
    ("end_turn", FinishReason::Stop),
    ("stop_sequence", FinishReason::Stop),
    ("eos", FinishReason::Stop),
    ("eos_token", FinishReason::Stop),
    ("COMPLETE", FinishReason::Stop),
    ("FINISH", FinishReason::Stop),
    ("length", FinishReason::Length),
    ("max_tokens", FinishReason::Length),
    ("MAX_TOKENS", FinishReason::Length),
    ("model_length", FinishReason::Length),
    ("tool_calls", FinishReason::ToolCalls),
    ("function_call", FinishReason::ToolCalls),
    ("tool_use", FinishReason::ToolCalls),
    ("content_filter", FinishReason::ContentFilter),
    ("SAFETY", FinishReason::ContentFilter),
    ("RECITATION", FinishReason::ContentFilter),
    ("insufficient_system_resource", FinishReason::Error),
    ("error", FinishReason::Error),
    ("", FinishReason::Unknown),
];

/// Table-driven mapping from vendor tokens to [`FinishReason`]
#[derive(Debug, Clone)]
pub struct FinishReasonMapper {
    table: HashMap<String, FinishReason>,
}

impl Default for FinishReasonMapper {
    fn default() -> Self {
        Self {
            table: BUILTIN
                .iter()
                .map(|(token, reason)| ((*token).to_owned(), *reason))
                .collect(),
        }
    }
}

impl FinishReasonMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table extended with configured tokens; overrides win on conflict
    pub fn with_overrides(overrides: &IndexMap<String, chatwire_config::FinishReasonTarget>) -> Self {
        let mut mapper = Self::default();
        for (token, target) in overrides {
            mapper.insert(token.clone(), FinishReason::from(*target));
        }
        mapper
    }

    /// Add or replace a single token
    pub fn insert(&mut self, token: impl Into<String>, reason: FinishReason) {
        self.table.insert(token.into(), reason);
    }

    /// Map a vendor token; `None`, empty and unrecognised tokens become `Unknown`
    pub fn map(&self, token: Option<&str>) -> FinishReason {
        let Some(token) = token else {
            return FinishReason::Unknown;
        };

        if let Some(reason) = self.table.get(token) {
            return *reason;
        }

        if let Some(reason) = self.table.get(&token.to_ascii_lowercase()) {
            return *reason;
        }

        tracing::debug!(token, "unrecognised finish reason, mapping to unknown");
        FinishReason::Unknown
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
