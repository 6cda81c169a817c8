use serde::Deserialize;

/// Canonical finish reason a configured vendor token maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReasonTarget {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Unknown,
}
