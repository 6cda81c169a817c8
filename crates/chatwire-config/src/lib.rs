#![allow(clippy::must_use_candidate)]

pub mod dialect;
pub mod finish;
mod loader;
pub mod logging;
pub mod stream;

use indexmap::IndexMap;
use serde::Deserialize;

pub use dialect::*;
pub use finish::*;
pub use logging::*;
pub use stream::*;

/// Top-level chatwire configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Dialect overrides keyed by the name callers use to select them
    #[serde(default)]
    pub dialects: IndexMap<String, DialectConfig>,
    /// Extra vendor finish-reason tokens appended to the built-in table
    #[serde(default)]
    pub finish_reasons: IndexMap<String, FinishReasonTarget>,
    /// Stream assembly settings
    #[serde(default)]
    pub stream: StreamConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}
