use serde::Deserialize;

/// Stream assembly settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Maximum diagnostics retained per stream; the rest are only counted
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,
    /// Ask vendors that support it to append a usage chunk
    #[serde(default = "default_include_usage")]
    pub include_usage: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_diagnostics: default_max_diagnostics(),
            include_usage: default_include_usage(),
        }
    }
}

fn default_max_diagnostics() -> usize {
    256
}

const fn default_include_usage() -> bool {
    true
}
