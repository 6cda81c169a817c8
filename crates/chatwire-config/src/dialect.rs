use serde::Deserialize;

/// Names of the built-in dialect presets a `DialectConfig` may extend
pub const KNOWN_DIALECTS: &[&str] = &[
    "openai",
    "azure",
    "openrouter",
    "mistral",
    "togetherai",
    "deepseek",
    "perplexity",
    "localai",
    "groq",
    "lmstudio",
    "generic",
];

/// Fields a dialect may never omit from a request body
pub const PROTECTED_FIELDS: &[&str] = &["model", "messages"];

/// Per-vendor request shaping overrides
///
/// Every field except `base` is optional; unset fields inherit the preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialectConfig {
    /// Built-in preset this dialect extends
    pub base: String,
    /// Whether the vendor accepts `stream_options`
    #[serde(default)]
    pub accepts_stream_options: Option<bool>,
    /// Whether the vendor accepts the `n` parameter
    #[serde(default)]
    pub accepts_n: Option<bool>,
    /// Whether the vendor accepts tool definitions
    #[serde(default)]
    pub accepts_tools: Option<bool>,
    /// Literal sent for a "must call a tool" policy (e.g. "required", "any")
    #[serde(default)]
    pub required_tool_choice: Option<String>,
    /// How a forced named tool is expressed
    #[serde(default)]
    pub named_tool_choice: Option<NamedToolChoiceStyle>,
    /// Additional top-level request fields to strip
    #[serde(default)]
    pub omit_fields: Vec<String>,
}

/// Wire style for forcing a specific tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedToolChoiceStyle {
    /// `{"type": "function", "function": {"name": ...}}`
    Object,
    /// Not accepted; degrade to the required literal
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_dialect() {
        let config: DialectConfig = toml::from_str(r#"base = "mistral""#).unwrap();
        assert_eq!(config.base, "mistral");
        assert!(config.accepts_n.is_none());
        assert!(config.omit_fields.is_empty());
    }

    #[test]
    fn deserialize_full_dialect() {
        let toml = r#"
            base = "generic"
            accepts_stream_options = true
            accepts_n = false
            accepts_tools = true
            required_tool_choice = "any"
            named_tool_choice = "unsupported"
            omit_fields = ["seed", "frequency_penalty"]
        "#;

        let config: DialectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.accepts_stream_options, Some(true));
        assert_eq!(config.required_tool_choice.as_deref(), Some("any"));
        assert_eq!(config.named_tool_choice, Some(NamedToolChoiceStyle::Unsupported));
        assert_eq!(config.omit_fields, vec!["seed", "frequency_penalty"]);
    }

    #[test]
    fn unknown_field_rejected() {
        let result = toml::from_str::<DialectConfig>("base = \"openai\"\nretries = 3");
        assert!(result.is_err());
    }
}
