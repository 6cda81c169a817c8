//! Vendor dialect profiles
//!
//! A dialect is data describing which request fields and tool-choice
//! literals a vendor accepts. Built-in presets are a constant table;
//! configuration can derive named dialects from them.

use chatwire_config::DialectConfig;
pub use chatwire_config::NamedToolChoiceStyle;

use crate::error::WireError;

/// Built-in dialect presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    OpenAi,
    Azure,
    OpenRouter,
    Mistral,
    TogetherAi,
    Deepseek,
    Perplexity,
    LocalAi,
    Groq,
    LmStudio,
    /// Permissive fallback for unlisted `OpenAI`-compatible servers
    Generic,
}

impl DialectKind {
    pub const ALL: [Self; 11] = [
        Self::OpenAi,
        Self::Azure,
        Self::OpenRouter,
        Self::Mistral,
        Self::TogetherAi,
        Self::Deepseek,
        Self::Perplexity,
        Self::LocalAi,
        Self::Groq,
        Self::LmStudio,
        Self::Generic,
    ];

    /// Configuration name of this preset
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
            Self::OpenRouter => "openrouter",
            Self::Mistral => "mistral",
            Self::TogetherAi => "togetherai",
            Self::Deepseek => "deepseek",
            Self::Perplexity => "perplexity",
            Self::LocalAi => "localai",
            Self::Groq => "groq",
            Self::LmStudio => "lmstudio",
            Self::Generic => "generic",
        }
    }

    /// Look up a preset by configuration name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

struct Preset {
    kind: DialectKind,
    accepts_stream_options: bool,
    accepts_n: bool,
    accepts_tools: bool,
    required_tool_choice: &'static str,
    named_tool_choice: NamedToolChoiceStyle,
    omit_fields: &'static [&'static str],
}

const fn preset(
    kind: DialectKind,
    accepts_stream_options: bool,
    accepts_n: bool,
    accepts_tools: bool,
    required_tool_choice: &'static str,
    named_tool_choice: NamedToolChoiceStyle,
    omit_fields: &'static [&'static str],
) -> Preset {
    Preset {
        kind,
        accepts_stream_options,
        accepts_n,
        accepts_tools,
        required_tool_choice,
        named_tool_choice,
        omit_fields,
    }
}

use NamedToolChoiceStyle::{Object, Unsupported};

const GENERIC: Preset = preset(DialectKind::Generic, false, false, true, "required", Object, &[]);

/// Columns: kind, `stream_options`, `n`, tools, required literal, named style, omitted fields
const PRESETS: &[Preset] = &[
    preset(DialectKind::OpenAi, true, true, true, "required", Object, &[]),
    preset(DialectKind::Azure, true, true, true, "required", Object, &[]),
    preset(DialectKind::OpenRouter, true, false, true, "required", Object, &[]),
    preset(DialectKind::Mistral, false, false, true, "any", Object, &["seed"]),
    preset(DialectKind::TogetherAi, false, true, true, "required", Object, &[]),
    preset(DialectKind::Deepseek, true, false, true, "required", Object, &["seed"]),
    preset(DialectKind::Perplexity, false, false, false, "required", Unsupported, &["seed", "stop"]),
    preset(DialectKind::LocalAi, false, false, true, "required", Unsupported, &[]),
    preset(DialectKind::Groq, true, false, true, "required", Object, &[]),
    preset(DialectKind::LmStudio, false, false, true, "required", Unsupported, &[]),
    GENERIC,
];

/// Request shaping rules for one vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Name callers select this dialect by
    pub name: String,
    /// Preset this dialect derives from
    pub kind: DialectKind,
    /// Whether `stream_options` may be sent
    pub accepts_stream_options: bool,
    /// Whether `n` may be sent
    pub accepts_n: bool,
    /// Whether `tools` and `tool_choice` may be sent
    pub accepts_tools: bool,
    /// Literal for a "must call a tool" policy
    pub required_tool_choice: String,
    /// How a forced named tool is expressed
    pub named_tool_choice: NamedToolChoiceStyle,
    /// Top-level request fields stripped before sending
    pub omit_fields: Vec<String>,
}

impl Dialect {
    /// Built-in preset
    pub fn preset(kind: DialectKind) -> Self {
        let preset = PRESETS
            .iter()
            .find(|preset| preset.kind == kind)
            .unwrap_or(&GENERIC);

        Self {
            name: kind.name().to_owned(),
            kind,
            accepts_stream_options: preset.accepts_stream_options,
            accepts_n: preset.accepts_n,
            accepts_tools: preset.accepts_tools,
            required_tool_choice: preset.required_tool_choice.to_owned(),
            named_tool_choice: preset.named_tool_choice,
            omit_fields: preset.omit_fields.iter().map(|field| (*field).to_owned()).collect(),
        }
    }

    /// Built-in preset by name
    pub fn named(name: &str) -> Result<Self, WireError> {
        DialectKind::parse(name).map(Self::preset).ok_or_else(|| WireError::UnknownDialect {
            name: name.to_owned(),
        })
    }

    /// Configured dialect layered over its base preset
    pub fn from_config(name: &str, config: &DialectConfig) -> Result<Self, WireError> {
        let mut dialect = Self::named(&config.base)?;
        name.clone_into(&mut dialect.name);

        if let Some(accepts) = config.accepts_stream_options {
            dialect.accepts_stream_options = accepts;
        }
        if let Some(accepts) = config.accepts_n {
            dialect.accepts_n = accepts;
        }
        if let Some(accepts) = config.accepts_tools {
            dialect.accepts_tools = accepts;
        }
        if let Some(literal) = &config.required_tool_choice {
            literal.clone_into(&mut dialect.required_tool_choice);
        }
        if let Some(style) = config.named_tool_choice {
            dialect.named_tool_choice = style;
        }
        for field in &config.omit_fields {
            if !dialect.omit_fields.contains(field) {
                dialect.omit_fields.push(field.clone());
            }
        }

        Ok(dialect)
    }
}
