use std::path::Path;

use crate::Config;
use crate::dialect::{KNOWN_DIALECTS, PROTECTED_FIELDS};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, deserializes it and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails, or
    /// validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let config = Self::from_toml_str(&raw)?;

        tracing::debug!(
            path = %path.display(),
            dialects = config.dialects.len(),
            finish_reasons = config.finish_reasons.len(),
            "loaded configuration"
        );

        Ok(config)
    }

    /// Parse and validate configuration from an in-memory TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if TOML parsing fails or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if a dialect extends an unknown preset, strips a
    /// protected field, or the stream limits are unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_dialects()?;
        self.validate_finish_reasons()?;
        self.validate_stream()?;
        Ok(())
    }

    fn validate_dialects(&self) -> anyhow::Result<()> {
        for (name, dialect) in &self.dialects {
            if !KNOWN_DIALECTS.iter().any(|known| known.eq_ignore_ascii_case(&dialect.base)) {
                anyhow::bail!(
                    "dialect '{name}' extends unknown preset '{}' (expected one of: {})",
                    dialect.base,
                    KNOWN_DIALECTS.join(", ")
                );
            }

            if let Some(field) = dialect
                .omit_fields
                .iter()
                .find(|field| PROTECTED_FIELDS.contains(&field.as_str()))
            {
                anyhow::bail!("dialect '{name}' cannot omit required field '{field}'");
            }

            if let Some(literal) = &dialect.required_tool_choice
                && literal.trim().is_empty()
            {
                anyhow::bail!("dialect '{name}' has an empty required_tool_choice literal");
            }
        }

        Ok(())
    }

    fn validate_finish_reasons(&self) -> anyhow::Result<()> {
        if self.finish_reasons.keys().any(String::is_empty) {
            anyhow::bail!("finish_reasons cannot remap the empty token");
        }

        Ok(())
    }

    fn validate_stream(&self) -> anyhow::Result<()> {
        if self.stream.max_diagnostics == 0 {
            anyhow::bail!("stream.max_diagnostics must be greater than 0");
        }

        Ok(())
    }
}
