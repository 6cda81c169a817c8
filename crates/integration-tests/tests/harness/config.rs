//! Configuration files for integration tests

use std::io::Write;

use chatwire::WireState;
use chatwire_config::Config;
use tempfile::NamedTempFile;

/// A TOML configuration written to a temporary file
pub struct ConfigFile {
    file: NamedTempFile,
}

impl ConfigFile {
    /// Write `toml` to a fresh temporary file
    pub fn write(toml: &str) -> anyhow::Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(toml.as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Load the file through the regular configuration path
    pub fn load(&self) -> anyhow::Result<Config> {
        Config::load(self.file.path())
    }

    /// Load the file and build normalization state from it
    pub fn state(&self) -> anyhow::Result<WireState> {
        Ok(WireState::new(&self.load()?)?)
    }
}
