//! Settings
//!
//! Repository options and the log filter, read from TOML:
//!
//! ```toml
//! log_filter = "tdl_repository=debug"
//!
//! [repository]
//! testing = false
//! # 0 collects errors without a cap
//! error_limit = 100
//! orphans_are_roots = false
//! trail_boundary = "trees.rs"
//! ```
//!
//! Every key is optional.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tdl_repository::RepositoryOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `env_logger` filter, e.g. `"debug"` or `"tdl_repository=trace"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,

    pub repository: RepositoryOptions,
}

impl Settings {
    /// Parses settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML or has a value of the
    /// wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TDL settings")
    }

    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    /// Serializes the settings to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize TDL settings")
    }

    /// Installs `env_logger` with `log_filter` on top of `RUST_LOG`.
    ///
    /// # Errors
    ///
    /// Returns an error if a logger is already installed.
    pub fn init_logging(&self) -> Result<()> {
        let mut builder = env_logger::Builder::from_default_env();
        if let Some(filter) = &self.log_filter {
            builder.parse_filters(filter);
        }
        builder.try_init().context("Failed to initialize logging")
    }
}
