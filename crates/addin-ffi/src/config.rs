//! Proxy configuration
//!
//! ```toml
//! library = "/opt/addins/libaddin_proxy.so"
//! trace_calls = true
//! ```
//!
//! Both keys are optional. Environment variables override the file:
//! `ADDIN_PROXY_LIBRARY` and `ADDIN_TRACE_CALLS` (`1`/`true`/`yes` or
//! `0`/`false`/`no`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the proxy library
pub const ENV_PROXY_LIBRARY: &str = "ADDIN_PROXY_LIBRARY";
/// Environment variable toggling per-call tracing
pub const ENV_TRACE_CALLS: &str = "ADDIN_TRACE_CALLS";

/// Errors that can occur while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Where to find the proxy and how to drive it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyOptions {
    /// Proxy shared library; the platform default name when absent
    pub library: Option<PathBuf>,
    /// Emit a `trace!` event per boundary call
    pub trace_calls: bool,
}

impl ProxyOptions {
    /// Parse options from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse options from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: ProxyOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Override fields with values from `lookup` (keyed by variable name)
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(library) = lookup(ENV_PROXY_LIBRARY) {
            self.library = Some(PathBuf::from(library));
        }
        if let Some(flag) = lookup(ENV_TRACE_CALLS) {
            self.trace_calls = parse_flag(&flag).ok_or_else(|| {
                ConfigError::ValidationError(format!("{ENV_TRACE_CALLS}: expected a boolean, got '{flag}'"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.library.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
            return Err(ConfigError::ValidationError(
                "library path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
