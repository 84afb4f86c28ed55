//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Default Penpot instance.
pub const DEFAULT_API_URL: &str = "https://design.penpot.app";

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Base URL of the Penpot instance.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Personal access token. Usually supplied via `PENPOT_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Skip TLS certificate validation (self-hosted instances only).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            _schema: None,
            _comment: None,
            api_url: default_api_url(),
            access_token: None,
            accept_invalid_certs: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Applies `PENPOT_API_URL` / `PENPOT_ACCESS_TOKEN` overrides.
    ///
    /// `lookup` resolves a variable name; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PENPOT_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup("PENPOT_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            self.access_token = Some(token);
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid api_url '{}'. Must start with http:// or https://",
                    self.api_url
                ),
            });
        }

        if self.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::ValidationError {
                message: "No access token configured. Set access_token or PENPOT_ACCESS_TOKEN"
                    .to_string(),
            });
        }

        Ok(())
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
