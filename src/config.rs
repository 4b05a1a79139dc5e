//! Bridge configuration types and defaults.
//!
//! This module defines the configuration options shared by the host engine,
//! the guest client and the injected guest script: the name the host object
//! is published under, the correlation ID prefix and the optional pending
//! call expiry.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default name the guest reaches the host object by
pub const DEFAULT_OBJECT_NAME: &str = "hostBridge";

/// Default correlation ID prefix
pub const DEFAULT_ID_PREFIX: &str = "req_";

/// Configuration for both sides of the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Name the host object is registered under in the guest namespace
    #[serde(default = "default_object_name")]
    pub object_name: String,

    /// Prefix for guest-generated correlation IDs (default: `req_`)
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Expiry for unsettled pending calls in milliseconds (default: none)
    #[serde(default)]
    pub pending_timeout_ms: Option<u64>,

    /// Enable debug mode (default: false)
    #[serde(default)]
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            object_name: DEFAULT_OBJECT_NAME.to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            pending_timeout_ms: None,
            debug: false,
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host object name
    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    /// Set the correlation ID prefix
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Set the pending call expiry
    pub fn with_pending_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.pending_timeout_ms = Some(timeout_ms);
        self
    }

    /// Enable debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Pending call expiry as a duration
    pub fn pending_timeout(&self) -> Option<std::time::Duration> {
        self.pending_timeout_ms.map(std::time::Duration::from_millis)
    }

    /// Parse and validate a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_js_identifier(&self.object_name) {
            return Err(ConfigError::InvalidValue {
                field: "object_name".into(),
                reason: "must be a JavaScript identifier".into(),
            });
        }

        if self.id_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "id_prefix".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.pending_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "pending_timeout_ms".into(),
                reason: "must be greater than 0 when set".into(),
            });
        }

        Ok(())
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field name
        field: String,
        /// The reason it's invalid
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Default value functions for serde
fn default_object_name() -> String {
    DEFAULT_OBJECT_NAME.to_string()
}

fn default_id_prefix() -> String {
    DEFAULT_ID_PREFIX.to_string()
}
