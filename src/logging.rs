//! Tracing bootstrap.
//!
//! Installs a `tracing-subscriber` fmt subscriber once per process. `RUST_LOG`
//! takes precedence over the configured filter. Later calls are no-ops.

use crate::config::{BridgeConfig, ConfigError};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static TRACING_FILTER: OnceCell<String> = OnceCell::new();

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
    /// Include the event target in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "script_bridge=info".to_string(),
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Settings matching a bridge configuration's debug flag
    pub fn from_bridge_config(config: &BridgeConfig) -> Self {
        let filter = if config.debug {
            "script_bridge=debug"
        } else {
            "script_bridge=info"
        };
        Self {
            filter: filter.to_string(),
            ..Self::default()
        }
    }

    /// Override the filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(true)` if this call installed it and `Ok(false)` if tracing
/// was already initialized, by this function or by someone else.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigError> {
    if TRACING_FILTER.get().is_some() {
        return Ok(false);
    }

    let (filter, effective) = resolve_filter(config, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .is_ok();

    if installed {
        let _ = TRACING_FILTER.set(effective);
    }
    Ok(installed)
}

/// Filter directives in effect, as set by the [`init_tracing`] call that
/// installed the subscriber. `None` if it never did.
pub fn active_filter() -> Option<&'static str> {
    TRACING_FILTER.get().map(String::as_str)
}

// Valid `RUST_LOG` directives win over the configured ones
fn resolve_filter(
    config: &LoggingConfig,
    from_env: Option<String>,
) -> Result<(EnvFilter, String), ConfigError> {
    if let Some(directives) = from_env {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return Ok((filter, directives));
        }
    }

    let filter = EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
        field: "filter".into(),
        reason: e.to_string(),
    })?;
    Ok((filter, config.filter.clone()))
}
