//! Error types for the bridge.
//!
//! This module defines the error codes that travel across the boundary, the
//! wire-level [`CallError`] carried inside Result messages, and the host-side
//! [`BridgeError`] used throughout the crate.

use serde::{Deserialize, Serialize};

/// Error codes produced by the bridge itself.
///
/// Method bodies may raise any other kind string; those pass through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Guest called a name not present in the method registry
    NoSuchMethod,
    /// Typed handler could not decode its positional arguments
    InvalidArguments,
    /// Handler failed without classifying the failure
    ExecutionError,
    /// Return value could not be encoded
    SerializationError,
    /// Method body panicked
    Panic,
    /// Inbound message could not be decoded
    InvalidMessage,
    /// Pending call was reaped before its result arrived
    Expired,
    /// Transport is gone
    Disconnected,
}

impl ErrorCode {
    /// The wire `type` string for this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoSuchMethod => "NoSuchMethod",
            ErrorCode::InvalidArguments => "InvalidArguments",
            ErrorCode::ExecutionError => "ExecutionError",
            ErrorCode::SerializationError => "SerializationError",
            ErrorCode::Panic => "Panic",
            ErrorCode::InvalidMessage => "InvalidMessage",
            ErrorCode::Expired => "Expired",
            ErrorCode::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried in a Result message: `{"type": .., "message": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    /// Failure classification
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable description
    pub message: String,
}

impl CallError {
    /// Create an error with an arbitrary kind
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an error from a bridge error code
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.as_str(), message)
    }

    /// Create a no such method error
    pub fn no_such_method(method: &str) -> Self {
        Self::from_code(
            ErrorCode::NoSuchMethod,
            format!("Method '{}' is not registered", method),
        )
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(method: &str, reason: impl std::fmt::Display) -> Self {
        Self::from_code(
            ErrorCode::InvalidArguments,
            format!("Invalid arguments for '{}': {}", method, reason),
        )
    }

    /// Create an execution error
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::ExecutionError, message)
    }

    /// Create a serialization error
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::SerializationError, message)
    }

    /// Create a panic error
    pub fn panicked(method: &str, detail: &str) -> Self {
        Self::from_code(
            ErrorCode::Panic,
            format!("Method '{}' panicked: {}", method, detail),
        )
    }

    /// Create an invalid message error
    pub fn invalid_message(reason: impl std::fmt::Display) -> Self {
        Self::from_code(
            ErrorCode::InvalidMessage,
            format!("Invalid bridge message: {}", reason),
        )
    }

    /// Create an expired error
    pub fn expired(correlation_id: &str) -> Self {
        Self::from_code(
            ErrorCode::Expired,
            format!("Call '{}' expired before a result arrived", correlation_id),
        )
    }

    /// Create a disconnected error
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::Disconnected, message)
    }

    /// Check whether this error carries the given bridge code
    pub fn is(&self, code: ErrorCode) -> bool {
        self.kind == code.as_str()
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for CallError {}

impl From<serde_json::Error> for CallError {
    fn from(e: serde_json::Error) -> Self {
        CallError::serialization_error(e.to_string())
    }
}

impl From<anyhow::Error> for CallError {
    fn from(e: anyhow::Error) -> Self {
        // A CallError wrapped in anyhow keeps its own kind
        match e.downcast::<CallError>() {
            Ok(call_error) => call_error,
            Err(other) => CallError::execution_error(format!("{:#}", other)),
        }
    }
}

/// Main error type for the host side of the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Error raised by a method or carried in a Result
    #[error("Call error: {0}")]
    Call(#[from] CallError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Method name rejected at registration
    #[error("Invalid method name: {0:?}")]
    InvalidMethodName(String),

    /// Malformed bridge message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Transport could not deliver a message
    #[error("Transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Convert to CallError for returning to the guest
    pub fn to_call_error(&self) -> CallError {
        match self {
            BridgeError::Call(e) => e.clone(),
            BridgeError::Config(e) => CallError::execution_error(e.to_string()),
            BridgeError::Io(e) => CallError::execution_error(e.to_string()),
            BridgeError::Serialization(msg) => CallError::serialization_error(msg.clone()),
            BridgeError::InvalidMethodName(name) => CallError::no_such_method(name),
            BridgeError::InvalidMessage(msg) => CallError::invalid_message(msg),
            BridgeError::Transport(msg) => CallError::disconnected(msg.clone()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
