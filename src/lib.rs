//! # Script Bridge
//!
//! This library connects a host program to guest script code running in a
//! sandboxed context (an embedded webview or script engine). The guest calls
//! named host methods and gets deferred results back; both sides share a
//! store of constants and variables.
//!
//! ## Architecture
//!
//! ```text
//! Guest script
//!     │
//!     │ GuestClient::call / get_variable / set_variable
//!     ▼
//! HostAdapter (transport seam)
//!     │
//!     │ Call { method, args, correlationId }
//!     ▼
//! BridgeHost ── MethodRegistry
//!     │     └── StateStore
//!     │
//!     │ Result { correlationId, payload, error }
//!     ▼
//! GuestClient::deliver ──> Deferred settles
//! ```
//!
//! ## Features
//!
//! - **Correlated Calls**: Results settle by correlation ID, in any order
//! - **Errors as Data**: Host failures reach the guest as `{type, message}`
//! - **Typed Methods**: Positional arguments decoded with serde
//! - **Lenient Writes**: Guest text that is not JSON is stored as a string
//! - **Webview Stub**: Injectable JS client speaking the same protocol

#![deny(missing_docs)]

pub mod adapter;
pub mod config;
pub mod error;
pub mod guest;
pub mod host;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod script;

// Re-export commonly used types
pub use adapter::{HostAdapter, LocalAdapter, ResultStream};
pub use config::BridgeConfig;
pub use error::{BridgeError, CallError, ErrorCode};
pub use guest::{Deferred, GuestClient};
pub use host::registry::{MethodRegistry, MethodResult};
pub use host::state::StateStore;
pub use host::{BridgeHost, SharedHost};
pub use message::{BridgeMessage, CallMessage, CorrelationId, ResultMessage};
pub use metrics::{BridgeMetrics, BridgeStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
