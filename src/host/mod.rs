//! Host side of the bridge.
//!
//! [`BridgeHost`] owns the shared state store and the method registry, and
//! turns every inbound Call into exactly one Result. Failures raised while
//! handling a call are converted to data; nothing a guest sends can make the
//! host return an error or panic.

pub mod registry;
pub mod state;

use crate::config::BridgeConfig;
use crate::error::{CallError, Result};
use crate::message::{salvage_correlation_id, BridgeMessage, CallMessage, ResultMessage};
use crate::metrics::{BridgeMetrics, BridgeStats, CallTimer};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use registry::{MethodRegistry, MethodResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use state::{StateStore, WriteOutcome};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Host shared between threads; the mutex serializes access to the store
pub type SharedHost = Arc<Mutex<BridgeHost>>;

/// The bridge protocol engine
pub struct BridgeHost {
    /// Session ID for logging and stats
    session_id: String,
    /// Session start time
    started_at: DateTime<Utc>,
    /// Bridge configuration
    config: BridgeConfig,
    /// Constants and variables
    state: StateStore,
    /// Exported methods
    methods: MethodRegistry,
    /// Metrics collector
    metrics: Arc<BridgeMetrics>,
}

impl BridgeHost {
    /// Create a new host
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let session_id = Uuid::new_v4().to_string();
        info!(
            session_id = %session_id,
            object_name = %config.object_name,
            "Initializing bridge host"
        );

        Ok(Self {
            session_id,
            started_at: Utc::now(),
            config,
            state: StateStore::new(),
            methods: MethodRegistry::new(),
            metrics: Arc::new(BridgeMetrics::new()),
        })
    }

    /// Wrap the host for access from several threads
    pub fn into_shared(self) -> SharedHost {
        Arc::new(Mutex::new(self))
    }

    /// Session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Shared state store
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Mutable shared state store
    pub fn state_mut(&mut self) -> &mut StateStore {
        &mut self.state
    }

    /// Method registry
    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Metrics collector
    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Define a constant readable by the guest
    pub fn define_constant(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.state.define_constant(name, value);
    }

    /// Define a variable readable and writable by both sides
    pub fn define_variable(&mut self, name: impl Into<String>, initial: impl Into<Value>) {
        self.state.define_variable(name, initial);
    }

    /// Read a constant (null if unknown)
    pub fn constant(&self, name: &str) -> Value {
        self.state.constant(name)
    }

    /// Read a variable (null if unknown)
    pub fn get_variable(&self, name: &str) -> Value {
        self.state.variable(name)
    }

    /// Write a variable
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.state.set_variable(name, value);
    }

    /// Export a method taking raw positional arguments
    pub fn define_method<F>(&mut self, name: impl Into<String>, method: F) -> Result<()>
    where
        F: Fn(&mut StateStore, Vec<Value>) -> MethodResult + Send + Sync + 'static,
    {
        self.methods.register(name, method)
    }

    /// Export a method with typed arguments and return value
    pub fn define_typed_method<A, R, F>(&mut self, name: impl Into<String>, method: F) -> Result<()>
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(&mut StateStore, A) -> std::result::Result<R, CallError> + Send + Sync + 'static,
    {
        self.methods.register_typed(name, method)
    }

    /// Invoke a method directly, without the message envelope
    pub fn invoke(&mut self, method: &str, args: Vec<Value>) -> MethodResult {
        self.methods.invoke(method, args, &mut self.state)
    }

    /// Handle one Call, producing exactly one Result with the same ID
    #[instrument(
        skip(self, call),
        fields(session_id = %self.session_id, method = %call.method, correlation_id = %call.correlation_id)
    )]
    pub fn handle_call(&mut self, call: CallMessage) -> ResultMessage {
        let timer = CallTimer::start();
        let CallMessage {
            method,
            args,
            correlation_id,
        } = call;

        let outcome = self.methods.invoke(&method, args, &mut self.state);

        match &outcome {
            Ok(_) => debug!("Call succeeded"),
            Err(e) => debug!(error = %e, "Call failed"),
        }
        self.metrics.record_call(
            &method,
            timer.elapsed(),
            outcome.as_ref().err().map(|e| e.kind.as_str()),
        );

        ResultMessage::from_outcome(correlation_id, outcome)
    }

    /// Handle a decoded message. Only Calls produce a reply.
    pub fn handle_message(&mut self, message: BridgeMessage) -> Option<ResultMessage> {
        match message {
            BridgeMessage::Call(call) => Some(self.handle_call(call)),
            BridgeMessage::Result(result) => {
                warn!(
                    correlation_id = %result.correlation_id,
                    "Dropping result message sent to the host"
                );
                None
            }
        }
    }

    /// Handle raw JSON from a transport, returning the reply as JSON.
    ///
    /// An undecodable call that still names a `correlationId` is answered
    /// with an `InvalidMessage` error; anything else, including malformed
    /// results, is dropped.
    pub fn handle_json(&mut self, raw: &str) -> Option<String> {
        let reply = match BridgeMessage::from_json(raw) {
            Ok(message) => self.handle_message(message)?,
            Err(e) => match salvage_correlation_id(raw) {
                Some(correlation_id) => {
                    warn!(correlation_id = %correlation_id, error = %e, "Rejecting malformed call");
                    self.metrics
                        .record_call("<malformed>", std::time::Duration::ZERO, Some("InvalidMessage"));
                    ResultMessage::failure(correlation_id, CallError::invalid_message(&e))
                }
                None => {
                    warn!(error = %e, "Dropping undecodable bridge message");
                    return None;
                }
            },
        };

        match reply.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                error!(error = %e, correlation_id = %reply.correlation_id, "Failed to encode result");
                ResultMessage::failure(
                    reply.correlation_id,
                    CallError::serialization_error(e.to_string()),
                )
                .to_json()
                .ok()
            }
        }
    }

    /// Guest lookup of a constant, as JSON text
    pub fn lookup_constant(&self, name: &str) -> String {
        self.metrics.record_lookup();
        self.state.constant_json(name)
    }

    /// Guest lookup of a variable, as JSON text
    pub fn lookup_variable(&self, name: &str) -> String {
        self.metrics.record_lookup();
        self.state.variable_json(name)
    }

    /// Guest write of a variable from JSON text (lenient, never fails)
    pub fn write_variable(&mut self, name: &str, raw: &str) {
        let outcome = self.state.write_variable_json(name, raw);
        self.metrics
            .record_write(outcome == WriteOutcome::RawFallback);
    }

    /// Get session statistics
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            total_calls: self.metrics.total_calls(),
            successful_calls: self.metrics.successful_calls(),
            failed_calls: self.metrics.failed_calls(),
            lookups: self.metrics.lookups(),
            variable_writes: self.metrics.variable_writes(),
            raw_fallback_writes: self.metrics.raw_fallback_writes(),
            avg_call_time_us: self.metrics.avg_call_time_us(),
            registered_methods: self.methods.len(),
        }
    }
}

impl Default for BridgeHost {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            config: BridgeConfig::default(),
            state: StateStore::new(),
            methods: MethodRegistry::new(),
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }
}

impl std::fmt::Debug for BridgeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHost")
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}
