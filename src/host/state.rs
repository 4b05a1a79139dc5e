//! Shared state store.
//!
//! Holds host-authoritative constants and variables writable from both
//! sides. The guest never holds a reference into the store; it only sees
//! JSON snapshots produced by the `*_json` accessors.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of a guest-originated variable write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The wire value decoded as JSON and was stored
    Parsed,
    /// The wire value was not JSON and was stored as a raw string
    RawFallback,
}

/// Constants and variables visible to both sides of the bridge
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    constants: HashMap<String, Value>,
    variables: HashMap<String, Value>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a constant. Re-defining a name replaces its value.
    pub fn define_constant(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if self.constants.insert(name.clone(), value.into()).is_some() {
            debug!(constant = %name, "Constant redefined");
        }
    }

    /// Define a variable with an initial value (`Value::Null` for none)
    pub fn define_variable(&mut self, name: impl Into<String>, initial: impl Into<Value>) {
        self.variables.insert(name.into(), initial.into());
    }

    /// Read a constant; unknown names read as null
    pub fn constant(&self, name: &str) -> Value {
        self.constants.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Read a variable; unknown names read as null
    pub fn variable(&self, name: &str) -> Value {
        self.variables.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Borrow a variable in place
    pub fn variable_ref(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Mutably borrow a variable in place
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.variables.get_mut(name)
    }

    /// Write a variable (last writer wins)
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Remove a variable, returning its last value
    pub fn remove_variable(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// Check if a constant exists
    pub fn has_constant(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    /// Check if a variable exists
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// All constant names
    pub fn constant_names(&self) -> Vec<String> {
        self.constants.keys().cloned().collect()
    }

    /// All variable names
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    /// Total number of constants and variables
    pub fn len(&self) -> usize {
        self.constants.len() + self.variables.len()
    }

    /// Whether the store holds nothing
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.variables.is_empty()
    }

    /// Guest lookup of a constant as JSON text (`"null"` if unknown)
    pub fn constant_json(&self, name: &str) -> String {
        to_wire(self.constants.get(name))
    }

    /// Guest lookup of a variable as JSON text (`"null"` if unknown)
    pub fn variable_json(&self, name: &str) -> String {
        to_wire(self.variables.get(name))
    }

    /// Guest write of a variable from JSON text.
    ///
    /// Text that does not decode is stored verbatim as a string. Never fails.
    pub fn write_variable_json(&mut self, name: &str, raw: &str) -> WriteOutcome {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                self.variables.insert(name.to_string(), value);
                WriteOutcome::Parsed
            }
            Err(e) => {
                warn!(variable = %name, error = %e, "Guest wrote non-JSON value, storing raw text");
                self.variables
                    .insert(name.to_string(), Value::String(raw.to_string()));
                WriteOutcome::RawFallback
            }
        }
    }
}

fn to_wire(value: Option<&Value>) -> String {
    // Display on Value is infallible compact JSON
    match value {
        Some(value) => value.to_string(),
        None => Value::Null.to_string(),
    }
}
