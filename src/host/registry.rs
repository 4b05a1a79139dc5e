//! Method registry.
//!
//! Maps exported method names to host-side callables. Methods receive the
//! positional arguments of a call together with mutable access to the
//! [`StateStore`], and report failures as [`CallError`] data.

use super::state::StateStore;
use crate::error::{BridgeError, CallError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Outcome of a single method invocation
pub type MethodResult = std::result::Result<Value, CallError>;

/// A host-side callable reachable from the guest
pub trait HostMethod: Send + Sync {
    /// Run the method with positional arguments
    fn call(&self, state: &mut StateStore, args: Vec<Value>) -> MethodResult;
}

impl<F> HostMethod for F
where
    F: Fn(&mut StateStore, Vec<Value>) -> MethodResult + Send + Sync,
{
    fn call(&self, state: &mut StateStore, args: Vec<Value>) -> MethodResult {
        self(state, args)
    }
}

/// Registry of exported methods
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Box<dyn HostMethod>>,
}

impl MethodRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method taking raw positional arguments.
    ///
    /// An existing method with the same name is replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, method: F) -> Result<()>
    where
        F: Fn(&mut StateStore, Vec<Value>) -> MethodResult + Send + Sync + 'static,
    {
        self.register_boxed(name, Box::new(method))
    }

    /// Register a method implemented by a type
    pub fn register_boxed(
        &mut self,
        name: impl Into<String>,
        method: Box<dyn HostMethod>,
    ) -> Result<()> {
        let name = name.into();
        validate_method_name(&name)?;

        if self.methods.insert(name.clone(), method).is_some() {
            debug!(method = %name, "Replaced registered method");
        } else {
            debug!(method = %name, "Registered method");
        }
        Ok(())
    }

    /// Register a method with typed arguments and return value.
    ///
    /// `A` is decoded from the positional argument array, so tuples map
    /// argument-for-argument (`(String, i64)` accepts `["a", 1]`). A method
    /// without arguments uses `()`.
    pub fn register_typed<A, R, F>(&mut self, name: impl Into<String>, method: F) -> Result<()>
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(&mut StateStore, A) -> std::result::Result<R, CallError> + Send + Sync + 'static,
    {
        let name = name.into();
        let label = name.clone();
        self.register(name, move |state, args| {
            let args: A =
                decode_args(args).map_err(|e| CallError::invalid_arguments(&label, e))?;
            let ret = method(state, args)?;
            serde_json::to_value(ret).map_err(CallError::from)
        })
    }

    /// Remove a method
    pub fn unregister(&mut self, name: &str) -> bool {
        self.methods.remove(name).is_some()
    }

    /// Check if a method is registered
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names
    pub fn names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods are registered
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Invoke a method by name.
    ///
    /// Unknown names fail with `NoSuchMethod`. A panic in the method body is
    /// contained and reported as a `Panic` error.
    pub fn invoke(&self, name: &str, args: Vec<Value>, state: &mut StateStore) -> MethodResult {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| CallError::no_such_method(name))?;

        match panic::catch_unwind(AssertUnwindSafe(|| method.call(state, args))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(CallError::panicked(name, &panic_message(payload.as_ref()))),
        }
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

fn validate_method_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BridgeError::InvalidMethodName(name.to_string()));
    }
    Ok(())
}

fn decode_args<A: DeserializeOwned>(args: Vec<Value>) -> serde_json::Result<A> {
    // `()` decodes from null, not from an empty array
    if args.is_empty() {
        if let Ok(unit) = serde_json::from_value(Value::Null) {
            return Ok(unit);
        }
    }
    serde_json::from_value(Value::Array(args))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
