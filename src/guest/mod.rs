//! Guest side of the bridge.
//!
//! [`GuestClient`] is what sandboxed code talks to. It allocates correlation
//! IDs, tracks outstanding calls in a [`PendingTable`], and settles each
//! [`Deferred`] when the matching Result is delivered. Constant and variable
//! lookups skip correlation entirely and go straight through the adapter.

pub mod deferred;
pub mod pending;

use crate::adapter::HostAdapter;
use crate::config::BridgeConfig;
use crate::error::CallError;
use crate::message::{BridgeMessage, CallMessage, CorrelationId, ResultMessage};
pub use deferred::{CallOutcome, Deferred};
pub use pending::PendingTable;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Client stub used by guest code to reach the host
pub struct GuestClient<A: HostAdapter> {
    adapter: A,
    id_prefix: String,
    next_sequence: AtomicU64,
    pending: PendingTable<CallOutcome>,
    discarded: AtomicU64,
}

impl<A: HostAdapter> GuestClient<A> {
    /// Create a client speaking through `adapter`
    pub fn new(adapter: A, config: &BridgeConfig) -> Self {
        Self {
            adapter,
            id_prefix: config.id_prefix.clone(),
            next_sequence: AtomicU64::new(0),
            pending: PendingTable::new(config.pending_timeout()),
            discarded: AtomicU64::new(0),
        }
    }

    /// The adapter this client talks through
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn next_correlation_id(&self) -> CorrelationId {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        CorrelationId::sequential(&self.id_prefix, sequence)
    }

    /// Invoke a host method. Returns immediately with a deferred result.
    pub fn call(&self, method: &str, args: Vec<Value>) -> Deferred {
        self.reap_expired();

        let correlation_id = self.next_correlation_id();
        // Registered before transmitting so a synchronous reply still finds it
        let receiver = self.pending.register(correlation_id.as_str());
        trace!(correlation_id = %correlation_id, method, "Posting call");

        let message = CallMessage::new(correlation_id.clone(), method, args);
        if let Err(e) = self.adapter.post_call(message) {
            warn!(correlation_id = %correlation_id, method, error = %e, "Failed to post call");
            self.pending
                .settle(correlation_id.as_str(), Err(CallError::disconnected(e.to_string())));
        }

        Deferred::new(correlation_id, receiver)
    }

    /// Invoke a host method with arguments given as a serializable tuple or
    /// sequence. Anything that does not encode to a JSON array is rejected
    /// without transmitting.
    pub fn call_typed<T: Serialize>(&self, method: &str, args: T) -> Deferred {
        match serde_json::to_value(args) {
            Ok(Value::Array(args)) => self.call(method, args),
            Ok(Value::Null) => self.call(method, Vec::new()),
            Ok(other) => Deferred::rejected(
                self.next_correlation_id(),
                CallError::invalid_arguments(
                    method,
                    format!("expected an argument array, got {}", other),
                ),
            ),
            Err(e) => Deferred::rejected(
                self.next_correlation_id(),
                CallError::invalid_arguments(method, e),
            ),
        }
    }

    /// Deliver a Result from the host.
    ///
    /// Returns `true` if a pending call was settled. Results for unknown or
    /// already-settled IDs are discarded.
    pub fn deliver(&self, result: ResultMessage) -> bool {
        let correlation_id = result.correlation_id.clone();
        if self
            .pending
            .settle(correlation_id.as_str(), result.into_outcome())
        {
            trace!(correlation_id = %correlation_id, "Settled call");
            true
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "Discarding unmatched result");
            false
        }
    }

    /// Deliver a Result from raw JSON. Anything that is not a Result is
    /// discarded.
    pub fn deliver_json(&self, raw: &str) -> bool {
        match BridgeMessage::from_json(raw) {
            Ok(BridgeMessage::Result(result)) => self.deliver(result),
            Ok(BridgeMessage::Call(call)) => {
                debug!(correlation_id = %call.correlation_id, "Ignoring call sent to the guest");
                self.discarded.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) => {
                debug!(error = %e, "Discarding undecodable result");
                self.discarded.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Read a host constant (null if unknown)
    pub fn get_constant(&self, name: &str) -> Value {
        decode_lookup(&self.adapter.get_constant(name))
    }

    /// Read a shared variable (null if unknown)
    pub fn get_variable(&self, name: &str) -> Value {
        decode_lookup(&self.adapter.get_variable(name))
    }

    /// Write a shared variable. No acknowledgment.
    pub fn set_variable(&self, name: &str, value: &Value) {
        self.adapter.set_variable(name, &value.to_string());
    }

    /// Write a shared variable from text the guest already encoded. Text that
    /// is not JSON is stored by the host as a plain string.
    pub fn set_variable_raw(&self, name: &str, raw: &str) {
        self.adapter.set_variable(name, raw);
    }

    /// Outstanding calls
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Results discarded because nothing was waiting for them
    pub fn discarded_results(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Reject calls outstanding longer than the configured timeout.
    ///
    /// Returns the number of calls rejected with `Expired`.
    pub fn reap_expired(&self) -> usize {
        let reaped = self
            .pending
            .reap_expired(|id| Err(CallError::expired(id)));
        if reaped > 0 {
            debug!(reaped, "Expired pending calls");
        }
        reaped
    }
}

impl<A: HostAdapter> std::fmt::Debug for GuestClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestClient")
            .field("id_prefix", &self.id_prefix)
            .field("pending", &self.pending.len())
            .field("discarded", &self.discarded_results())
            .finish_non_exhaustive()
    }
}

fn decode_lookup(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BridgeError, ErrorCode, Result};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    /// Records everything the client sends; answers nothing on its own
    #[derive(Default)]
    struct RecordingAdapter {
        calls: Mutex<Vec<CallMessage>>,
        writes: Mutex<HashMap<String, String>>,
        closed: bool,
    }

    impl HostAdapter for RecordingAdapter {
        fn get_constant(&self, name: &str) -> String {
            match name {
                "VERSION" => r#""1.0.0""#.to_string(),
                _ => "null".to_string(),
            }
        }

        fn get_variable(&self, name: &str) -> String {
            self.writes
                .lock()
                .get(name)
                .cloned()
                .unwrap_or_else(|| "null".to_string())
        }

        fn set_variable(&self, name: &str, raw: &str) {
            self.writes.lock().insert(name.to_string(), raw.to_string());
        }

        fn post_call(&self, call: CallMessage) -> Result<()> {
            if self.closed {
                return Err(BridgeError::Transport("host went away".into()));
            }
            self.calls.lock().push(call);
            Ok(())
        }
    }

    fn create_client() -> GuestClient<RecordingAdapter> {
        GuestClient::new(RecordingAdapter::default(), &BridgeConfig::default())
    }

    #[test]
    fn test_call_allocates_sequential_ids() {
        let client = create_client();
        let first = client.call("getItems", vec![]);
        let second = client.call("getItems", vec![]);

        assert_eq!(first.correlation_id().as_str(), "req_1");
        assert_eq!(second.correlation_id().as_str(), "req_2");
        assert_eq!(client.pending_count(), 2);

        let calls = client.adapter().calls.lock();
        assert_eq!(calls[0].correlation_id.as_str(), "req_1");
        assert_eq!(calls[1].method, "getItems");
    }

    #[test]
    fn test_custom_prefix() {
        let config = BridgeConfig::new().with_id_prefix("call-");
        let client = GuestClient::new(RecordingAdapter::default(), &config);
        assert_eq!(client.call("x", vec![]).correlation_id().as_str(), "call-1");
    }

    #[tokio::test]
    async fn test_deliver_resolves_payload() {
        let client = create_client();
        let deferred = client.call("addItem", vec![json!("c")]);

        assert!(client.deliver(ResultMessage::success("req_1", json!(true))));
        assert_eq!(deferred.await.unwrap(), json!(true));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_deliver_rejects_with_error() {
        let client = create_client();
        let deferred = client.call("changeTheme", vec![json!("neon")]);

        client.deliver(ResultMessage::failure(
            "req_1",
            CallError::new("ValueError", "unknown theme"),
        ));
        let err = deferred.await.unwrap_err();
        assert_eq!(err.kind, "ValueError");
    }

    #[test]
    fn test_duplicate_result_is_discarded() {
        let client = create_client();
        let mut deferred = client.call("getItems", vec![]);

        assert!(client.deliver(ResultMessage::success("req_1", json!(1))));
        assert!(!client.deliver(ResultMessage::success("req_1", json!(2))));
        assert!(!client.deliver(ResultMessage::success("req_99", json!(3))));

        assert_eq!(deferred.try_take().unwrap().unwrap(), json!(1));
        assert_eq!(client.discarded_results(), 2);
    }

    #[test]
    fn test_deliver_json() {
        let client = create_client();
        let mut deferred = client.call("getItems", vec![]);

        assert!(!client.deliver_json("not a message"));
        assert!(!client.deliver_json(r#"{"kind":"call","method":"x","args":[],"correlationId":"req_1"}"#));
        assert!(client.deliver_json(r#"{"kind":"result","correlationId":"req_1","payload":["a"],"error":null}"#));

        assert_eq!(deferred.try_take().unwrap().unwrap(), json!(["a"]));
    }

    #[test]
    fn test_call_typed_rejects_non_array() {
        let client = create_client();
        let mut deferred = client.call_typed("addItem", json!({"item": "c"}));

        let err = deferred.try_take().unwrap().unwrap_err();
        assert!(err.is(ErrorCode::InvalidArguments));
        assert!(client.adapter().calls.lock().is_empty());
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_call_typed_tuple() {
        let client = create_client();
        client.call_typed("showMessage", ("hello",));
        client.call_typed("getItems", ());

        let calls = client.adapter().calls.lock();
        assert_eq!(calls[0].args, vec![json!("hello")]);
        assert!(calls[1].args.is_empty());
    }

    #[test]
    fn test_transport_failure_rejects() {
        let adapter = RecordingAdapter {
            closed: true,
            ..Default::default()
        };
        let client = GuestClient::new(adapter, &BridgeConfig::default());
        let mut deferred = client.call("getItems", vec![]);

        let err = deferred.try_take().unwrap().unwrap_err();
        assert!(err.is(ErrorCode::Disconnected));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_expired_calls_are_rejected() {
        let config = BridgeConfig::new().with_pending_timeout_ms(1);
        let client = GuestClient::new(RecordingAdapter::default(), &config);
        let mut deferred = client.call("slow", vec![]);

        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(client.reap_expired(), 1);

        let err = deferred.try_take().unwrap().unwrap_err();
        assert!(err.is(ErrorCode::Expired));
        assert!(!client.deliver(ResultMessage::success("req_1", json!(1))));
    }

    #[test]
    fn test_lookups_and_writes() {
        let client = create_client();

        assert_eq!(client.get_constant("VERSION"), json!("1.0.0"));
        assert_eq!(client.get_constant("missing"), Value::Null);

        client.set_variable("theme", &json!("dark"));
        assert_eq!(client.get_variable("theme"), json!("dark"));

        client.set_variable_raw("counter", "not json");
        assert_eq!(client.get_variable("counter"), Value::Null);
    }
}
