//! Wire messages exchanged across the bridge.
//!
//! Every message is a JSON object tagged by `kind`. A guest sends `call`
//! messages; the host answers each one with exactly one `result` message
//! carrying the same correlation ID.

use crate::error::{CallError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque token pairing a Call with its eventual Result
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an existing ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the ID for the `sequence`-th call of a session
    pub fn sequential(prefix: &str, sequence: u64) -> Self {
        Self(format!("{}{}", prefix, sequence))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Tagged envelope for everything that crosses the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BridgeMessage {
    /// Guest to host method invocation
    Call(CallMessage),
    /// Host to guest outcome of a call
    Result(ResultMessage),
}

impl BridgeMessage {
    /// Parse a message from JSON text
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize the message to JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Correlation ID carried by the message
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            BridgeMessage::Call(call) => &call.correlation_id,
            BridgeMessage::Result(result) => &result.correlation_id,
        }
    }
}

impl From<CallMessage> for BridgeMessage {
    fn from(call: CallMessage) -> Self {
        BridgeMessage::Call(call)
    }
}

impl From<ResultMessage> for BridgeMessage {
    fn from(result: ResultMessage) -> Self {
        BridgeMessage::Result(result)
    }
}

/// Method invocation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    /// Registered method name
    pub method: String,

    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,

    /// Correlation ID allocated by the guest
    pub correlation_id: CorrelationId,
}

impl CallMessage {
    /// Create a new call message
    pub fn new(
        correlation_id: impl Into<CorrelationId>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            method: method.into(),
            args,
            correlation_id: correlation_id.into(),
        }
    }
}

/// Outcome of a call: a payload or an error, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    /// Correlation ID copied from the call
    pub correlation_id: CorrelationId,

    /// Return value (null on failure)
    #[serde(default)]
    pub payload: Value,

    /// Error details (null on success)
    #[serde(default)]
    pub error: Option<CallError>,
}

impl ResultMessage {
    /// Create a success result
    pub fn success(correlation_id: impl Into<CorrelationId>, payload: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload,
            error: None,
        }
    }

    /// Create an error result
    pub fn failure(correlation_id: impl Into<CorrelationId>, error: CallError) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload: Value::Null,
            error: Some(error),
        }
    }

    /// Create a result from a method outcome
    pub fn from_outcome(
        correlation_id: impl Into<CorrelationId>,
        outcome: std::result::Result<Value, CallError>,
    ) -> Self {
        match outcome {
            Ok(payload) => Self::success(correlation_id, payload),
            Err(error) => Self::failure(correlation_id, error),
        }
    }

    /// Whether the result carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into the outcome a deferred settles with.
    ///
    /// An error wins over a payload if a peer sends both.
    pub fn into_outcome(self) -> std::result::Result<Value, CallError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.payload),
        }
    }

    /// Serialize the result to JSON text
    pub fn to_json(&self) -> Result<String> {
        BridgeMessage::Result(self.clone()).to_json()
    }
}

/// Pull a string `correlationId` out of JSON text that claims to be a call.
///
/// Used to answer calls that fail to decode but still name themselves.
/// Anything tagged with a `kind` other than `call` yields `None`.
pub fn salvage_correlation_id(raw: &str) -> Option<CorrelationId> {
    let value: Value = serde_json::from_str(raw).ok()?;
    match value.get("kind") {
        None => {}
        Some(Value::String(kind)) if kind == "call" => {}
        Some(_) => return None,
    }
    value
        .get("correlationId")
        .and_then(Value::as_str)
        .map(CorrelationId::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_wire_shape() {
        let call = CallMessage::new("req_1", "addItem", vec![json!("c")]);
        let json = serde_json::to_value(BridgeMessage::from(call)).unwrap();
        assert_eq!(
            json,
            json!({"kind": "call", "method": "addItem", "args": ["c"], "correlationId": "req_1"})
        );
    }

    #[test]
    fn test_result_wire_shape() {
        let ok = ResultMessage::success("req_2", json!(true));
        let json = serde_json::to_value(BridgeMessage::from(ok)).unwrap();
        assert_eq!(
            json,
            json!({"kind": "result", "correlationId": "req_2", "payload": true, "error": null})
        );

        let failed = ResultMessage::failure("req_3", CallError::no_such_method("nope"));
        let json = serde_json::to_value(BridgeMessage::from(failed)).unwrap();
        assert_eq!(json["payload"], Value::Null);
        assert_eq!(json["error"]["type"], "NoSuchMethod");
    }

    #[test]
    fn test_parse_call_without_args() {
        let msg =
            BridgeMessage::from_json(r#"{"kind":"call","method":"getItems","correlationId":"req_9"}"#)
                .unwrap();
        match msg {
            BridgeMessage::Call(call) => {
                assert_eq!(call.method, "getItems");
                assert!(call.args.is_empty());
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_error_wins_over_payload() {
        let msg = ResultMessage {
            correlation_id: "req_1".into(),
            payload: json!(1),
            error: Some(CallError::new("Boom", "failed")),
        };
        assert_eq!(msg.into_outcome().unwrap_err().kind, "Boom");
    }

    #[test]
    fn test_salvage_correlation_id() {
        assert_eq!(
            salvage_correlation_id(r#"{"kind":"call","correlationId":"req_4","args":"x"}"#),
            Some(CorrelationId::from("req_4"))
        );
        assert_eq!(salvage_correlation_id(r#"{"kind":"call"}"#), None);
        assert_eq!(salvage_correlation_id("not json"), None);
        assert_eq!(salvage_correlation_id(r#"{"correlationId": 7}"#), None);
        assert_eq!(
            salvage_correlation_id(r#"{"correlationId":"req_5","args":3}"#),
            Some(CorrelationId::from("req_5"))
        );
    }

    #[test]
    fn test_salvage_skips_non_calls() {
        assert_eq!(
            salvage_correlation_id(r#"{"kind":"result","correlationId":"req_6","error":"bad"}"#),
            None
        );
        assert_eq!(
            salvage_correlation_id(r#"{"kind":7,"correlationId":"req_6"}"#),
            None
        );
    }

    #[test]
    fn test_sequential_ids() {
        assert_eq!(CorrelationId::sequential("req_", 1).as_str(), "req_1");
        assert_eq!(CorrelationId::sequential("req_", 42).to_string(), "req_42");
    }
}
