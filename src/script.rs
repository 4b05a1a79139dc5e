//! Guest bridge script for webview hosts.
//!
//! A host that runs guest code in a webview injects [`guest_bridge_script`]
//! as an initialization script, connects it to its transport, and pushes each
//! Result back by evaluating [`settle_script`].

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::message::ResultMessage;

/// JS client stub. Placeholders are filled in by [`guest_bridge_script`].
const GUEST_BRIDGE_TEMPLATE: &str = include_str!("guest_bridge.js");

/// Render the guest client stub for `config`.
///
/// The stub installs `window[objectName]` with `call`, `getConstant`,
/// `getVariable`, `setVariable` and `connect(transport)`, and speaks the same
/// Call/Result protocol as [`GuestClient`](crate::guest::GuestClient).
pub fn guest_bridge_script(config: &BridgeConfig) -> String {
    let timeout = config
        .pending_timeout_ms
        .map(|ms| ms.to_string())
        .unwrap_or_else(|| "null".to_string());

    GUEST_BRIDGE_TEMPLATE
        .replace("__OBJECT_NAME__", &js_string(&config.object_name))
        .replace("__ID_PREFIX__", &js_string(&config.id_prefix))
        .replace("__TIMEOUT_MS__", &timeout)
}

/// JS snippet that settles a pending guest call with `result`
pub fn settle_script(config: &BridgeConfig, result: &ResultMessage) -> Result<String> {
    Ok(format!(
        "window[{}]._settle({});",
        js_string(&config.object_name),
        js_safe(&result.to_json()?)
    ))
}

fn js_string(s: &str) -> String {
    js_safe(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()))
}

// JSON allows U+2028 and U+2029 unescaped; older JS parsers do not
fn js_safe(json: &str) -> String {
    json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use serde_json::json;

    #[test]
    fn test_script_fills_placeholders() {
        let config = BridgeConfig::new()
            .with_object_name("displayBridge")
            .with_id_prefix("call_")
            .with_pending_timeout_ms(5000);
        let script = guest_bridge_script(&config);

        assert!(script.contains(r#"var OBJECT_NAME = "displayBridge";"#));
        assert!(script.contains(r#"var ID_PREFIX = "call_";"#));
        assert!(script.contains("var TIMEOUT_MS = 5000;"));
        assert!(!script.contains("__"));
    }

    #[test]
    fn test_script_without_timeout() {
        let script = guest_bridge_script(&BridgeConfig::default());
        assert!(script.contains(r#"var OBJECT_NAME = "hostBridge";"#));
        assert!(script.contains("var TIMEOUT_MS = null;"));
    }

    #[test]
    fn test_settle_script_success() {
        let result = ResultMessage::success("req_3", json!(["a", "b"]));
        let script = settle_script(&BridgeConfig::default(), &result).unwrap();

        assert!(script.starts_with(r#"window["hostBridge"]._settle({"#));
        assert!(script.contains(r#""correlationId":"req_3""#));
        assert!(script.ends_with(");"));
    }

    #[test]
    fn test_settle_script_error() {
        let result = ResultMessage::failure("req_4", CallError::no_such_method("nope"));
        let script = settle_script(&BridgeConfig::default(), &result).unwrap();
        assert!(script.contains(r#""type":"NoSuchMethod""#));
    }

    #[test]
    fn test_settle_script_escapes_line_separators() {
        let result = ResultMessage::success("req_5", json!("a\u{2028}b"));
        let script = settle_script(&BridgeConfig::default(), &result).unwrap();

        assert!(!script.contains('\u{2028}'));
        assert!(script.contains("a\\u2028b"));
    }

    #[test]
    fn test_script_pending_map_has_no_prototype() {
        let script = guest_bridge_script(&BridgeConfig::default());

        assert!(script.contains("var pending = Object.create(null);"));
        assert!(!script.contains("var pending = {};"));
        assert!(script.contains("hasOwn.call(pending, result.correlationId)"));
        assert!(script.contains(r#"typeof result.correlationId !== "string""#));
    }
}
