use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page → broker request over the relay channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayRequest {
    ExecuteCommand { command: String },
}

/// Broker → page broadcast signals. Fire-and-forget, never acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageSignal {
    ToggleOverlay,
}

/// Body posted to the remote interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    pub url: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Advisory summary of what the interpreter understood. Display only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    pub action: Option<String>,
    pub target: Option<String>,
}

impl Interpretation {
    /// Best-effort view of the raw `interpretation` value. Non-string fields
    /// are kept in their JSON form; anything that is not an object yields
    /// an empty summary.
    pub fn from_value(raw: &Value) -> Self {
        let field = |name: &str| match raw.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        Self {
            action: field("action"),
            target: field("target"),
        }
    }
}

/// Interpreter reply, relayed to the page unchanged.
///
/// `actions` stays untyped here: it is validated on the page side right
/// before execution, never trusted as already typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
    /// Kept raw so that advisory metadata of any shape never fails a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn interpretation(&self) -> Option<Interpretation> {
        self.interpretation.as_ref().map(Interpretation::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_extension_message_names() {
        let request = RelayRequest::ExecuteCommand {
            command: "Scroll down".into(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"type": "EXECUTE_COMMAND", "command": "Scroll down"})
        );
        assert_eq!(
            serde_json::to_value(PageSignal::ToggleOverlay).unwrap(),
            json!({"type": "TOGGLE_OVERLAY"})
        );
    }

    #[test]
    fn command_request_omits_absent_user() {
        let body = CommandRequest {
            command: "Search for shoes".into(),
            url: String::new(),
            user_id: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"command": "Search for shoes", "url": ""})
        );
    }

    #[test]
    fn failure_response_carries_only_the_error() {
        let response = CommandResponse::failure("connection refused");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": "connection refused"})
        );
    }

    #[test]
    fn decodes_interpreter_reply() {
        let reply: CommandResponse = serde_json::from_value(json!({
            "success": true,
            "actions": [{"type": "fill", "selector": "input", "value": "shoes"}],
            "interpretation": {"action": "search", "target": "shoes"}
        }))
        .unwrap();
        assert_eq!(reply.success, Some(true));
        assert!(reply.actions.as_ref().is_some_and(Value::is_array));
        assert!(!reply.is_error());
        assert_eq!(
            reply.interpretation().and_then(|i| i.action).as_deref(),
            Some("search")
        );
    }

    #[test]
    fn interpretation_of_any_shape_decodes() {
        for interpretation in [
            json!({"action": "scroll", "target": {"kind": "page"}}),
            json!({"target": "page"}),
            json!("scrolling down"),
            json!(null),
        ] {
            let reply: CommandResponse = serde_json::from_value(json!({
                "actions": [{"kind": "scroll", "direction": "down"}],
                "interpretation": interpretation,
            }))
            .unwrap();
            assert!(reply.actions.is_some());
        }

        let summary = Interpretation::from_value(&json!({"action": "scroll", "target": {"kind": "page"}}));
        assert_eq!(summary.action.as_deref(), Some("scroll"));
        assert_eq!(summary.target.as_deref(), Some(r#"{"kind":"page"}"#));
        assert_eq!(
            Interpretation::from_value(&json!({"target": "page"})).action,
            None
        );
    }
}
