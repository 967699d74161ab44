//! Events consumed by the decision engine.
//!
//! Events are ephemeral. Only their audit trail is kept on the document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A completed external operation, fed back into the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Operation name as dispatched
    pub operation: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub result: Value,
    /// The user's literal message for the turn, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

/// A failed external operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub operation: String,
    #[serde(default)]
    pub arguments: Value,
    pub error: String,
}

/// One input to `decide`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    UserMessage {
        text: String,
    },
    UserSelectedBundle {
        bundle_id: String,
    },
    UserRequestHold {},
    UserApprovedPurchase {
        approval_token: String,
        payment_method_id: String,
    },
    ToolResult(ToolResult),
    ToolError(ToolFailure),
    IntentReady {},
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage { text: text.into() }
    }

    pub fn tool_result(
        operation: impl Into<String>,
        arguments: Value,
        result: Value,
        user_message: Option<String>,
    ) -> Self {
        Event::ToolResult(ToolResult {
            operation: operation.into(),
            arguments,
            result,
            user_message,
        })
    }

    pub fn tool_error(operation: impl Into<String>, arguments: Value, error: impl Into<String>) -> Self {
        Event::ToolError(ToolFailure {
            operation: operation.into(),
            arguments,
            error: error.into(),
        })
    }

    /// Wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "USER_MESSAGE",
            Event::UserSelectedBundle { .. } => "USER_SELECTED_BUNDLE",
            Event::UserRequestHold {} => "USER_REQUEST_HOLD",
            Event::UserApprovedPurchase { .. } => "USER_APPROVED_PURCHASE",
            Event::ToolResult(_) => "TOOL_RESULT",
            Event::ToolError(_) => "TOOL_ERROR",
            Event::IntentReady {} => "INTENT_READY",
        }
    }
}

/// One prior conversation message, passed to extraction and the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = Event::UserSelectedBundle {
            bundle_id: "bndl_1".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "USER_SELECTED_BUNDLE");
        assert_eq!(value["data"]["bundle_id"], "bndl_1");
        assert_eq!(event.event_type(), "USER_SELECTED_BUNDLE");
    }

    #[test]
    fn test_tool_error_deserializes() {
        let value = json!({
            "type": "TOOL_ERROR",
            "data": {"operation": "flight_quote_search", "error": "timeout"}
        });
        let event: Event = serde_json::from_value(value).unwrap();
        match event {
            Event::ToolError(failure) => {
                assert_eq!(failure.operation, "flight_quote_search");
                assert_eq!(failure.error, "timeout");
                assert!(failure.arguments.is_null());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_types_are_distinct() {
        let events = [
            Event::user_message("hi"),
            Event::UserSelectedBundle {
                bundle_id: "b".to_string(),
            },
            Event::UserRequestHold {},
            Event::UserApprovedPurchase {
                approval_token: "t".to_string(),
                payment_method_id: "pm".to_string(),
            },
            Event::tool_result("x", json!({}), json!({}), None),
            Event::tool_error("x", json!({}), "boom"),
            Event::IntentReady {},
        ];
        let mut tags: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), 7);
    }
}
