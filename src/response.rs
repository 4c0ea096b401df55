// Firebase MCP Gateway - Response Envelope
//
// Every tool call, success or failure, is normalized into one ToolResponse.
// Nothing else ever reaches the transport layer.

use crate::error::{ErrorKind, GateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single content entry. MCP tool results carry text content only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self { kind: "text".to_string(), text: text.into() }
    }
}

/// The uniform envelope returned for every tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ToolResponse {
    /// Success envelope. Strings pass through as-is, everything else is
    /// JSON-encoded into the single text entry.
    pub fn success(data: Value) -> Self {
        let text = match data {
            Value::String(s) => s,
            other => serde_json::to_string_pretty(&other)
                .unwrap_or_else(|_| other.to_string()),
        };
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
            error_kind: None,
        }
    }

    /// Failure envelope. Logs a structured entry before returning; the log
    /// level tracks the kind (client faults warn, platform faults error).
    pub fn failure(err: GateError) -> Self {
        match err.kind {
            ErrorKind::Internal => {
                log::error!("tool error [{}]: {}", err.kind.as_str(), err.message)
            }
            _ => log::warn!("tool error [{}]: {}", err.kind.as_str(), err.message),
        }
        Self {
            content: vec![ContentItem::text(err.message)],
            is_error: true,
            error_kind: Some(err.kind),
        }
    }

    /// First text entry, for callers that only need the message.
    pub fn text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_keeps_strings_verbatim() {
        let resp = ToolResponse::success(json!("User deleted: u1"));
        assert!(!resp.is_error);
        assert_eq!(resp.text(), "User deleted: u1");
        assert!(resp.error_kind.is_none());
    }

    #[test]
    fn success_round_trips_json_values() {
        let data = json!({"id": "u1", "tags": ["a", "b"], "count": 3});
        let resp = ToolResponse::success(data.clone());
        let parsed: Value = serde_json::from_str(resp.text()).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let resp = ToolResponse::failure(GateError::not_found(
            "Document u1 not found in collection users",
        ));
        assert!(resp.is_error);
        assert_eq!(resp.error_kind, Some(ErrorKind::NotFound));
        assert!(resp.text().contains("u1"));
        assert!(resp.text().contains("users"));
    }

    #[test]
    fn envelope_serializes_mcp_field_names() {
        let resp = ToolResponse::failure(GateError::rate_limit("slow down"));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["isError"], json!(true));
        assert_eq!(v["errorKind"], json!("RATE_LIMIT"));
        assert_eq!(v["content"][0]["type"], json!("text"));
    }
}
