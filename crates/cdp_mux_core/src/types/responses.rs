use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RequestId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

/// Everything the mux sends to the front-end client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Reply {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        result: Value,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        error: ErrorBody,
    },
    Event {
        method: String,
        params: Value,
    },
}

impl ClientMessage {
    pub fn result(id: Option<RequestId>, result: Value) -> Self {
        Self::Reply { id, result }
    }

    pub fn error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            error: ErrorBody::new(message),
        }
    }

    pub fn event(method: impl Into<String>, params: Value) -> Self {
        Self::Event {
            method: method.into(),
            params,
        }
    }

    pub fn id(&self) -> Option<RequestId> {
        match self {
            Self::Reply { id, .. } | Self::Error { id, .. } => *id,
            Self::Event { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_wire_shape() {
        let reply = ClientMessage::result(Some(7), json!({}));
        assert_eq!(serde_json::to_value(&reply).unwrap(), json!({"id": 7, "result": {}}));
    }

    #[test]
    fn test_error_wire_shape_without_id() {
        let reply = ClientMessage::error(None, "Unhandled command: Page.reload");
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"error": {"message": "Unhandled command: Page.reload"}})
        );
        assert_eq!(reply.id(), None);
        assert!(reply.is_error());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = ClientMessage::event("Debugger.resumed", json!({}));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"method": "Debugger.resumed", "params": {}})
        );
    }

    #[test]
    fn test_decode_picks_matching_variant() {
        let error: ClientMessage =
            serde_json::from_value(json!({"id": 1, "error": {"code": -32000, "message": "boom"}})).unwrap();
        assert_eq!(
            error,
            ClientMessage::Error {
                id: Some(1),
                error: ErrorBody {
                    code: Some(-32000),
                    message: "boom".to_string()
                }
            }
        );

        let event: ClientMessage =
            serde_json::from_value(json!({"method": "Debugger.paused", "params": {"callFrames": []}})).unwrap();
        assert!(matches!(event, ClientMessage::Event { .. }));
    }
}
