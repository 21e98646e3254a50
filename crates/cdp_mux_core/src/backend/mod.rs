//! Backend connection handles: one per execution context on a target device.

pub mod discovery;
pub mod websocket;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::types::{ClientMessage, ErrorBody, RawMessage, RequestId};
use crate::Result;

pub use discovery::DeviceDiscovery;
pub use websocket::{WebSocketBackend, WebSocketConnector};

/// Identity of a backend within one router, assigned in attach order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One debuggable target as advertised by the device's `/json/list` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, web_socket_debugger_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            web_socket_debugger_url: Some(web_socket_debugger_url.into()),
        }
    }
}

/// A backend's answer to one command. Either side may be missing on a malformed reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl BackendReply {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(ErrorBody::new(message)),
        }
    }

    /// Result present and error absent.
    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }

    /// Re-addresses the reply to a client request.
    pub fn into_client(self, id: Option<RequestId>) -> ClientMessage {
        match (self.result, self.error) {
            (_, Some(error)) => ClientMessage::Error { id, error },
            (Some(result), None) => ClientMessage::Reply { id, result },
            (None, None) => ClientMessage::error(id, "Backend returned an empty reply"),
        }
    }
}

/// An id-less message pushed by a backend, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub connection: ConnectionId,
    pub message: RawMessage,
}

pub type EventSender = mpsc::UnboundedSender<BackendEvent>;

#[async_trait]
pub trait BackendConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Human-readable device identity, used in logs and handshake errors.
    fn device(&self) -> &str;

    async fn send_command(&self, method: &str, params: Value) -> Result<BackendReply>;

    /// Releases the transport. Must be idempotent.
    fn close(&self) {}
}

/// Builds backend handles from device descriptions. Events from the new handle must be
/// delivered through `events`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        id: ConnectionId,
        device: &DeviceInfo,
        events: EventSender,
    ) -> Result<Arc<dyn BackendConnection>>;
}
