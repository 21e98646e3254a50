use serde_json::Value;
use thiserror::Error;

use crate::backend::ConnectionId;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Discovery error: {0}")]
    Discovery(#[from] reqwest::Error),

    #[error("Handshake with device {device} failed: {message}")]
    Handshake {
        device: String,
        message: String,
        responses: Vec<Value>,
    },

    #[error("Backend connection {0} closed")]
    ConnectionClosed(ConnectionId),

    #[error("No transport registered for device {0}")]
    UnknownDevice(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl MuxError {
    pub fn handshake_with_responses(
        device: impl Into<String>,
        message: impl Into<String>,
        responses: Vec<Value>,
    ) -> Self {
        Self::Handshake {
            device: device.into(),
            message: message.into(),
            responses,
        }
    }
}
