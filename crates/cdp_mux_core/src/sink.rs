use tokio::sync::mpsc;

use crate::types::ClientMessage;

/// The router's only way back to the front-end client.
pub trait ClientSink: Send + Sync {
    fn deliver(&self, message: ClientMessage);
}

/// Queues client messages for a writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ClientSink for ChannelSink {
    fn deliver(&self, message: ClientMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Client writer gone, dropping outbound message");
        }
    }
}
