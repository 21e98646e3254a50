//! Fan-out/fan-in: one command to many backends, many replies back to one.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use crate::backend::{BackendConnection, BackendReply, ConnectionId};

/// One backend's reply within a fan-out batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutReply {
    pub connection: ConnectionId,
    pub reply: BackendReply,
}

/// Sends `method` to every target concurrently and waits for all of them. The batch is in
/// target order; transport failures are folded into error replies.
pub async fn fan_out(
    targets: &[Arc<dyn BackendConnection>],
    method: &str,
    params: &Value,
) -> Vec<FanOutReply> {
    let sends = targets.iter().map(|target| {
        let params = params.clone();
        async move {
            let reply = match target.send_command(method, params).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("{} to backend {} failed: {}", method, target.id(), e);
                    BackendReply::failure(e.to_string())
                }
            };
            FanOutReply {
                connection: target.id(),
                reply,
            }
        }
    });
    join_all(sends).await
}

/// The first success in batch order, else the first reply. `None` only for an empty batch.
pub fn select_canonical(batch: &[FanOutReply]) -> Option<&FanOutReply> {
    batch
        .iter()
        .find(|entry| entry.reply.is_success())
        .or_else(|| batch.first())
}
