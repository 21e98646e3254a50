use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{BackendConnection, BackendEvent, BackendReply, ConnectionId, Connector, DeviceInfo, EventSender};
use crate::types::{ErrorBody, RawMessage};
use crate::{MuxError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const COMMAND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, PartialEq)]
enum Incoming {
    Reply { id: u64, reply: BackendReply },
    Event(RawMessage),
    Ignored,
}

fn classify(text: &str) -> Result<Incoming> {
    let message: WireMessage = serde_json::from_str(text)?;
    match (message.id, message.method) {
        (Some(id), _) => Ok(Incoming::Reply {
            id,
            reply: BackendReply {
                result: message.result,
                error: message.error,
            },
        }),
        (None, Some(method)) => Ok(Incoming::Event(RawMessage::event(
            method,
            message.params.unwrap_or_else(|| Value::Object(Default::default())),
        ))),
        (None, None) => Ok(Incoming::Ignored),
    }
}

struct PendingCommand {
    id: u64,
    frame: String,
    response_tx: oneshot::Sender<BackendReply>,
}

/// A CDP target reached over its `webSocketDebuggerUrl`.
pub struct WebSocketBackend {
    id: ConnectionId,
    device: String,
    request_id: AtomicU64,
    cmd_tx: mpsc::Sender<PendingCommand>,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BackendConnection for WebSocketBackend {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn device(&self) -> &str {
        &self.device
    }

    async fn send_command(&self, method: &str, params: Value) -> Result<BackendReply> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&WireRequest {
            id,
            method,
            params: &params,
        })?;

        tracing::debug!("Sending backend command: connection={}, method={}, id={}", self.id, method, id);

        let (response_tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(PendingCommand {
                id,
                frame,
                response_tx,
            })
            .await
            .map_err(|_| MuxError::ConnectionClosed(self.id))?;

        let reply = rx.await.map_err(|_| MuxError::ConnectionClosed(self.id))?;

        if let Some(error) = &reply.error {
            tracing::warn!(
                "Backend error: connection={}, method={}, message={}",
                self.id,
                method,
                error.message
            );
        }
        Ok(reply)
    }

    fn close(&self) {
        self.handler.abort();
    }
}

impl Drop for WebSocketBackend {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

async fn handler_loop(
    connection: ConnectionId,
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<PendingCommand>,
    events: EventSender,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, oneshot::Sender<BackendReply>> = HashMap::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                pending.insert(cmd.id, cmd.response_tx);
                if let Err(e) = ws_tx.send(Message::Text(cmd.frame.into())).await {
                    tracing::warn!("Failed to write to backend {}: {}", connection, e);
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                match classify(&text) {
                    Ok(Incoming::Reply { id, reply }) => {
                        if let Some(tx) = pending.remove(&id) {
                            let _ = tx.send(reply);
                        }
                    }
                    Ok(Incoming::Event(message)) => {
                        if events.send(BackendEvent { connection, message }).is_err() {
                            break;
                        }
                    }
                    Ok(Incoming::Ignored) => {}
                    Err(e) => tracing::warn!("Dropping unreadable frame from backend {}: {}", connection, e),
                }
            }
        }
    }

    // Dropping `pending` fails every waiter with ConnectionClosed.
    tracing::info!("Backend connection {} closed ({} replies outstanding)", connection, pending.len());
}

#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        id: ConnectionId,
        device: &DeviceInfo,
        events: EventSender,
    ) -> Result<Arc<dyn BackendConnection>> {
        let url = device
            .web_socket_debugger_url
            .as_deref()
            .ok_or_else(|| MuxError::UnknownDevice(device.id.clone()))?;

        let (ws, _) = connect_async(url).await?;
        tracing::info!("Connected to backend {}: device={}, url={}", id, device.id, url);

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let handler = tokio::spawn(handler_loop(id, ws, cmd_rx, events));

        Ok(Arc::new(WebSocketBackend {
            id,
            device: device.id.clone(),
            request_id: AtomicU64::new(1),
            cmd_tx,
            handler,
        }))
    }
}
