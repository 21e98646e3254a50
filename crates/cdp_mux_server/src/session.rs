//! One front-end client: its router, its outbound writer, and device attachment.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cdp_mux_core::backend::{DeviceDiscovery, WebSocketConnector};
use cdp_mux_core::prelude::PreludeCommand;
use cdp_mux_core::{ChannelSink, ClientMessage, ClientSink, PathTranslator, RawMessage, Router};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Shared across sessions; built once at startup.
pub struct SessionContext {
    pub discovery: Arc<DeviceDiscovery>,
    pub translator: Arc<dyn PathTranslator>,
    pub prelude: Vec<PreludeCommand>,
    pub poll_interval: Duration,
}

pub struct Session {
    router: Router,
    sink: ChannelSink,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    discovery: Arc<DeviceDiscovery>,
    poll_interval: Duration,
}

impl Session {
    pub fn new(context: &SessionContext) -> Self {
        let (sink, outbound) = ChannelSink::new();
        let router = Router::new(
            Arc::new(sink.clone()),
            Arc::new(WebSocketConnector),
            context.translator.clone(),
            context.prelude.clone(),
        );
        Self {
            router,
            sink,
            outbound,
            discovery: context.discovery.clone(),
            poll_interval: context.poll_interval,
        }
    }

    /// Serves the client until it disconnects, then tears down every backend.
    pub async fn run<S>(self, socket: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            router,
            sink,
            mut outbound,
            discovery,
            poll_interval,
        } = self;
        let (mut write, mut read) = socket.split();

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode client message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::debug!("Client write failed: {}", e);
                    break;
                }
            }
        });
        let attacher = tokio::spawn(attach_devices(router.clone(), discovery, poll_interval));

        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode_frame(text.as_str()) {
                    Ok(message) => {
                        let router = router.clone();
                        tokio::spawn(async move { router.dispatch(message).await });
                    }
                    Err(Some(reply)) => sink.deliver(reply),
                    Err(None) => tracing::warn!("Dropping malformed client frame: {}", text.as_str()),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Client connection error: {}", e);
                    break;
                }
            }
        }

        attacher.abort();
        router.dispose();
        writer.abort();
    }
}

/// A frame that fails to decode but carries a numeric `id` yields an error reply for it.
fn decode_frame(text: &str) -> Result<RawMessage, Option<ClientMessage>> {
    let value: Value = serde_json::from_str(text).map_err(|_| None)?;
    let id = value.get("id").and_then(Value::as_u64);
    serde_json::from_value(value)
        .map_err(|e| id.map(|id| ClientMessage::error(Some(id), format!("Malformed message: {e}"))))
}

/// Polls discovery and attaches every device id not seen before. Attaches run concurrently so
/// a stalled device cannot hold up the others; aborting this task aborts them.
async fn attach_devices(router: Router, discovery: Arc<DeviceDiscovery>, poll_interval: Duration) {
    let mut seen = HashSet::new();
    let mut attaching = JoinSet::new();
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;
        while attaching.try_join_next().is_some() {}

        let devices = match discovery.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::debug!("Discovery at {} failed: {}", discovery.list_url(), e);
                continue;
            }
        };

        for device in devices {
            if !seen.insert(device.id.clone()) {
                continue;
            }
            let router = router.clone();
            attaching.spawn(async move {
                let device_id = device.id.clone();
                if let Err(e) = router.add(device).await {
                    tracing::warn!("Failed to attach device {}: {}", device_id, e);
                }
            });
        }
    }
}
