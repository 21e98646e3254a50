//! Command router: the single client-facing session in front of every backend.
//!
//! Client commands are split into `Domain.method` and dispatched. `enable` is acknowledged
//! locally, breakpoint commands fan out to every attached backend and collapse back into one
//! reply, and everything else is rejected with the request id preserved. Backend events arrive
//! through a channel drained by a background task and are handed to the [`EventForwarder`].
//!
//! Overlapping breakpoint operations are not serialized: two concurrent `setBreakpointByUrl`
//! calls may interleave their fan-outs, and a backend attached mid-operation may miss one of
//! them. A backend that never replies stalls the operation that addressed it; there is no
//! timeout at this layer.

use std::sync::{Arc, Weak};

use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use crate::backend::{BackendEvent, ConnectionId, Connector, DeviceInfo, EventSender};
use crate::breakpoints::{self, BreakpointRegistry};
use crate::connections::ConnectionManager;
use crate::dispose::Disposer;
use crate::events::EventForwarder;
use crate::fanout::{fan_out, select_canonical};
use crate::paths::PathTranslator;
use crate::prelude::PreludeCommand;
use crate::sink::ClientSink;
use crate::types::{
    methods, ClientMessage, Domain, Inbound, RawMessage, RemoveBreakpointParams, RequestId,
    SetBreakpointParams,
};
use crate::Result;

const NO_CONNECTIONS: &str = "No backend connections attached";

#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    sink: Arc<dyn ClientSink>,
    translator: Arc<dyn PathTranslator>,
    connections: ConnectionManager,
    breakpoints: Mutex<BreakpointRegistry>,
    events: EventForwarder,
    event_tx: EventSender,
    disposer: Disposer,
}

impl Router {
    /// Must be called inside a Tokio runtime: the backend event pump is spawned here.
    pub fn new(
        sink: Arc<dyn ClientSink>,
        connector: Arc<dyn Connector>,
        translator: Arc<dyn PathTranslator>,
        prelude: Vec<PreludeCommand>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RouterInner {
            events: EventForwarder::new(sink.clone(), translator.clone()),
            sink,
            translator,
            connections: ConnectionManager::new(connector, prelude),
            breakpoints: Mutex::new(BreakpointRegistry::new()),
            event_tx,
            disposer: Disposer::new(),
        });

        let pump = tokio::spawn(pump_events(Arc::downgrade(&inner), event_rx));
        inner.disposer.register(move || pump.abort());

        Self { inner }
    }

    /// Handles one client message. Every outcome reaches the client through the sink.
    pub async fn dispatch(&self, message: RawMessage) {
        let inner = &self.inner;
        match Inbound::from(message) {
            Inbound::Enable { id, domain } => {
                tracing::debug!("Acknowledging {}.enable locally", domain.as_str());
                inner.sink.deliver(ClientMessage::result(id, json!({})));
                if domain == Domain::Debugger {
                    inner.events.initial_pause();
                }
            }
            Inbound::SetBreakpointByUrl { id, params } => {
                let reply = self.set_breakpoint_by_url(id, params).await;
                inner.sink.deliver(reply);
            }
            Inbound::RemoveBreakpoint { id, params } => {
                let reply = self.remove_breakpoint(id, params).await;
                inner.sink.deliver(reply);
            }
            Inbound::ScriptParsed { params } => inner.events.script_parsed(params),
            Inbound::Paused { params } => inner.events.paused(None, params),
            Inbound::Resumed { params } => inner.events.resumed(None, params),
            Inbound::Invalid { id, method, reason } => {
                tracing::warn!("Invalid params for {}: {}", method, reason);
                inner
                    .sink
                    .deliver(ClientMessage::error(id, format!("Invalid params for {method}: {reason}")));
            }
            Inbound::Unrecognized(raw) => {
                tracing::debug!("Unhandled command: method={}, id={:?}", raw.method, raw.id);
                inner
                    .sink
                    .deliver(ClientMessage::error(raw.id, format!("Unhandled command: {}", raw.method)));
            }
        }
    }

    async fn set_breakpoint_by_url(
        &self,
        id: Option<RequestId>,
        params: SetBreakpointParams,
    ) -> ClientMessage {
        let targets = self.inner.connections.members().await;
        if targets.is_empty() {
            return ClientMessage::error(id, NO_CONNECTIONS);
        }

        let backend_params =
            match breakpoints::to_backend_params(&params, self.inner.translator.as_ref()) {
                Ok(backend_params) => backend_params,
                Err(e) => return ClientMessage::error(id, e.to_string()),
            };

        let batch = fan_out(&targets, methods::SET_BREAKPOINT_BY_URL, &backend_params).await;
        let Some(canonical) = select_canonical(&batch) else {
            return ClientMessage::error(id, NO_CONNECTIONS);
        };

        if canonical.reply.is_success() {
            match canonical.reply.result.as_ref().and_then(breakpoints::breakpoint_id) {
                Some(breakpoint_id) => {
                    tracing::debug!(
                        "Breakpoint {} accepted by backend {} ({}/{} replies)",
                        breakpoint_id,
                        canonical.connection,
                        batch.iter().filter(|entry| entry.reply.is_success()).count(),
                        batch.len()
                    );
                    self.inner.breakpoints.lock().await.insert(breakpoint_id, params);
                }
                None => tracing::warn!(
                    "Backend {} accepted a breakpoint without an id",
                    canonical.connection
                ),
            }
        }

        canonical.reply.clone().into_client(id)
    }

    async fn remove_breakpoint(
        &self,
        id: Option<RequestId>,
        params: RemoveBreakpointParams,
    ) -> ClientMessage {
        let targets = self.inner.connections.members().await;
        if targets.is_empty() {
            return ClientMessage::error(id, NO_CONNECTIONS);
        }

        let backend_params = json!({ "breakpointId": params.breakpoint_id });
        let batch = fan_out(&targets, methods::REMOVE_BREAKPOINT, &backend_params).await;
        let Some(canonical) = select_canonical(&batch) else {
            return ClientMessage::error(id, NO_CONNECTIONS);
        };

        if canonical.reply.is_success() {
            self.inner.breakpoints.lock().await.remove(&params.breakpoint_id);
        }

        canonical.reply.clone().into_client(id)
    }

    /// Attaches a backend: connect, handshake, replay breakpoints. On handshake failure the
    /// backend stays in the set; evicting it is the caller's call.
    pub async fn add(&self, device: DeviceInfo) -> Result<ConnectionId> {
        let inner = &self.inner;
        inner
            .connections
            .add(
                &device,
                inner.event_tx.clone(),
                &inner.breakpoints,
                inner.translator.as_ref(),
                &inner.disposer,
            )
            .await
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.len().await
    }

    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.inner.connections.ids().await
    }

    pub async fn breakpoints(&self) -> Vec<(String, SetBreakpointParams)> {
        self.inner.breakpoints.lock().await.snapshot()
    }

    pub fn paused_connection(&self) -> Option<ConnectionId> {
        self.inner.events.paused_connection()
    }

    /// Stops the event pump and closes every backend. Safe to call more than once.
    pub fn dispose(&self) {
        self.inner.disposer.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposer.is_disposed()
    }
}

async fn pump_events(inner: Weak<RouterInner>, mut event_rx: mpsc::UnboundedReceiver<BackendEvent>) {
    while let Some(event) = event_rx.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        inner.events.handle_backend_event(event);
    }
}
