//! Backend-to-client event forwarding. One event in, one event out.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};

use crate::backend::{BackendEvent, ConnectionId};
use crate::paths::PathTranslator;
use crate::sink::ClientSink;
use crate::types::{methods, ClientMessage, RawMessage};

pub struct EventForwarder {
    sink: Arc<dyn ClientSink>,
    translator: Arc<dyn PathTranslator>,
    /// Set iff that connection has reported `Debugger.paused` and not yet `Debugger.resumed`.
    paused: Mutex<Option<ConnectionId>>,
}

impl EventForwarder {
    pub fn new(sink: Arc<dyn ClientSink>, translator: Arc<dyn PathTranslator>) -> Self {
        Self {
            sink,
            translator,
            paused: Mutex::new(None),
        }
    }

    pub fn paused_connection(&self) -> Option<ConnectionId> {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle_backend_event(&self, event: BackendEvent) {
        let BackendEvent { connection, message } = event;
        match message.method.as_str() {
            methods::SCRIPT_PARSED => self.script_parsed(message.params),
            methods::PAUSED => self.paused(Some(connection), message.params),
            methods::RESUMED => self.resumed(Some(connection), message.params),
            _ => self.passthrough(message),
        }
    }

    pub fn script_parsed(&self, params: Value) {
        let params = self.translator.script_parsed_to_client(params);
        self.sink.deliver(ClientMessage::event(methods::SCRIPT_PARSED, params));
    }

    // TODO: when the pause moves to another connection, emit Debugger.resumed first so the
    // client drops the stale call frames.
    pub fn paused(&self, origin: Option<ConnectionId>, params: Value) {
        if let Some(origin) = origin {
            let mut paused = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = paused.replace(origin).filter(|previous| *previous != origin) {
                tracing::debug!("Pause moved from backend {} to {}", previous, origin);
            }
        }
        self.sink.deliver(ClientMessage::event(methods::PAUSED, params));
    }

    pub fn resumed(&self, origin: Option<ConnectionId>, params: Value) {
        if let Some(origin) = origin {
            let mut paused = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
            if *paused == Some(origin) {
                *paused = None;
            }
        }
        self.sink.deliver(ClientMessage::event(methods::RESUMED, params));
    }

    pub fn passthrough(&self, message: RawMessage) {
        self.sink.deliver(ClientMessage::event(message.method, message.params));
    }

    /// Front-ends resume on their first pause and render nothing until one arrives.
    pub fn initial_pause(&self) {
        self.sink.deliver(ClientMessage::event(
            methods::PAUSED,
            json!({ "callFrames": [], "reason": "breakpoint" }),
        ));
    }
}
