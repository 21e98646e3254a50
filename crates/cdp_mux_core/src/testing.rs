//! Fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::backend::{BackendConnection, BackendReply, ConnectionId, Connector, DeviceInfo, EventSender};
use crate::paths::PathTranslator;
use crate::prelude::default_prelude;
use crate::sink::ClientSink;
use crate::types::{ClientMessage, SetBreakpointParams};
use crate::{MuxError, Result, Router};

#[derive(Default)]
pub(crate) struct RecordingSink {
    messages: Mutex<Vec<ClientMessage>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<ClientMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<ClientMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

impl ClientSink for RecordingSink {
    fn deliver(&self, message: ClientMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// Scripted backend: replies `{}` unless told otherwise, records every command. A held method
/// is recorded on arrival but not answered until its gate opens.
pub(crate) struct FakeBackend {
    id: AtomicU64,
    device: String,
    replies: Mutex<HashMap<String, BackendReply>>,
    transport_failures: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, watch::Receiver<bool>>>,
    sent: Mutex<Vec<(String, Value)>>,
    closed: AtomicBool,
}

impl FakeBackend {
    pub fn new(id: u64) -> Arc<Self> {
        Self::for_device(id, format!("device-{id}"))
    }

    fn for_device(id: u64, device: String) -> Arc<Self> {
        Arc::new(Self {
            id: AtomicU64::new(id),
            device,
            replies: Mutex::new(HashMap::new()),
            transport_failures: Mutex::new(HashSet::new()),
            gates: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn reply_with(&self, method: &str, reply: BackendReply) {
        self.replies.lock().unwrap().insert(method.to_string(), reply);
    }

    pub fn fail_transport(&self, method: &str) {
        self.transport_failures.lock().unwrap().insert(method.to_string());
    }

    /// Holds replies to `method` until `true` is sent on the returned gate.
    pub fn hold(&self, method: &str) -> watch::Sender<bool> {
        let (gate, held) = watch::channel(false);
        self.gates.lock().unwrap().insert(method.to_string(), held);
        gate
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.sent().into_iter().map(|(method, _)| method).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnection for FakeBackend {
    fn id(&self) -> ConnectionId {
        ConnectionId(self.id.load(Ordering::SeqCst))
    }

    fn device(&self) -> &str {
        &self.device
    }

    async fn send_command(&self, method: &str, params: Value) -> Result<BackendReply> {
        self.sent.lock().unwrap().push((method.to_string(), params));
        let gate = self.gates.lock().unwrap().get(method).cloned();
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }
        if self.transport_failures.lock().unwrap().contains(method) {
            return Err(MuxError::ConnectionClosed(self.id()));
        }
        Ok(self
            .replies
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| BackendReply::success(json!({}))))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out pre-registered fake backends by device id.
#[derive(Default)]
pub(crate) struct FakeConnector {
    backends: Mutex<HashMap<String, Arc<FakeBackend>>>,
    events: Mutex<HashMap<String, EventSender>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, device_id: &str) -> Arc<FakeBackend> {
        let backend = FakeBackend::for_device(0, device_id.to_string());
        self.backends
            .lock()
            .unwrap()
            .insert(device_id.to_string(), backend.clone());
        backend
    }

    pub fn events_for(&self, device_id: &str) -> Option<EventSender> {
        self.events.lock().unwrap().get(device_id).cloned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        id: ConnectionId,
        device: &DeviceInfo,
        events: EventSender,
    ) -> Result<Arc<dyn BackendConnection>> {
        let backend = self
            .backends
            .lock()
            .unwrap()
            .get(&device.id)
            .cloned()
            .ok_or_else(|| MuxError::UnknownDevice(device.id.clone()))?;
        backend.id.store(id.0, Ordering::SeqCst);
        self.events.lock().unwrap().insert(device.id.clone(), events);
        Ok(backend)
    }
}

/// `/path` <-> `app:///path`.
pub(crate) struct PrefixTranslator;

impl PathTranslator for PrefixTranslator {
    fn path_to_backend_url(&self, path: &str) -> Result<String> {
        if !path.starts_with('/') {
            return Err(MuxError::InvalidPath(path.to_string()));
        }
        Ok(format!("app://{path}"))
    }

    fn script_parsed_to_client(&self, mut params: Value) -> Value {
        let path = params
            .get("url")
            .and_then(Value::as_str)
            .and_then(|url| url.strip_prefix("app://"))
            .map(str::to_string);
        if let Some(path) = path {
            params["url"] = Value::String(path);
        }
        params
    }
}

pub(crate) fn breakpoint_params(path: &str, line: u64) -> SetBreakpointParams {
    serde_json::from_value(json!({"lineNumber": line, "url": path})).unwrap()
}

pub(crate) fn device(id: &str) -> DeviceInfo {
    DeviceInfo::new(id, format!("ws://fake/{id}"))
}

pub(crate) fn test_router() -> (Router, Arc<RecordingSink>, Arc<FakeConnector>) {
    let sink = RecordingSink::new();
    let connector = FakeConnector::new();
    let router = Router::new(
        sink.clone(),
        connector.clone(),
        Arc::new(PrefixTranslator),
        default_prelude(),
    );
    (router, sink, connector)
}
