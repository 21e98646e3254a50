//! The live connection set and the attach protocol (handshake, then breakpoint replay).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};

use crate::backend::{BackendConnection, BackendReply, ConnectionId, Connector, DeviceInfo, EventSender};
use crate::breakpoints::{self, BreakpointRegistry};
use crate::dispose::Disposer;
use crate::paths::PathTranslator;
use crate::prelude::PreludeCommand;
use crate::types::{methods, SetBreakpointParams};
use crate::{MuxError, Result};

pub struct ConnectionManager {
    members: RwLock<Vec<Arc<dyn BackendConnection>>>,
    next_id: AtomicU64,
    connector: Arc<dyn Connector>,
    prelude: Vec<PreludeCommand>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, prelude: Vec<PreludeCommand>) -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            connector,
            prelude,
        }
    }

    /// Current members in attach order.
    pub async fn members(&self) -> Vec<Arc<dyn BackendConnection>> {
        self.members.read().await.clone()
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.members.read().await.iter().map(|member| member.id()).collect()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Connects, joins the set, runs the prelude, then replays the registry. The handle is a
    /// member from the moment it connects, even if the handshake later fails.
    pub async fn add(
        &self,
        device: &DeviceInfo,
        events: EventSender,
        registry: &Mutex<BreakpointRegistry>,
        translator: &dyn PathTranslator,
        disposer: &Disposer,
    ) -> Result<ConnectionId> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let connection = self.connector.connect(id, device, events).await?;

        self.members.write().await.push(connection.clone());
        let closing = connection.clone();
        disposer.register(move || closing.close());
        tracing::info!("Attached backend {}: device={}", id, device.id);

        handshake(connection.as_ref(), &self.prelude).await?;

        let entries = registry.lock().await.snapshot();
        let replayed = replay_breakpoints(connection.as_ref(), &entries, translator).await;
        tracing::info!(
            "Backend {} ready: replayed {}/{} breakpoints",
            id,
            replayed,
            entries.len()
        );

        Ok(id)
    }
}

/// Sends the prelude to one connection, concurrently, and requires every reply to succeed.
pub async fn handshake(connection: &dyn BackendConnection, prelude: &[PreludeCommand]) -> Result<()> {
    let sends = prelude
        .iter()
        .map(|command| connection.send_command(&command.method, command.params.clone()));
    let results = join_all(sends).await;

    let rejected = prelude
        .iter()
        .zip(&results)
        .find(|(_, result)| !matches!(result, Ok(reply) if reply.is_success()))
        .map(|(command, _)| command.method.clone());

    let Some(rejected) = rejected else {
        return Ok(());
    };

    let responses: Vec<Value> = prelude
        .iter()
        .zip(&results)
        .map(|(command, result)| describe(&command.method, result))
        .collect();
    let logged = Value::Array(responses.clone());
    tracing::error!(
        "Handshake with backend {} ({}) failed at {}: {}",
        connection.id(),
        connection.device(),
        rejected,
        logged
    );

    Err(MuxError::handshake_with_responses(
        connection.device(),
        format!("{rejected} was rejected"),
        responses,
    ))
}

fn describe(method: &str, result: &Result<BackendReply>) -> Value {
    match result {
        Ok(reply) => json!({
            "method": method,
            "result": reply.result,
            "error": reply.error,
        }),
        Err(e) => json!({
            "method": method,
            "error": { "message": e.to_string() },
        }),
    }
}

/// Re-creates registered breakpoints on one connection. Replies are awaited but discarded;
/// the registry only ever tracks client-issued breakpoints. Returns how many were accepted.
pub async fn replay_breakpoints(
    connection: &dyn BackendConnection,
    entries: &[(String, SetBreakpointParams)],
    translator: &dyn PathTranslator,
) -> usize {
    let sends = entries.iter().filter_map(|(breakpoint_id, params)| {
        match breakpoints::to_backend_params(params, translator) {
            Ok(backend_params) => {
                Some(connection.send_command(methods::SET_BREAKPOINT_BY_URL, backend_params))
            }
            Err(e) => {
                tracing::warn!("Skipping replay of breakpoint {}: {}", breakpoint_id, e);
                None
            }
        }
    });

    join_all(sends)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(reply) if reply.is_success()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::default_prelude;
    use crate::testing::{breakpoint_params, device, FakeBackend, FakeConnector, PrefixTranslator};
    use tokio::sync::mpsc;

    struct Harness {
        manager: ConnectionManager,
        connector: Arc<FakeConnector>,
        registry: Mutex<BreakpointRegistry>,
        disposer: Disposer,
        events: EventSender,
    }

    impl Harness {
        fn new() -> Self {
            let connector = FakeConnector::new();
            let (events, _rx) = mpsc::unbounded_channel();
            Self {
                manager: ConnectionManager::new(connector.clone(), default_prelude()),
                connector,
                registry: Mutex::new(BreakpointRegistry::new()),
                disposer: Disposer::new(),
                events,
            }
        }

        async fn add(&self, device_id: &str) -> Result<ConnectionId> {
            self.manager
                .add(
                    &device(device_id),
                    self.events.clone(),
                    &self.registry,
                    &PrefixTranslator,
                    &self.disposer,
                )
                .await
        }
    }

    #[tokio::test]
    async fn test_add_assigns_ids_in_attach_order() {
        let harness = Harness::new();
        harness.connector.register("a");
        harness.connector.register("b");

        assert_eq!(harness.add("a").await.unwrap(), ConnectionId(1));
        assert_eq!(harness.add("b").await.unwrap(), ConnectionId(2));
        assert_eq!(harness.manager.ids().await, vec![ConnectionId(1), ConnectionId(2)]);
    }

    #[tokio::test]
    async fn test_prelude_is_sent_before_anything_else() {
        let harness = Harness::new();
        let backend = harness.connector.register("a");
        harness.add("a").await.unwrap();

        assert_eq!(backend.sent_methods(), vec!["Runtime.enable", "Debugger.enable"]);
    }

    #[tokio::test]
    async fn test_registry_is_replayed_after_prelude() {
        let harness = Harness::new();
        let mut original = breakpoint_params("/src/a.js", 12);
        original.condition = Some("n > 2".to_string());
        harness.registry.lock().await.insert("1:12:0", original);

        let backend = harness.connector.register("late");
        harness.add("late").await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[2],
            (
                "Debugger.setBreakpointByUrl".to_string(),
                json!({"lineNumber": 12, "url": "app:///src/a.js", "condition": "n > 2"})
            )
        );
        // Replay replies never feed back into the registry.
        let registry = harness.registry.lock().await;
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("1:12:0").unwrap().url.as_deref(), Some("/src/a.js"));
    }

    #[tokio::test]
    async fn test_replay_skips_untranslatable_paths() {
        let backend = FakeBackend::new(1);
        let entries = vec![
            ("bad".to_string(), breakpoint_params("relative.js", 1)),
            ("good".to_string(), breakpoint_params("/abs.js", 2)),
        ];
        let replayed = replay_breakpoints(backend.as_ref(), &entries, &PrefixTranslator).await;

        assert_eq!(replayed, 1);
        assert_eq!(backend.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_handshake_failure_keeps_member_and_skips_replay() {
        let harness = Harness::new();
        harness
            .registry
            .lock()
            .await
            .insert("1:3:0", breakpoint_params("/src/a.js", 3));
        let backend = harness.connector.register("broken");
        backend.reply_with("Debugger.enable", BackendReply::failure("Debugger agent disabled"));

        let err = harness.add("broken").await.unwrap_err();
        match err {
            MuxError::Handshake {
                device,
                message,
                responses,
            } => {
                assert_eq!(device, "broken");
                assert_eq!(message, "Debugger.enable was rejected");
                assert_eq!(responses.len(), 2);
                assert_eq!(responses[1]["error"]["message"], "Debugger agent disabled");
            }
            other => panic!("Expected Handshake, got {other:?}"),
        }

        assert_eq!(harness.manager.len().await, 1);
        assert_eq!(backend.sent_methods(), vec!["Runtime.enable", "Debugger.enable"]);
    }

    #[tokio::test]
    async fn test_handshake_rejects_reply_without_result() {
        let backend = FakeBackend::new(1);
        backend.reply_with("Runtime.enable", BackendReply::default());
        let err = handshake(backend.as_ref(), &default_prelude()).await.unwrap_err();
        assert!(matches!(err, MuxError::Handshake { .. }));
    }

    #[tokio::test]
    async fn test_handshake_rejects_transport_failure() {
        let backend = FakeBackend::new(1);
        backend.fail_transport("Runtime.enable");
        let err = handshake(backend.as_ref(), &default_prelude()).await.unwrap_err();
        match err {
            MuxError::Handshake { responses, .. } => {
                assert!(responses[0]["error"]["message"].as_str().unwrap().contains("closed"));
            }
            other => panic!("Expected Handshake, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connector_failure_adds_nothing() {
        let harness = Harness::new();
        let err = harness.add("missing").await.unwrap_err();
        assert!(matches!(err, MuxError::UnknownDevice(_)));
        assert!(harness.manager.is_empty().await);
    }

    #[tokio::test]
    async fn test_disposer_closes_attached_backends() {
        let harness = Harness::new();
        let backend = harness.connector.register("a");
        harness.add("a").await.unwrap();

        assert!(!backend.is_closed());
        harness.disposer.dispose();
        assert!(backend.is_closed());
    }
}
