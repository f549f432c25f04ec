//! Test utilities: an in-memory connector and patch builders.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use orbit::TransportError;
use orbit::Workspace;
use orbit::config::SessionConfig;
use orbit::session::{Connection, Connector, TransportEvent};
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub const ENDPOINT: &str = "ws://mock/ws/session/test";

/// The server's half of one in-memory connection.
pub struct ServerEnd {
    /// Frames written by the client.
    pub frames: mpsc::UnboundedReceiver<String>,
    /// Events delivered to the client.
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Frame(frame.into()));
    }

    pub fn push_json(&self, value: Value) {
        self.push(value.to_string());
    }

    pub fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Next client frame, parsed.
    pub async fn next_frame(&mut self) -> Value {
        let frame = self.frames.recv().await.expect("client hung up");
        serde_json::from_str(&frame).expect("client sent invalid JSON")
    }

    /// Client frame already queued, if any.
    pub fn try_next_frame(&mut self) -> Option<Value> {
        self.frames
            .try_recv()
            .ok()
            .map(|frame| serde_json::from_str(&frame).expect("client sent invalid JSON"))
    }
}

/// Connector handing each accepted connection's server half to the test.
pub struct MockConnector {
    attempts: AtomicUsize,
    refusals: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            refusals: AtomicUsize::new(0),
            accepted,
        });
        (connector, rx)
    }

    /// Number of connect attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Refused("mock refused".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let _ = self.accepted.send(ServerEnd {
            frames: outbound_rx,
            events: inbound_tx,
        });
        Ok(Connection::new(outbound_tx, inbound_rx))
    }
}

/// Connector whose handshake never completes.
#[derive(Default)]
pub struct StalledConnector {
    attempts: AtomicUsize,
}

impl StalledConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for StalledConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn workspace(connector: &Arc<MockConnector>) -> Workspace {
    Workspace::with_connector(connector.clone(), ENDPOINT, &SessionConfig::default())
}

/// Connect and consume the connect-time sync request.
pub async fn connect(
    workspace: &Workspace,
    accepted: &mut mpsc::UnboundedReceiver<ServerEnd>,
) -> ServerEnd {
    workspace.connect();
    let mut server = accepted.recv().await.expect("no connection accepted");
    assert_eq!(server.next_frame().await, json!({ "type": "sync_request" }));
    server
}

pub fn task(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "type": "task",
        "title": title,
        "description": "",
        "priority": "normal",
        "date": null,
        "timeSlot": null,
        "completed": false,
        "createdAt": "2026-02-14T09:00:00Z",
        "updatedAt": "2026-02-14T09:00:00Z",
    })
}

pub fn add(id: &str, title: &str) -> Value {
    json!({ "op": "add", "component": task(id, title) })
}

pub fn patch(operations: Vec<Value>) -> Value {
    json!({ "type": "patch", "operations": operations })
}

pub fn ids(workspace: &Workspace) -> Vec<String> {
    workspace.components().into_iter().map(|c| c.id).collect()
}

/// Wait until `seq` patch batches have been applied.
pub async fn patches_applied(workspace: &Workspace, seq: u64) {
    workspace
        .subscribe_patch_log()
        .wait_for(|log| log.last_seq() >= seq)
        .await
        .expect("session worker stopped");
}
