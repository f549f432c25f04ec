//! Session controller.
//!
//! Owns the single logical connection to a workspace session. All state lives
//! in one actor task; callers talk to it over a command channel and observe it
//! through a [`SessionListener`].
//!
//! ```text
//!   SessionController ──Command──▶ worker ──spawn──▶ pump_transport (gen N)
//!                                     ▲                     │
//!                                     └──────PumpEvent──────┘
//! ```
//!
//! Every transport gets a generation number. Events tagged with a generation
//! other than the current one come from a superseded transport and are
//! discarded, so a late close or frame from an old socket can never touch the
//! session.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use orbit_protocol::{ClientMessage, ConnectionStatus, ServerMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Sleep, sleep};
use tracing::instrument;

use super::backoff::ReconnectPolicy;
use super::transport::{Connector, TransportEvent};
use crate::config::SessionConfig;
use crate::error::TransportError;

/// Receives everything the controller observes, in order, on the worker task.
pub trait SessionListener: Send + 'static {
    fn on_connection_status(&mut self, status: ConnectionStatus);

    /// A well-formed, known server message.
    fn on_server_message(&mut self, message: ServerMessage);

    /// A `sync_request` was written to the transport.
    fn on_sync_requested(&mut self) {}
}

enum Command {
    Connect,
    Send(ClientMessage),
    Shutdown,
}

enum PumpEvent {
    Opened {
        generation: u64,
        outbound: mpsc::UnboundedSender<String>,
    },
    Transport {
        generation: u64,
        event: TransportEvent,
    },
}

/// Handle to a running session worker.
///
/// Dropping the handle stops the worker: the transport is closed and any
/// pending reconnect is cancelled.
#[derive(Debug)]
pub struct SessionController {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Start the worker. Nothing connects until [`SessionController::connect`].
    pub fn spawn<L: SessionListener>(
        connector: Arc<dyn Connector>,
        endpoint: String,
        config: &SessionConfig,
        listener: L,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let worker = Worker::new(connector, endpoint, config, listener, events_tx);
        let task = tokio::spawn(worker.run(commands_rx, events_rx));

        Self {
            commands: commands_tx,
            task: Some(task),
        }
    }

    /// Open the transport. No-op while a transport is open or being opened.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Serialize and write `message` if the transport is open; otherwise the
    /// message is dropped.
    pub fn send(&self, message: ClientMessage) {
        let _ = self.commands.send(Command::Send(message));
    }

    /// Stop the worker and wait for it to finish tearing down.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Session worker ended abnormally: {:?}", e);
        }
    }
}

struct Worker<L> {
    connector: Arc<dyn Connector>,
    endpoint: String,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    listener: L,
    status: ConnectionStatus,
    generation: u64,
    active: Option<mpsc::UnboundedSender<String>>,
    pump: Option<JoinHandle<()>>,
    reconnect: Option<Pin<Box<Sleep>>>,
    attempt: u32,
    events_tx: mpsc::UnboundedSender<PumpEvent>,
}

impl<L: SessionListener> Worker<L> {
    fn new(
        connector: Arc<dyn Connector>,
        endpoint: String,
        config: &SessionConfig,
        listener: L,
        events_tx: mpsc::UnboundedSender<PumpEvent>,
    ) -> Self {
        Self {
            connector,
            endpoint,
            connect_timeout: config.connect_timeout(),
            policy: config.reconnect.clone(),
            listener,
            status: ConnectionStatus::Disconnected,
            generation: 0,
            active: None,
            pump: None,
            reconnect: None,
            attempt: 0,
            events_tx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<PumpEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => self.connect(),
                    Some(Command::Send(message)) => self.send(message),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
                () = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    debug!("Reconnect timer fired (attempt {})", self.attempt);
                    self.connect();
                }
            }
        }
        self.teardown();
    }

    fn is_open(&self) -> bool {
        self.active.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn connect(&mut self) {
        if self.is_open() {
            debug!("Session already connected");
            return;
        }
        if self.status == ConnectionStatus::Connecting {
            debug!("Session connect already in progress");
            return;
        }

        self.reconnect = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.active = None;
        self.generation += 1;
        self.set_status(ConnectionStatus::Connecting);

        self.pump = Some(tokio::spawn(pump_transport(
            Arc::clone(&self.connector),
            self.endpoint.clone(),
            self.connect_timeout,
            self.generation,
            self.events_tx.clone(),
        )));
    }

    fn send(&mut self, message: ClientMessage) {
        let Some(outbound) = self.active.as_ref().filter(|tx| !tx.is_closed()) else {
            debug!("Not connected, dropping {} message", message.kind());
            return;
        };

        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize {} message: {}", message.kind(), e);
                return;
            }
        };
        if outbound.send(frame).is_err() {
            debug!("Transport closed while sending {} message", message.kind());
            return;
        }

        if matches!(message, ClientMessage::SyncRequest) {
            self.listener.on_sync_requested();
        }
    }

    fn handle_event(&mut self, event: PumpEvent) {
        match event {
            PumpEvent::Opened {
                generation,
                outbound,
            } if generation == self.generation => {
                info!("Session connected (generation {})", generation);
                self.active = Some(outbound);
                self.attempt = 0;
                self.set_status(ConnectionStatus::Connected);
                self.send(ClientMessage::SyncRequest);
            }
            PumpEvent::Transport { generation, event } if generation == self.generation => {
                match event {
                    TransportEvent::Frame(text) => self.handle_frame(&text),
                    TransportEvent::Error(reason) => {
                        warn!("Session transport error: {}", reason);
                        self.set_status(ConnectionStatus::Error);
                    }
                    TransportEvent::Closed => {
                        info!("Session transport closed (generation {})", generation);
                        self.active = None;
                        self.pump = None;
                        self.set_status(ConnectionStatus::Disconnected);
                        self.schedule_reconnect();
                    }
                }
            }
            PumpEvent::Opened { generation, .. } | PumpEvent::Transport { generation, .. } => {
                debug!(
                    "Discarding event from superseded transport (generation {}, current {})",
                    generation, self.generation
                );
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Unknown) => debug!("Ignoring server message of unknown type"),
            Ok(message) => self.listener.on_server_message(message),
            Err(e) => debug!("Dropping malformed server frame: {}", e),
        }
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        info!("Reconnecting in {:?}", delay);
        self.reconnect = Some(Box::pin(sleep(delay)));
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.listener.on_connection_status(status);
        }
    }

    fn teardown(&mut self) {
        self.reconnect = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.active = None;
        self.set_status(ConnectionStatus::Disconnected);
        debug!("Session worker stopped");
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(deadline) => deadline.as_mut().await,
        None => pending().await,
    }
}

/// Open one transport and forward its events, tagged with `generation`.
#[instrument(skip_all, fields(generation = generation))]
async fn pump_transport(
    connector: Arc<dyn Connector>,
    endpoint: String,
    connect_timeout: Duration,
    generation: u64,
    events: mpsc::UnboundedSender<PumpEvent>,
) {
    let opened = tokio::time::timeout(connect_timeout, connector.connect(&endpoint))
        .await
        .unwrap_or(Err(TransportError::Timeout(connect_timeout)));

    let connection = match opened {
        Ok(connection) => connection,
        Err(e) => {
            warn!("Session connect failed: {}", e);
            let _ = events.send(PumpEvent::Transport {
                generation,
                event: TransportEvent::Error(e.to_string()),
            });
            let _ = events.send(PumpEvent::Transport {
                generation,
                event: TransportEvent::Closed,
            });
            return;
        }
    };

    let (outbound, mut inbound) = connection.into_parts();
    if events
        .send(PumpEvent::Opened {
            generation,
            outbound,
        })
        .is_err()
    {
        return;
    }

    while let Some(event) = inbound.recv().await {
        let closed = event == TransportEvent::Closed;
        if events
            .send(PumpEvent::Transport { generation, event })
            .is_err()
            || closed
        {
            return;
        }
    }

    let _ = events.send(PumpEvent::Transport {
        generation,
        event: TransportEvent::Closed,
    });
}
