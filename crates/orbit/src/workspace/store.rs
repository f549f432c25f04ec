//! Reactive workspace state, fed by the session controller.

use chrono::{DateTime, Utc};
use log::debug;
use orbit_protocol::{
    ConnectionStatus, Intent, PatchOperation, ServerMessage, ServerStatus, WorkspaceComponent,
};
use tokio::sync::watch;

use super::patch_log::PatchLog;
use crate::patch::{apply_patches, replace_all};
use crate::session::SessionListener;

/// Write side of the workspace state. Lives on the controller task.
pub(crate) struct WorkspaceStore {
    components: watch::Sender<Vec<WorkspaceComponent>>,
    connection: watch::Sender<ConnectionStatus>,
    server_status: watch::Sender<ServerStatus>,
    status_message: watch::Sender<Option<String>>,
    intents: watch::Sender<Vec<Intent>>,
    patch_log: watch::Sender<PatchLog>,
    /// Set when a sync_request went out; the next patch replaces the collection.
    resync_pending: bool,
}

/// Read side handed to the facade.
#[derive(Debug, Clone)]
pub(crate) struct WorkspaceViews {
    pub components: watch::Receiver<Vec<WorkspaceComponent>>,
    pub connection: watch::Receiver<ConnectionStatus>,
    pub server_status: watch::Receiver<ServerStatus>,
    pub status_message: watch::Receiver<Option<String>>,
    pub intents: watch::Receiver<Vec<Intent>>,
    pub patch_log: watch::Receiver<PatchLog>,
}

impl WorkspaceStore {
    pub fn new(patch_log_capacity: usize) -> (Self, WorkspaceViews) {
        let (components, components_rx) = watch::channel(Vec::new());
        let (connection, connection_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (server_status, server_status_rx) = watch::channel(ServerStatus::default());
        let (status_message, status_message_rx) = watch::channel(None);
        let (intents, intents_rx) = watch::channel(Vec::new());
        let (patch_log, patch_log_rx) = watch::channel(PatchLog::with_capacity(patch_log_capacity));

        let store = Self {
            components,
            connection,
            server_status,
            status_message,
            intents,
            patch_log,
            resync_pending: false,
        };
        let views = WorkspaceViews {
            components: components_rx,
            connection: connection_rx,
            server_status: server_status_rx,
            status_message: status_message_rx,
            intents: intents_rx,
            patch_log: patch_log_rx,
        };
        (store, views)
    }

    fn apply_patch(&mut self, operations: Vec<PatchOperation>, applied_at: DateTime<Utc>) {
        let resync = std::mem::take(&mut self.resync_pending);
        let next = if resync {
            replace_all(&operations)
        } else {
            apply_patches(&self.components.borrow(), &operations)
        };
        debug!(
            "Applied {} patch operation(s){}, {} component(s)",
            operations.len(),
            if resync { " as resync" } else { "" },
            next.len()
        );

        self.components.send_replace(next);
        self.patch_log.send_modify(|log| {
            log.record(applied_at, resync, operations);
        });
    }
}

impl SessionListener for WorkspaceStore {
    fn on_connection_status(&mut self, status: ConnectionStatus) {
        self.connection.send_replace(status);
    }

    fn on_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Status { status, message } => {
                self.server_status.send_replace(status);
                self.status_message.send_replace(message);
            }
            ServerMessage::IntentParsed { intents } => {
                self.intents.send_replace(intents);
            }
            ServerMessage::Patch { operations } => self.apply_patch(operations, Utc::now()),
            ServerMessage::Unknown => {}
        }
    }

    fn on_sync_requested(&mut self) {
        self.resync_pending = true;
    }
}
