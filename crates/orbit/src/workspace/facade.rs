//! Public workspace API.

use std::sync::Arc;

use orbit_protocol::{
    ClientMessage, ConnectionStatus, Intent, ServerStatus, UtteranceSource, WorkspaceComponent,
};
use serde_json::Value;
use tokio::sync::watch;

use super::patch_log::PatchLog;
use super::store::{WorkspaceStore, WorkspaceViews};
use crate::config::{ServerConfig, SessionConfig};
use crate::error::ClientResult;
use crate::session::{Connector, SessionController, WsConnector};

/// A client's view of one workspace session.
///
/// Commands are fire-and-forget: they are handed to the session worker and
/// return immediately. State is only ever changed by server patches; read it
/// with the accessors or watch it through the `subscribe_*` receivers.
///
/// Must be created inside a Tokio runtime. Dropping the workspace stops the
/// session worker.
#[derive(Debug)]
pub struct Workspace {
    controller: SessionController,
    views: WorkspaceViews,
}

impl Workspace {
    /// Workspace over a WebSocket connection to the configured server.
    pub fn new(server: &ServerConfig, session: &SessionConfig) -> ClientResult<Self> {
        let endpoint = server.session_endpoint(&session.id)?;
        Ok(Self::with_connector(Arc::new(WsConnector), endpoint, session))
    }

    pub fn with_connector(
        connector: Arc<dyn Connector>,
        endpoint: impl Into<String>,
        session: &SessionConfig,
    ) -> Self {
        let (store, views) = WorkspaceStore::new(session.patch_log_capacity);
        let controller = SessionController::spawn(connector, endpoint.into(), session, store);
        Self { controller, views }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Open the session. Reconnects happen automatically after that.
    pub fn connect(&self) {
        self.controller.connect();
    }

    pub fn send_utterance(&self, text: impl Into<String>, source: UtteranceSource) {
        self.controller.send(ClientMessage::utterance(text, source));
    }

    /// Structured command that bypasses intent extraction.
    pub fn send_action(
        &self,
        action: impl Into<String>,
        component_id: impl Into<String>,
        payload: Option<Value>,
    ) {
        self.controller
            .send(ClientMessage::action(action, component_id, payload));
    }

    /// Ask the server for a full snapshot; the answer replaces local state.
    pub fn request_sync(&self) {
        self.controller.send(ClientMessage::SyncRequest);
    }

    /// Stop the session worker and wait until the transport is closed.
    pub async fn shutdown(self) {
        self.controller.shutdown().await;
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn components(&self) -> Vec<WorkspaceComponent> {
        self.views.components.borrow().clone()
    }

    pub fn component(&self, id: &str) -> Option<WorkspaceComponent> {
        self.views
            .components
            .borrow()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.views.connection.borrow()
    }

    pub fn server_status(&self) -> ServerStatus {
        *self.views.server_status.borrow()
    }

    pub fn status_message(&self) -> Option<String> {
        self.views.status_message.borrow().clone()
    }

    /// Intents from the most recent `intent_parsed` message.
    pub fn last_intents(&self) -> Vec<Intent> {
        self.views.intents.borrow().clone()
    }

    pub fn patch_log(&self) -> PatchLog {
        self.views.patch_log.borrow().clone()
    }

    pub fn subscribe_components(&self) -> watch::Receiver<Vec<WorkspaceComponent>> {
        self.views.components.clone()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.views.connection.clone()
    }

    pub fn subscribe_server_status(&self) -> watch::Receiver<ServerStatus> {
        self.views.server_status.clone()
    }

    pub fn subscribe_intents(&self) -> watch::Receiver<Vec<Intent>> {
        self.views.intents.clone()
    }

    pub fn subscribe_patch_log(&self) -> watch::Receiver<PatchLog> {
        self.views.patch_log.clone()
    }
}
