//! WebSocket message types for workspace sessions.
//!
//! Every frame is a UTF-8 JSON text message discriminated by a `type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intents::Intent;
use crate::lenient;
use crate::patch::PatchOperation;
use crate::status::ServerStatus;

// ============================================================================
// Client -> Server
// ============================================================================

/// Where an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtteranceSource {
    Voice,
    Text,
    /// A suggestion chip tapped in the UI.
    Chip,
}

/// Messages sent from a client to the session server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Raw user text, forwarded verbatim for intent extraction.
    Utterance {
        text: String,
        source: UtteranceSource,
        timestamp: DateTime<Utc>,
    },

    /// Structured command that bypasses language understanding
    /// (e.g. toggling completion from a checkbox).
    Action {
        action: String,
        #[serde(rename = "componentId")]
        component_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// Ask the server for the authoritative full workspace state.
    SyncRequest,
}

impl ClientMessage {
    /// Build an utterance stamped with the current time.
    pub fn utterance(text: impl Into<String>, source: UtteranceSource) -> Self {
        Self::Utterance {
            text: text.into(),
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn action(
        action: impl Into<String>,
        component_id: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self::Action {
            action: action.into(),
            component_id: component_id.into(),
            payload,
        }
    }

    /// Wire name of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Utterance { .. } => "utterance",
            Self::Action { .. } => "action",
            Self::SyncRequest => "sync_request",
        }
    }
}

// ============================================================================
// Server -> Client
// ============================================================================

/// Messages pushed by the session server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Server processing phase changed.
    Status {
        status: ServerStatus,
        /// Human-readable detail, e.g. "Processing your input...".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// What the language model understood. Informational only.
    IntentParsed {
        #[serde(default, deserialize_with = "lenient::vec")]
        intents: Vec<Intent>,
    },

    /// Ordered batch of mutations to apply.
    Patch {
        #[serde(default, deserialize_with = "lenient::vec")]
        operations: Vec<PatchOperation>,
    },

    /// Unknown message type (forward-compatible).
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parse a text frame.
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// True for the only message kind that changes the component collection.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Patch { .. })
    }
}
