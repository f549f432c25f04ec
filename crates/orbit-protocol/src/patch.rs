//! Patch operations: the only channel that mutates workspace state.

use serde::{Deserialize, Serialize};

use crate::component::{ComponentChanges, WorkspaceComponent};

/// A primitive mutation against the ordered component collection, tagged by `op`.
///
/// Indices are signed on the wire so that a negative or oversized value still
/// decodes; the patch engine decides how out-of-range positions behave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOperation {
    /// Insert a component, replacing any existing entry with the same id.
    Add {
        component: WorkspaceComponent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<i64>,
    },

    Remove {
        #[serde(rename = "componentId")]
        component_id: String,
    },

    /// Shallow-merge `changes` into the component.
    Update {
        #[serde(rename = "componentId")]
        component_id: String,
        #[serde(default)]
        changes: ComponentChanges,
    },

    /// Move a component to a new position.
    Reorder {
        #[serde(rename = "componentId")]
        component_id: String,
        #[serde(rename = "newIndex")]
        new_index: i64,
    },

    /// Unknown operation (forward-compatible).
    #[serde(other)]
    Unknown,
}

impl PatchOperation {
    /// Wire name of this operation.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Update { .. } => "update",
            Self::Reorder { .. } => "reorder",
            Self::Unknown => "unknown",
        }
    }

    /// Id of the component this operation touches.
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Self::Add { component, .. } => Some(&component.id),
            Self::Remove { component_id }
            | Self::Update { component_id, .. }
            | Self::Reorder { component_id, .. } => Some(component_id),
            Self::Unknown => None,
        }
    }
}
