//! Intent types.
//!
//! Intents describe what the user wants, as understood by the language model.
//! They are diagnostic on the client: the server resolves them against current
//! state and answers with patches. Anything that refers to an existing component
//! does so through a natural-language `target`, never an id, so a model can't
//! invent identifiers that don't exist.

use serde::{Deserialize, Serialize};

use crate::component::Priority;

/// One item of a `create_plan` intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeSlot", default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// Named destination for `move_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedPosition {
    First,
    Last,
}

/// Destination for `move_item`: `"first"`, `"last"`, or a zero-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MovePosition {
    Index(u64),
    Named(NamedPosition),
}

/// A structured description of user intent, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Create several items at once.
    CreatePlan {
        #[serde(default)]
        items: Vec<PlanItem>,
    },

    CreateTask {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        #[serde(rename = "timeSlot", default, skip_serializing_if = "Option::is_none")]
        time_slot: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
    },

    CreateNote {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    SetPriority { target: String, priority: Priority },

    /// Reorder and/or reschedule an item.
    MoveItem {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<MovePosition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        #[serde(rename = "timeSlot", default, skip_serializing_if = "Option::is_none")]
        time_slot: Option<String>,
    },

    DeleteItem { target: String },

    UpdateItem {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        #[serde(rename = "timeSlot", default, skip_serializing_if = "Option::is_none")]
        time_slot: Option<String>,
    },

    MarkComplete {
        target: String,
        #[serde(default = "default_completed")]
        completed: bool,
    },

    /// Unknown intent type (forward-compatible).
    #[serde(other)]
    Unknown,
}

fn default_completed() -> bool {
    true
}

impl Intent {
    /// Wire name of this intent.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreatePlan { .. } => "create_plan",
            Self::CreateTask { .. } => "create_task",
            Self::CreateNote { .. } => "create_note",
            Self::SetPriority { .. } => "set_priority",
            Self::MoveItem { .. } => "move_item",
            Self::DeleteItem { .. } => "delete_item",
            Self::UpdateItem { .. } => "update_item",
            Self::MarkComplete { .. } => "mark_complete",
            Self::Unknown => "unknown",
        }
    }

    /// The fuzzy reference to an existing component, if this intent has one.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::SetPriority { target, .. }
            | Self::MoveItem { target, .. }
            | Self::DeleteItem { target }
            | Self::UpdateItem { target, .. }
            | Self::MarkComplete { target, .. } => Some(target),
            Self::CreatePlan { .. }
            | Self::CreateTask { .. }
            | Self::CreateNote { .. }
            | Self::Unknown => None,
        }
    }

    /// True for intents that bring new components into existence.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            Self::CreatePlan { .. } | Self::CreateTask { .. } | Self::CreateNote { .. }
        )
    }
}
