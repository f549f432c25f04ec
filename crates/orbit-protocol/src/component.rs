//! Workspace components.
//!
//! A component is a single schedulable item (task, note, or timeline entry) and
//! the unit of patch mutation. Wire names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Component kind. Decides which optional fields are meaningful, never the wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Timeline,
    Task,
    Note,
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeline => write!(f, "timeline"),
            Self::Task => write!(f, "task"),
            Self::Note => write!(f, "note"),
        }
    }
}

/// Component priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A single item in the shared workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceComponent {
    /// Stable identifier, assigned by the server at creation. Never changes.
    pub id: String,

    #[serde(rename = "type")]
    pub component_type: ComponentType,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// Scheduling hint, interpreted by the UI only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Scheduling hint, interpreted by the UI only (e.g. "morning").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every successful mutation.
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceComponent {
    /// Create a component with default priority, stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        component_type: ComponentType,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            component_type,
            title: title.into(),
            description: None,
            priority: Priority::default(),
            date: None,
            time_slot: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_task(&self) -> bool {
        self.component_type == ComponentType::Task
    }

    pub fn is_note(&self) -> bool {
        self.component_type == ComponentType::Note
    }

    pub fn is_timeline(&self) -> bool {
        self.component_type == ComponentType::Timeline
    }
}

/// Partial field changes carried by an `update` patch.
///
/// Absent keys leave the target field untouched. A key sent as `null` decodes to
/// `None` and is treated exactly like an absent key. There is no
/// `id` field: identifiers are immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentChanges {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<ComponentType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ComponentChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
