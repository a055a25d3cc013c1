//! Events carried by the host bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{topics, Context, EntityId, State};

/// An event as fired on the bus: a type string plus a JSON payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub data: serde_json::Value,
    pub time_fired: DateTime<Utc>,
    pub context: Context,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
            context,
        }
    }
}

/// Payload of a `state_changed` event
///
/// `old_state` is `None` for a newly added entity and `new_state` is
/// `None` when the entity was removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangedData {
    pub entity_id: EntityId,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
}

impl StateChangedData {
    pub fn old_value(&self) -> Option<&str> {
        self.old_state.as_ref().map(|s| s.state.as_str())
    }

    pub fn new_value(&self) -> Option<&str> {
        self.new_state.as_ref().map(|s| s.state.as_str())
    }
}

/// Scene lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "scene_id", rename_all = "snake_case")]
pub enum SceneEvent {
    Added(String),
    Removed(String),
}

impl SceneEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Added(_) => topics::SCENE_ADDED,
            Self::Removed(_) => topics::SCENE_REMOVED,
        }
    }

    pub fn scene_id(&self) -> &str {
        match self {
            Self::Added(id) | Self::Removed(id) => id,
        }
    }

    /// Bus payload for this notification
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "scene_id": self.scene_id() })
    }

    /// Inverse of [`SceneEvent::topic`] + [`SceneEvent::payload`]
    pub fn from_event(event: &Event) -> Option<Self> {
        let scene_id = event.data.get("scene_id")?.as_str()?.to_string();
        match event.event_type.as_str() {
            topics::SCENE_ADDED => Some(Self::Added(scene_id)),
            topics::SCENE_REMOVED => Some(Self::Removed(scene_id)),
            _ => None,
        }
    }
}
