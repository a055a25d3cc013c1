//! Live entity state as reported by the host

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// Current status and attributes of one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// Status value, e.g. "on", "heat", "42.5", "unavailable"
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the status value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even with an unchanged status
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// The next state of the same entity; `last_changed` only moves when
    /// the status value differs.
    pub fn successor(
        &self,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let state = state.into();
        let last_changed = if state == self.state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state,
            attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Whether commands can sensibly be sent to the entity
    pub fn is_usable(&self) -> bool {
        !self.is_unavailable() && !self.is_unknown()
    }

    /// Typed attribute lookup; `None` when missing, null, or of another type
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn light() -> EntityId {
        EntityId::new("light", "desk").unwrap()
    }

    #[test]
    fn test_successor_keeps_last_changed_for_same_status() {
        let first = State::new(light(), "on", HashMap::new(), Context::new());
        let attrs = HashMap::from([("brightness".to_string(), json!(120))]);
        let second = first.successor("on", attrs, Context::new());
        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);

        let third = second.successor("off", HashMap::new(), Context::new());
        assert!(third.last_changed >= second.last_changed);
        assert_eq!(third.state, "off");
    }

    #[test]
    fn test_usability() {
        let ctx = Context::new();
        assert!(State::new(light(), "off", HashMap::new(), ctx.clone()).is_usable());
        assert!(!State::new(light(), "unavailable", HashMap::new(), ctx.clone()).is_usable());
        assert!(!State::new(light(), "unknown", HashMap::new(), ctx).is_usable());
    }

    #[test]
    fn test_attribute_skips_null() {
        let attrs = HashMap::from([
            ("brightness".to_string(), json!(200)),
            ("effect".to_string(), serde_json::Value::Null),
        ]);
        let state = State::new(light(), "on", attrs, Context::new());
        assert_eq!(state.attribute::<u8>("brightness"), Some(200));
        assert_eq!(state.attribute::<String>("effect"), None);
        assert_eq!(state.attribute::<String>("brightness"), None);
    }
}
