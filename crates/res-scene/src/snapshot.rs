//! Persisted scene documents
//!
//! A scene maps entity ids to the status and attributes captured for them,
//! plus an optional options overlay under the reserved `_options` key:
//!
//! ```json
//! {
//!   "light.sofa": {"state": "on", "attributes": {"brightness": 120}},
//!   "_options": {"restore_light_attributes": true}
//! }
//! ```

use indexmap::IndexMap;
use res_scene_core::{EntityId, State, STATE_UNAVAILABLE, STATE_UNKNOWN};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::options::OptionsOverlay;

/// Reserved key holding a scene's options overlay
pub const OPTIONS_KEY: &str = "_options";

/// Every scene, keyed by scene id, in creation order
pub type SceneMap = IndexMap<String, SceneData>;

/// Status and attributes recorded for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(rename = "state", alias = "status", default)]
    pub status: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntitySnapshot {
    pub fn new(status: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            status: status.into(),
            attributes,
        }
    }

    pub fn from_state(state: &State) -> Self {
        Self::with_status(state, state.state.clone())
    }

    /// Attributes of `state` recorded under another status
    pub fn with_status(state: &State, status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            attributes: state
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// An attribute value; null counts as absent
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// Non-null attributes
    pub fn present_attributes(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter().filter(|(_, v)| !v.is_null())
    }

    /// Whether the saved status can stand in for a missing capture
    pub fn is_valid_fallback(&self) -> bool {
        !self.status.is_empty() && self.status != STATE_UNAVAILABLE && self.status != STATE_UNKNOWN
    }
}

/// One stored scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    #[serde(flatten)]
    pub entities: IndexMap<EntityId, EntitySnapshot>,

    /// Kept raw so a malformed overlay never prevents loading the scene
    #[serde(rename = "_options", default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl SceneData {
    pub fn new(entities: IndexMap<EntityId, EntitySnapshot>) -> Self {
        Self {
            entities,
            options: None,
        }
    }

    pub fn with_overlay(mut self, overlay: Option<&OptionsOverlay>) -> Self {
        self.options = overlay.and_then(|o| serde_json::to_value(o).ok());
        self
    }

    /// The stored overlay, or `None` when absent or malformed
    pub fn overlay(&self, scene_id: &str) -> Option<OptionsOverlay> {
        let raw = self.options.as_ref().filter(|v| !v.is_null())?;
        match serde_json::from_value(raw.clone()) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                warn!(scene_id, options = %raw, "Ignoring invalid _options: {}", e);
                None
            }
        }
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&EntitySnapshot> {
        self.entities.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_layout() {
        let raw = r#"{
            "light.sofa": {"state": "on", "attributes": {"brightness": 120, "effect": null}},
            "cover.blind": {"status": "open", "attributes": {}},
            "_options": {"action_timeout": 3.0}
        }"#;
        let scene: SceneData = serde_json::from_str(raw).unwrap();

        let ids: Vec<String> = scene.entities.keys().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["light.sofa", "cover.blind"]);

        let sofa = scene.get(&"light.sofa".parse().unwrap()).unwrap();
        assert_eq!(sofa.status, "on");
        assert!(sofa.attribute("effect").is_none());
        assert_eq!(sofa.present_attributes().count(), 1);

        let overlay = scene.overlay("evening").unwrap();
        assert_eq!(overlay.action_timeout, Some(3.0));

        let written = serde_json::to_value(&scene).unwrap();
        assert_eq!(written["cover.blind"]["state"], "open");
        assert_eq!(written["_options"]["action_timeout"], 3.0);
    }

    #[test]
    fn test_malformed_options_are_ignored() {
        let raw = json!({"switch.fan": {"state": "on"}, "_options": ["not", "a", "map"]});
        let scene: SceneData = serde_json::from_value(raw).unwrap();
        assert_eq!(scene.len(), 1);
        assert!(scene.overlay("broken").is_none());
    }

    #[test]
    fn test_valid_fallback() {
        assert!(EntitySnapshot::new("off", Map::new()).is_valid_fallback());
        assert!(!EntitySnapshot::new("unavailable", Map::new()).is_valid_fallback());
        assert!(!EntitySnapshot::new("unknown", Map::new()).is_valid_fallback());
        assert!(!EntitySnapshot::default().is_valid_fallback());
    }
}
