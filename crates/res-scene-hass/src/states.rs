//! Entity state storage with domain indexing
//!
//! Every write goes through [`StateStore::set`], which fires a
//! `state_changed` notification on the bus so watchers and trackers see it.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use res_scene_core::{Context, EntityId, State, StateChangedData};
use tracing::{debug, instrument, trace};

use crate::bus::EventBus;

pub struct StateStore {
    states: DashMap<EntityId, State>,
    /// entity ids by domain name
    domain_index: DashMap<String, Vec<EntityId>>,
    bus: Arc<EventBus>,
}

impl StateStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            bus,
        }
    }

    /// Write the state of an entity and fire `state_changed`
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let state = state.into();

        let (old_state, new_state) = match self.states.entry(entity_id.clone()) {
            Entry::Occupied(mut slot) => {
                let old = slot.get().clone();
                let new = old.successor(state, attributes, context.clone());
                slot.insert(new.clone());
                (Some(old), new)
            }
            Entry::Vacant(slot) => {
                let new = State::new(entity_id.clone(), state, attributes, context.clone());
                slot.insert(new.clone());
                (None, new)
            }
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |s| s.state != new_state.state),
            "Setting entity state"
        );

        if old_state.is_none() {
            self.domain_index
                .entry(entity_id.domain().to_string())
                .or_default()
                .push(entity_id.clone());
        }

        self.bus.fire_state_changed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Status value only
    pub fn get_state(&self, entity_id: &EntityId) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.states.contains_key(entity_id)
    }

    pub fn entity_ids(&self, domain: &str) -> Vec<EntityId> {
        self.domain_index
            .get(domain)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity; fires `state_changed` with no new state
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let (_, old) = self.states.remove(entity_id)?;
        trace!("Removing entity state");

        if let Some(mut ids) = self.domain_index.get_mut(entity_id.domain()) {
            ids.retain(|id| id != entity_id);
        }

        self.bus.fire_state_changed(
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(old.clone()),
                new_state: None,
            },
            context,
        );
        Some(old)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

pub type SharedStateStore = Arc<StateStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (Arc<EventBus>, StateStore) {
        let bus = Arc::new(EventBus::new());
        (bus.clone(), StateStore::new(bus))
    }

    #[test]
    fn test_set_get_and_domain_index() {
        let (_, states) = store();
        let desk: EntityId = "light.desk".parse().unwrap();
        let attrs = HashMap::from([("brightness".to_string(), json!(80))]);

        states.set(desk.clone(), "on", attrs, Context::new());
        states.set("switch.fan".parse().unwrap(), "off", HashMap::new(), Context::new());
        states.set(desk.clone(), "off", HashMap::new(), Context::new());

        assert_eq!(states.get_state(&desk).as_deref(), Some("off"));
        assert_eq!(states.entity_ids("light"), vec![desk.clone()]);
        assert_eq!(states.len(), 2);
        assert!(states.get(&desk).unwrap().attributes.is_empty());
    }

    #[tokio::test]
    async fn test_set_notifies_trackers_with_old_and_new() {
        let (bus, states) = store();
        let desk: EntityId = "light.desk".parse().unwrap();
        states.set(desk.clone(), "off", HashMap::new(), Context::new());

        let (_, mut rx) = bus.track_state_changes([desk.clone()]);
        states.set(desk.clone(), "on", HashMap::new(), Context::new());

        let change = rx.recv().await.unwrap();
        assert_eq!(change.old_value(), Some("off"));
        assert_eq!(change.new_value(), Some("on"));
    }

    #[tokio::test]
    async fn test_remove() {
        let (bus, states) = store();
        let desk: EntityId = "light.desk".parse().unwrap();
        states.set(desk.clone(), "on", HashMap::new(), Context::new());
        let (_, mut rx) = bus.track_state_changes([desk.clone()]);

        assert!(states.remove(&desk, Context::new()).is_some());
        assert!(states.remove(&desk, Context::new()).is_none());
        assert!(states.entity_ids("light").is_empty());

        let change = rx.recv().await.unwrap();
        assert!(change.new_state.is_none());
    }
}
