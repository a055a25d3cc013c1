//! Dispatcher that records commands and can fail or drop them per entity
//! or per service

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use res_scene::{CommandDispatcher, DispatchError};
use res_scene_core::{Command, EntityId};

pub struct RecordingDispatcher {
    inner: Arc<dyn CommandDispatcher>,
    issued: Mutex<Vec<Command>>,
    failing: Mutex<HashSet<EntityId>>,
    unresponsive: Mutex<HashSet<EntityId>>,
    dropped_services: Mutex<HashSet<(EntityId, String)>>,
}

impl RecordingDispatcher {
    pub fn new(inner: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            inner,
            issued: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            unresponsive: Mutex::new(HashSet::new()),
            dropped_services: Mutex::new(HashSet::new()),
        }
    }

    /// Refuse every command aimed at `entity_id`
    pub fn fail_for(&self, entity_id: EntityId) {
        self.failing.lock().unwrap().insert(entity_id);
    }

    /// Accept commands for `entity_id` but never deliver them
    pub fn ignore_for(&self, entity_id: EntityId) {
        self.unresponsive.lock().unwrap().insert(entity_id);
    }

    /// Accept `service` (`domain.service`) for `entity_id` but never
    /// deliver it
    pub fn ignore_service(&self, entity_id: EntityId, service: &str) {
        self.dropped_services
            .lock()
            .unwrap()
            .insert((entity_id, service.to_string()));
    }

    /// Commands accepted so far
    pub fn issued(&self) -> Vec<Command> {
        self.issued.lock().unwrap().clone()
    }

    /// `domain.service` of every accepted command for one entity
    pub fn services_for(&self, entity_id: &EntityId) -> Vec<String> {
        self.issued
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.target == entity_id)
            .map(Command::service_id)
            .collect()
    }

    pub fn clear(&self) {
        self.issued.lock().unwrap().clear();
    }
}

impl CommandDispatcher for RecordingDispatcher {
    fn issue(&self, command: Command) -> Result<(), DispatchError> {
        if self.failing.lock().unwrap().contains(&command.target) {
            return Err(DispatchError::Rejected {
                service: command.service_id(),
                reason: "device offline".to_string(),
            });
        }
        self.issued.lock().unwrap().push(command.clone());
        if self.unresponsive.lock().unwrap().contains(&command.target) {
            return Ok(());
        }
        let key = (command.target.clone(), command.service_id());
        if self.dropped_services.lock().unwrap().contains(&key) {
            return Ok(());
        }
        self.inner.issue(command)
    }
}
