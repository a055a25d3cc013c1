//! Collaborators the engine talks to
//!
//! The engine never reaches into the host directly: it reads states,
//! issues commands, tracks transitions, persists scenes and announces them
//! through these traits. [`Host::from_hass`] wires them to the in-memory
//! platform.

use std::sync::Arc;

use async_trait::async_trait;
use res_scene_core::{Command, Context, EntityId, Event, SceneEvent, State, StateChangedData};
use res_scene_hass::{
    EntityRegistry, EventBus, Hass, ServiceRegistry, StateStore, Storage, StorageError, Store,
};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::DispatchError;
use crate::snapshot::SceneMap;

/// Storage key of the scene document
pub const STORAGE_KEY: &str = "res_scene.json";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Live entity states
pub trait StatusSource: Send + Sync {
    fn get_status(&self, entity_id: &EntityId) -> Option<State>;
}

/// Hands commands to devices without waiting for them to run
pub trait CommandDispatcher: Send + Sync {
    /// `Err` means the command was never handed off
    fn issue(&self, command: Command) -> Result<(), DispatchError>;
}

/// State-change subscriptions scoped to a set of entities
pub trait StatusFeed: Send + Sync {
    fn track(&self, entity_ids: &[EntityId]) -> StatusTracker;
}

/// Persistent scene document
#[async_trait]
pub trait SceneStorage: Send + Sync {
    async fn load(&self) -> Result<Option<SceneMap>, StorageError>;
    async fn save(&self, scenes: &SceneMap) -> Result<(), StorageError>;
}

/// Announces scenes appearing and disappearing
pub trait SceneNotifier: Send + Sync {
    fn publish(&self, event: SceneEvent);
}

/// Areas, labels and existence of entities
pub trait EntityDirectory: Send + Sync {
    fn entities_for_area(&self, area_id: &str) -> Vec<EntityId>;
    fn entities_with_label(&self, label_id: &str) -> Vec<EntityId>;
    fn exists(&self, entity_id: &EntityId) -> bool;
}

/// A live subscription; dropping it unsubscribes
pub struct StatusTracker {
    rx: mpsc::UnboundedReceiver<StateChangedData>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StatusTracker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<StateChangedData>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// The next transition, or `None` once the feed is closed
    pub async fn next(&mut self) -> Option<StateChangedData> {
        self.rx.recv().await
    }
}

impl Drop for StatusTracker {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Handles shared by the watcher, capturer and manager
#[derive(Clone)]
pub struct Host {
    pub status: Arc<dyn StatusSource>,
    pub dispatcher: Arc<dyn CommandDispatcher>,
    pub feed: Arc<dyn StatusFeed>,
    pub notifier: Arc<dyn SceneNotifier>,
}

impl Host {
    pub fn from_hass(hass: &Hass) -> Self {
        Self {
            status: Arc::new(HassStates(hass.states.clone())),
            dispatcher: Arc::new(HassServices(hass.services.clone())),
            feed: Arc::new(HassFeed(hass.bus.clone())),
            notifier: Arc::new(HassNotifier(hass.bus.clone())),
        }
    }
}

/// The scene document in the host's `.storage/` directory
pub fn scene_store(storage: &Storage) -> Store<SceneMap> {
    Store::new(
        storage.clone(),
        STORAGE_KEY,
        STORAGE_VERSION,
        STORAGE_MINOR_VERSION,
    )
}

/// Entity directory backed by the entity registry and state store
pub fn hass_directory(hass: &Hass) -> Arc<dyn EntityDirectory> {
    Arc::new(HassDirectory {
        entities: hass.entities.clone(),
        states: hass.states.clone(),
    })
}

struct HassStates(Arc<StateStore>);

impl StatusSource for HassStates {
    fn get_status(&self, entity_id: &EntityId) -> Option<State> {
        self.0.get(entity_id)
    }
}

struct HassServices(Arc<ServiceRegistry>);

impl CommandDispatcher for HassServices {
    fn issue(&self, command: Command) -> Result<(), DispatchError> {
        trace!(entity_id = %command.target, service = %command.service_id(), "Issuing command");
        let data = command.service_data();
        self.0
            .dispatch(&command.domain, &command.service, data, command.context.clone())
            .map_err(|e| DispatchError::from_service(command.service_id(), e))
    }
}

struct HassFeed(Arc<EventBus>);

impl StatusFeed for HassFeed {
    fn track(&self, entity_ids: &[EntityId]) -> StatusTracker {
        let (id, rx) = self.0.track_state_changes(entity_ids.iter().cloned());
        let bus = self.0.clone();
        StatusTracker::new(rx, move || {
            bus.untrack(id);
        })
    }
}

struct HassNotifier(Arc<EventBus>);

impl SceneNotifier for HassNotifier {
    fn publish(&self, event: SceneEvent) {
        self.0
            .fire(Event::new(event.topic(), event.payload(), Context::new()));
    }
}

struct HassDirectory {
    entities: Arc<EntityRegistry>,
    states: Arc<StateStore>,
}

impl EntityDirectory for HassDirectory {
    fn entities_for_area(&self, area_id: &str) -> Vec<EntityId> {
        self.entities.entities_for_area(area_id)
    }

    fn entities_with_label(&self, label_id: &str) -> Vec<EntityId> {
        self.entities.entities_with_label(label_id)
    }

    fn exists(&self, entity_id: &EntityId) -> bool {
        self.states.contains(entity_id) || self.entities.is_registered(entity_id)
    }
}

#[async_trait]
impl SceneStorage for Store<SceneMap> {
    async fn load(&self) -> Result<Option<SceneMap>, StorageError> {
        Store::load(self).await
    }

    async fn save(&self, scenes: &SceneMap) -> Result<(), StorageError> {
        Store::save(self, scenes).await
    }
}
