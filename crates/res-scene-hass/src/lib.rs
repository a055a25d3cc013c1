//! In-memory host platform
//!
//! Provides the pieces a scene engine talks to: an event bus with per-entity
//! state tracking, a state store, a service registry with schema
//! validation, an entity registry with areas and labels, `.storage/`
//! persistence, and simulated devices answering service calls.

pub mod bus;
pub mod devices;
pub mod registry;
pub mod services;
pub mod states;
pub mod storage;

use std::path::Path;
use std::sync::Arc;

pub use bus::{EventBus, ListenerId, SharedEventBus, MATCH_ALL};
pub use devices::VirtualDevices;
pub use registry::{EntityEntry, EntityRegistry};
pub use services::{
    ServiceCall, ServiceError, ServiceFuture, ServiceHandler, ServiceRegistry, ServiceResult,
    SharedServiceRegistry, SupportsResponse,
};
pub use states::{SharedStateStore, StateStore};
pub use storage::{Storage, StorageError, StorageFile, StorageResult, Store};

/// One running host instance
#[derive(Clone)]
pub struct Hass {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateStore>,
    pub services: Arc<ServiceRegistry>,
    pub entities: Arc<EntityRegistry>,
    pub storage: Storage,
}

impl Hass {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));

        Self {
            bus,
            states,
            services: Arc::new(ServiceRegistry::new()),
            entities: Arc::new(EntityRegistry::new()),
            storage: Storage::new(config_dir),
        }
    }

    /// Register simulated device services answering after `latency`
    pub fn install_virtual_devices(
        &self,
        latency: std::time::Duration,
    ) -> Result<(), ServiceError> {
        VirtualDevices::new(self.states.clone())
            .with_latency(latency)
            .register(&self.services)
    }
}
