//! Event bus with typed pub/sub and per-entity state tracking
//!
//! Events are broadcast by type (or to MATCH_ALL subscribers). State
//! changes are additionally routed to entity trackers, which receive only
//! the transitions of the entities they asked for and are removed with
//! [`EventBus::untrack`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use res_scene_core::{topics, Context, EntityId, Event, StateChangedData};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event type that matches every event
pub const MATCH_ALL: &str = "*";

/// Handle of an entity tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct EntityTracker {
    entity_ids: HashSet<EntityId>,
    tx: mpsc::UnboundedSender<StateChangedData>,
}

pub struct EventBus {
    /// Broadcast senders keyed by event type
    listeners: DashMap<String, broadcast::Sender<Event>>,
    match_all_sender: broadcast::Sender<Event>,
    /// State-change trackers scoped to a set of entities
    trackers: DashMap<ListenerId, EntityTracker>,
    next_listener_id: AtomicU64,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            trackers: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Subscribe to one event type, or to everything with [`MATCH_ALL`]
    pub fn subscribe(&self, event_type: &str) -> broadcast::Receiver<Event> {
        trace!(event_type, "Subscribing to event type");

        if event_type == MATCH_ALL {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn fire(&self, event: Event) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // No receivers is not an error
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all_sender.send(event);
    }

    /// Deliver a state change to the trackers of that entity, then fire it
    /// as a regular `state_changed` event.
    pub fn fire_state_changed(&self, data: StateChangedData, context: Context) {
        let mut closed = Vec::new();
        for tracker in self.trackers.iter() {
            if !tracker.entity_ids.contains(&data.entity_id) {
                continue;
            }
            if tracker.tx.send(data.clone()).is_err() {
                closed.push(*tracker.key());
            }
        }
        for id in closed {
            self.trackers.remove(&id);
        }

        match serde_json::to_value(&data) {
            Ok(payload) => self.fire(Event::new(topics::STATE_CHANGED, payload, context)),
            Err(e) => warn!(entity_id = %data.entity_id, "Unserializable state change: {}", e),
        }
    }

    /// Start receiving the state changes of exactly `entity_ids`
    pub fn track_state_changes(
        &self,
        entity_ids: impl IntoIterator<Item = EntityId>,
    ) -> (ListenerId, mpsc::UnboundedReceiver<StateChangedData>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let entity_ids: HashSet<EntityId> = entity_ids.into_iter().collect();
        trace!(listener = id.0, entities = entity_ids.len(), "Tracking state changes");
        self.trackers.insert(id, EntityTracker { entity_ids, tx });
        (id, rx)
    }

    /// Remove a tracker; returns false if it was already gone
    pub fn untrack(&self, id: ListenerId) -> bool {
        self.trackers.remove(&id).is_some()
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedEventBus = Arc<EventBus>;
