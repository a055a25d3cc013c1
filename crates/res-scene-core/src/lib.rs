//! Core types for restorable scenes
//!
//! This crate holds the value types shared by the in-memory host platform
//! and the scene engine: EntityId, Domain, State, Context, Command and the
//! events that flow over the bus.

mod command;
mod context;
mod domain;
mod entity_id;
mod event;
mod state;

pub use command::Command;
pub use context::Context;
pub use domain::Domain;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, SceneEvent, StateChangedData};
pub use state::State;

/// Integration domain used for services, storage keys and topics
pub const DOMAIN: &str = "res_scene";

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_OPEN: &str = "open";
pub const STATE_CLOSED: &str = "closed";
pub const STATE_PLAYING: &str = "playing";
pub const STATE_PAUSED: &str = "paused";
pub const STATE_IDLE: &str = "idle";
pub const STATE_LOCKED: &str = "locked";
pub const STATE_UNLOCKED: &str = "unlocked";
pub const STATE_UNAVAILABLE: &str = "unavailable";
pub const STATE_UNKNOWN: &str = "unknown";

/// Event types carried on the bus
pub mod topics {
    /// An entity's state was written
    pub const STATE_CHANGED: &str = "state_changed";

    /// A scene was created, replaced, renamed into place or re-announced
    pub const SCENE_ADDED: &str = "res_scene_scene_added";

    /// A scene was deleted or renamed away
    pub const SCENE_REMOVED: &str = "res_scene_scene_removed";
}
