//! Restorable scenes
//!
//! A scene is a named snapshot of the status and attributes of a set of
//! entities. [`SceneManager`] captures scenes, persists them and replays
//! them by issuing the domain commands that bring each entity back,
//! confirming light commands against the entity's reported state.
//!
//! ```text
//! save:  SceneManager -> SnapshotCapturer -> SceneStorage -> SceneNotifier
//! apply: SceneManager -> compute_commands -> CommandSequencer -> StateWatcher
//! ```

pub mod capture;
pub mod error;
pub mod host;
pub mod manager;
pub mod mapper;
pub mod options;
pub mod sequencer;
pub mod services;
pub mod snapshot;
pub mod watcher;

pub use capture::{Capture, SnapshotCapturer};
pub use error::{DispatchError, PlanError, SceneError, SceneResult};
pub use host::{
    hass_directory, scene_store, CommandDispatcher, EntityDirectory, Host, SceneNotifier,
    SceneStorage, StatusFeed, StatusSource, StatusTracker,
};
pub use manager::SceneManager;
pub use mapper::{compute_commands, PlannedCommand, Strategy};
pub use options::{
    EngineSettings, FallbackPolicy, OptionsOverlay, RestoreOptions, DEFAULT_ACTION_TIMEOUT,
    DEFAULT_COMMAND_DELAY,
};
pub use sequencer::{CommandSequencer, SequenceStep};
pub use services::register_services;
pub use snapshot::{EntitySnapshot, SceneData, SceneMap, OPTIONS_KEY};
pub use watcher::{await_transition, CommandResult, StateWatcher};
