//! Saved state to device commands
//!
//! [`compute_commands`] is pure: it looks only at the entity id, the saved
//! snapshot and the resolved options. Each domain maps to a [`Strategy`]
//! with its own rules module.

mod climate;
mod cover;
mod light;
mod media_player;
mod simple;

use res_scene_core::{Command, Domain, EntityId};

use crate::error::PlanError;
use crate::options::RestoreOptions;
use crate::snapshot::EntitySnapshot;

pub use light::restorable_light_attributes;

/// A command scheduled for one entity
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedCommand {
    /// Issued through the watcher and confirmed against `expected`
    Confirmed { command: Command, expected: String },
    /// Issued without confirmation, paced against the next command
    Paced(Command),
}

impl PlannedCommand {
    pub fn command(&self) -> &Command {
        match self {
            Self::Confirmed { command, .. } | Self::Paced(command) => command,
        }
    }

    pub fn into_command(self) -> Command {
        match self {
            Self::Confirmed { command, .. } | Self::Paced(command) => command,
        }
    }
}

/// Restore rules chosen by domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Light,
    Cover,
    Climate,
    MediaPlayer,
    Lock,
    /// Plain on/off devices
    Toggle,
    InputNumber,
    InputSelect,
    InputText,
    NotRestorable,
    Unsupported,
}

impl Strategy {
    pub fn for_domain(domain: &Domain) -> Self {
        match domain {
            Domain::Light => Self::Light,
            Domain::Cover => Self::Cover,
            Domain::Climate => Self::Climate,
            Domain::MediaPlayer => Self::MediaPlayer,
            Domain::Lock => Self::Lock,
            Domain::Fan
            | Domain::Humidifier
            | Domain::Remote
            | Domain::Siren
            | Domain::Switch
            | Domain::InputBoolean => Self::Toggle,
            Domain::InputNumber => Self::InputNumber,
            Domain::InputSelect => Self::InputSelect,
            Domain::InputText => Self::InputText,
            Domain::Sensor
            | Domain::BinarySensor
            | Domain::DeviceTracker
            | Domain::Camera
            | Domain::Vacuum
            | Domain::Scene
            | Domain::Script => Self::NotRestorable,
            Domain::Other(_) => Self::Unsupported,
        }
    }
}

/// Commands that bring `entity_id` back to `snapshot`, in issue order
pub fn compute_commands(
    entity_id: &EntityId,
    snapshot: &EntitySnapshot,
    options: &RestoreOptions,
) -> Result<Vec<PlannedCommand>, PlanError> {
    let strategy = Strategy::for_domain(&entity_id.kind());
    if strategy == Strategy::NotRestorable {
        return Err(PlanError::NotRestorable(entity_id.clone()));
    }
    if snapshot.status.is_empty() {
        return Err(PlanError::MissingState(entity_id.clone()));
    }

    match strategy {
        Strategy::Light => Ok(light::plan(entity_id, snapshot, options)),
        Strategy::Cover => Ok(cover::plan(entity_id, snapshot)),
        Strategy::Climate => Ok(climate::plan(entity_id, snapshot)),
        Strategy::MediaPlayer => media_player::plan(entity_id, snapshot),
        Strategy::Lock => simple::lock(entity_id, snapshot),
        Strategy::Toggle => Ok(simple::toggle(entity_id, snapshot)),
        Strategy::InputNumber => simple::input_number(entity_id, snapshot),
        Strategy::InputSelect => Ok(simple::input_select(entity_id, snapshot)),
        Strategy::InputText => Ok(simple::input_text(entity_id, snapshot)),
        Strategy::NotRestorable => Err(PlanError::NotRestorable(entity_id.clone())),
        Strategy::Unsupported => Err(PlanError::UnsupportedDomain(entity_id.clone())),
    }
}

/// `domain.service` aimed at the entity, in the entity's own domain
fn command(entity_id: &EntityId, service: &str) -> Command {
    Command::new(entity_id.domain(), service, entity_id.clone())
}
