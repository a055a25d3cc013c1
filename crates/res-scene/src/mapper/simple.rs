//! Single-command domains: locks, toggles and input helpers

use res_scene_core::{EntityId, STATE_LOCKED, STATE_ON, STATE_UNLOCKED};

use super::{command, PlannedCommand};
use crate::error::PlanError;
use crate::snapshot::EntitySnapshot;

pub(super) fn lock(
    entity_id: &EntityId,
    snapshot: &EntitySnapshot,
) -> Result<Vec<PlannedCommand>, PlanError> {
    let service = match snapshot.status.as_str() {
        STATE_LOCKED => "lock",
        STATE_UNLOCKED => "unlock",
        other => {
            return Err(PlanError::InvalidState {
                entity_id: entity_id.clone(),
                status: other.to_string(),
            })
        }
    };
    Ok(vec![PlannedCommand::Paced(command(entity_id, service))])
}

pub(super) fn toggle(entity_id: &EntityId, snapshot: &EntitySnapshot) -> Vec<PlannedCommand> {
    let service = if snapshot.status == STATE_ON {
        "turn_on"
    } else {
        "turn_off"
    };
    vec![PlannedCommand::Paced(command(entity_id, service))]
}

pub(super) fn input_number(
    entity_id: &EntityId,
    snapshot: &EntitySnapshot,
) -> Result<Vec<PlannedCommand>, PlanError> {
    let value = snapshot
        .status
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PlanError::InvalidState {
            entity_id: entity_id.clone(),
            status: snapshot.status.clone(),
        })?;
    Ok(vec![PlannedCommand::Paced(
        command(entity_id, "set_value").with("value", value),
    )])
}

pub(super) fn input_select(entity_id: &EntityId, snapshot: &EntitySnapshot) -> Vec<PlannedCommand> {
    vec![PlannedCommand::Paced(
        command(entity_id, "select_option").with("option", snapshot.status.clone()),
    )]
}

pub(super) fn input_text(entity_id: &EntityId, snapshot: &EntitySnapshot) -> Vec<PlannedCommand> {
    vec![PlannedCommand::Paced(
        command(entity_id, "set_value").with("value", snapshot.status.clone()),
    )]
}
