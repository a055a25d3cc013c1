//! Media player restore rules

use res_scene_core::{EntityId, STATE_IDLE, STATE_OFF, STATE_ON, STATE_PAUSED, STATE_PLAYING};

use super::{command, PlannedCommand};
use crate::error::PlanError;
use crate::snapshot::EntitySnapshot;

pub(super) fn plan(
    entity_id: &EntityId,
    snapshot: &EntitySnapshot,
) -> Result<Vec<PlannedCommand>, PlanError> {
    let service = match snapshot.status.as_str() {
        STATE_ON => "turn_on",
        STATE_OFF => "turn_off",
        STATE_PLAYING => "media_play",
        STATE_PAUSED => "media_pause",
        STATE_IDLE => "media_stop",
        other => {
            return Err(PlanError::UnknownMediaState {
                entity_id: entity_id.clone(),
                status: other.to_string(),
            })
        }
    };

    let mut plan = vec![PlannedCommand::Paced(command(entity_id, service))];
    if let Some(volume) = snapshot.attribute("volume_level") {
        plan.push(PlannedCommand::Paced(
            command(entity_id, "volume_set").with("volume_level", volume.clone()),
        ));
    }
    if let Some(source) = snapshot.attribute("source") {
        plan.push(PlannedCommand::Paced(
            command(entity_id, "select_source").with("source", source.clone()),
        ));
    }
    Ok(plan)
}
