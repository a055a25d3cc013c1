//! Climate restore rules
//!
//! The HVAC mode goes first, then the setpoint, then each remaining
//! sub-attribute as its own command, in that order.

use res_scene_core::EntityId;

use super::{command, PlannedCommand};
use crate::snapshot::EntitySnapshot;

const DUAL_SETPOINT_MODE: &str = "heat_cool";

/// Saved attribute and the service restoring it
const SUB_ATTRIBUTES: &[(&str, &str)] = &[
    ("fan_mode", "set_fan_mode"),
    ("swing_mode", "set_swing_mode"),
    ("preset_mode", "set_preset_mode"),
    ("humidity", "set_humidity"),
];

pub(super) fn plan(entity_id: &EntityId, snapshot: &EntitySnapshot) -> Vec<PlannedCommand> {
    let hvac_mode = snapshot.status.as_str();
    let mut plan = vec![PlannedCommand::Paced(
        command(entity_id, "set_hvac_mode").with("hvac_mode", hvac_mode),
    )];

    let low = snapshot.attribute("target_temp_low");
    let high = snapshot.attribute("target_temp_high");
    let set_temperature = command(entity_id, "set_temperature").with("hvac_mode", hvac_mode);
    match (low, high, snapshot.attribute("temperature")) {
        (Some(low), Some(high), _) if hvac_mode == DUAL_SETPOINT_MODE => {
            plan.push(PlannedCommand::Paced(
                set_temperature
                    .with("target_temp_low", low.clone())
                    .with("target_temp_high", high.clone()),
            ));
        }
        (_, _, Some(temperature)) => {
            plan.push(PlannedCommand::Paced(
                set_temperature.with("temperature", temperature.clone()),
            ));
        }
        _ => {}
    }

    for (attribute, service) in SUB_ATTRIBUTES {
        if let Some(value) = snapshot.attribute(attribute) {
            plan.push(PlannedCommand::Paced(
                command(entity_id, service).with(*attribute, value.clone()),
            ));
        }
    }
    plan
}
