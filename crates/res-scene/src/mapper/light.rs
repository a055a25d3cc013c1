//! Light restore rules

use res_scene_core::{EntityId, STATE_OFF, STATE_ON};
use serde_json::{Map, Value};
use tracing::warn;

use super::{command, PlannedCommand};
use crate::options::RestoreOptions;
use crate::snapshot::EntitySnapshot;

const NONE: &[&str] = &[];
const BRIGHTNESS: &[&str] = &["brightness", "brightness_pct"];

/// Attributes meaningful in each color mode
const COLOR_MODE_ATTRS: &[(&str, &[&str])] = &[
    ("onoff", NONE),
    ("brightness", BRIGHTNESS),
    ("hs", &["hs_color", "brightness", "brightness_pct"]),
    ("rgb", &["rgb_color", "brightness", "brightness_pct"]),
    ("rgbw", &["rgbw_color", "brightness", "brightness_pct"]),
    ("rgbww", &["rgbww_color", "brightness", "brightness_pct"]),
    ("xy", &["xy_color", "brightness", "brightness_pct"]),
    (
        "color_temp",
        &["color_temp", "color_temp_kelvin", "brightness", "brightness_pct"],
    ),
];

/// Attributes that, when saved, override the color mode table
const SPECIAL_ATTRS: &[(&str, &[&str])] = &[("profile", BRIGHTNESS), ("white", BRIGHTNESS)];

/// Always allowed
const COMMON_ATTRS: &[&str] = &["effect", "flash", "transition", "white", "profile"];

/// Assumed when the snapshot has no color mode
const DEFAULT_COLOR_MODE: &str = "color_temp";

pub(super) fn plan(
    entity_id: &EntityId,
    snapshot: &EntitySnapshot,
    options: &RestoreOptions,
) -> Vec<PlannedCommand> {
    let mut plan = Vec::new();

    if snapshot.status == STATE_ON || options.restore_light_attributes {
        let mut turn_on = command(entity_id, "turn_on").with("transition", 0);
        turn_on
            .data
            .extend(restorable_light_attributes(entity_id, snapshot));
        plan.push(PlannedCommand::Confirmed {
            command: turn_on,
            expected: STATE_ON.to_string(),
        });
    }

    if snapshot.status == STATE_OFF {
        plan.push(PlannedCommand::Confirmed {
            command: command(entity_id, "turn_off").with("transition", 0),
            expected: STATE_OFF.to_string(),
        });
    }

    plan
}

/// The saved attributes a `light.turn_on` may carry
///
/// A saved special attribute (`profile`, `white`) picks the allowed set;
/// otherwise the color mode does. Of each redundant pair only the more
/// precise value is kept: kelvin over mireds, absolute over percentage
/// brightness.
pub fn restorable_light_attributes(
    entity_id: &EntityId,
    snapshot: &EntitySnapshot,
) -> Map<String, Value> {
    let special = SPECIAL_ATTRS
        .iter()
        .find(|(attr, _)| snapshot.has_attribute(attr))
        .map(|(_, allowed)| *allowed);

    let allowed = special.unwrap_or_else(|| {
        let color_mode = snapshot
            .attribute("color_mode")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_COLOR_MODE);
        match COLOR_MODE_ATTRS.iter().find(|(mode, _)| *mode == color_mode) {
            Some((_, allowed)) => *allowed,
            None => {
                warn!(
                    entity_id = %entity_id,
                    color_mode,
                    "Unknown color_mode, allowing only common attributes"
                );
                NONE
            }
        }
    });

    let mut attrs: Map<String, Value> = snapshot
        .present_attributes()
        .filter(|(key, _)| allowed.contains(&key.as_str()) || COMMON_ATTRS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if attrs.contains_key("color_temp_kelvin") {
        attrs.remove("color_temp");
    }
    if attrs.contains_key("brightness") {
        attrs.remove("brightness_pct");
    }
    attrs
}
