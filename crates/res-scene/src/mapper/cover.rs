//! Cover restore rules
//!
//! Saved positions win over the open/closed status. Both the service-data
//! names (`position`) and the reported names (`current_position`) are
//! accepted, since snapshots are taken from live states.

use res_scene_core::{EntityId, STATE_CLOSED, STATE_ON, STATE_OPEN};
use serde_json::Value;

use super::{command, PlannedCommand};
use crate::snapshot::EntitySnapshot;

fn saved<'a>(snapshot: &'a EntitySnapshot, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| snapshot.attribute(key))
}

pub(super) fn plan(entity_id: &EntityId, snapshot: &EntitySnapshot) -> Vec<PlannedCommand> {
    let position = saved(snapshot, &["position", "current_position"]);
    let tilt = saved(snapshot, &["tilt_position", "current_tilt_position"]);

    let mut plan = Vec::new();
    if let Some(position) = position {
        plan.push(PlannedCommand::Paced(
            command(entity_id, "set_cover_position").with("position", position.clone()),
        ));
    }
    if let Some(tilt) = tilt {
        plan.push(PlannedCommand::Paced(
            command(entity_id, "set_cover_tilt_position").with("tilt_position", tilt.clone()),
        ));
    }

    if plan.is_empty() {
        let service = match snapshot.status.as_str() {
            STATE_OPEN => "open_cover",
            STATE_CLOSED => "close_cover",
            STATE_ON => "open_cover",
            _ => "close_cover",
        };
        plan.push(PlannedCommand::Paced(command(entity_id, service)));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn blind() -> EntityId {
        "cover.blind".parse().unwrap()
    }

    fn services(plan: &[PlannedCommand]) -> Vec<String> {
        plan.iter().map(|p| p.command().service.clone()).collect()
    }

    #[test]
    fn test_positions_win_over_status() {
        let Value::Object(attrs) = json!({"current_position": 40, "current_tilt_position": 10})
        else {
            unreachable!()
        };
        let plan = plan(&blind(), &EntitySnapshot::new("open", attrs));
        assert_eq!(services(&plan), vec!["set_cover_position", "set_cover_tilt_position"]);
        assert_eq!(plan[0].command().data["position"], json!(40));
        assert_eq!(plan[1].command().data["tilt_position"], json!(10));
    }

    #[test]
    fn test_tilt_only() {
        let Value::Object(attrs) = json!({"tilt_position": 70, "position": null}) else {
            unreachable!()
        };
        let plan = plan(&blind(), &EntitySnapshot::new("closed", attrs));
        assert_eq!(services(&plan), vec!["set_cover_tilt_position"]);
    }

    #[test]
    fn test_status_fallback() {
        for (status, service) in [
            ("open", "open_cover"),
            ("closed", "close_cover"),
            ("on", "open_cover"),
            ("opening", "close_cover"),
        ] {
            let plan = plan(&blind(), &EntitySnapshot::new(status, Map::new()));
            assert_eq!(services(&plan), vec![service]);
        }
    }
}
