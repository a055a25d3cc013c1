//! `res_scene.*` services
//!
//! | Service  | Data                                                          |
//! |----------|---------------------------------------------------------------|
//! | `create` | `scene_id`, `snapshot_entities`, `snapshot_areas`, `snapshot_labels`, `restore_light_attributes`, `action_timeout` |
//! | `apply`  | `scene_id`; responds `{"success": bool}`                      |
//! | `delete` | `scene_id`                                                    |
//! | `rename` | `rename_from`, `rename_to`                                    |

use std::collections::HashSet;
use std::sync::Arc;

use res_scene_core::{EntityId, DOMAIN};
use res_scene_hass::{ServiceCall, ServiceError, ServiceRegistry, SupportsResponse};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::SceneError;
use crate::host::{EntityDirectory, StatusSource};
use crate::manager::SceneManager;
use crate::options::OptionsOverlay;

fn string_or_list() -> Value {
    json!({
        "anyOf": [
            {"type": "string"},
            {"type": "array", "items": {"type": "string"}}
        ]
    })
}

fn create_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "scene_id": {"type": "string"},
            "snapshot_entities": string_or_list(),
            "snapshot_areas": string_or_list(),
            "snapshot_labels": string_or_list(),
            "restore_light_attributes": {"type": "boolean"},
            "action_timeout": {"type": "number", "exclusiveMinimum": 0}
        }
    })
}

fn scene_id_schema() -> Value {
    json!({
        "type": "object",
        "required": ["scene_id"],
        "properties": {"scene_id": {"type": "string", "minLength": 1}}
    })
}

fn rename_schema() -> Value {
    json!({
        "type": "object",
        "required": ["rename_from", "rename_to"],
        "properties": {
            "rename_from": {"type": "string", "minLength": 1},
            "rename_to": {"type": "string"}
        }
    })
}

fn call_failed(e: SceneError) -> ServiceError {
    ServiceError::CallFailed(e.to_string())
}

/// Entities named directly or through areas and labels, keeping only those
/// with a live state
pub fn resolve_targets(
    call: &ServiceCall,
    directory: &dyn EntityDirectory,
    status: &dyn StatusSource,
) -> Vec<EntityId> {
    let mut targets: Vec<EntityId> = Vec::new();
    for raw in call.get_list("snapshot_entities") {
        match raw.parse::<EntityId>() {
            Ok(entity_id) => targets.push(entity_id),
            Err(e) => warn!(entity_id = %raw, "Ignoring invalid entity id: {}", e),
        }
    }
    for area_id in call.get_list("snapshot_areas") {
        targets.extend(directory.entities_for_area(&area_id));
    }
    for label_id in call.get_list("snapshot_labels") {
        targets.extend(directory.entities_with_label(&label_id));
    }

    let mut seen = HashSet::new();
    targets.retain(|id| seen.insert(id.clone()) && status.get_status(id).is_some());
    targets
}

/// Register the scene services on the host
pub fn register_services(
    services: &ServiceRegistry,
    manager: Arc<SceneManager>,
    directory: Arc<dyn EntityDirectory>,
    status: Arc<dyn StatusSource>,
) -> Result<(), ServiceError> {
    let create_manager = manager.clone();
    services.register(
        DOMAIN,
        "create",
        move |call: ServiceCall| {
            let manager = create_manager.clone();
            let directory = directory.clone();
            let status = status.clone();
            async move {
                let scene_id = call.get_str("scene_id").ok_or_else(|| {
                    ServiceError::InvalidData("Missing required field: scene_id.".to_string())
                })?;

                let targets = resolve_targets(&call, directory.as_ref(), status.as_ref());
                if targets.is_empty() {
                    return Err(ServiceError::InvalidData("No valid entities found.".to_string()));
                }

                let requested = OptionsOverlay {
                    restore_light_attributes: call.get("restore_light_attributes"),
                    action_timeout: call.get("action_timeout"),
                };
                let options = manager.get_user_options().merged(&requested);

                manager
                    .save(&scene_id, &targets, Some(options))
                    .await
                    .map_err(call_failed)?;
                Ok(None)
            }
        },
        Some(create_schema()),
        SupportsResponse::None,
    )?;

    let apply_manager = manager.clone();
    services.register(
        DOMAIN,
        "apply",
        move |call: ServiceCall| {
            let manager = apply_manager.clone();
            async move {
                let scene_id = call.get_str("scene_id").unwrap_or_default();
                let success = manager.apply(&scene_id).await;
                Ok(Some(json!({ "success": success })))
            }
        },
        Some(scene_id_schema()),
        SupportsResponse::Optional,
    )?;

    let delete_manager = manager.clone();
    services.register(
        DOMAIN,
        "delete",
        move |call: ServiceCall| {
            let manager = delete_manager.clone();
            async move {
                let scene_id = call.get_str("scene_id").unwrap_or_default();
                manager.delete(&scene_id).await.map_err(call_failed)?;
                Ok(None)
            }
        },
        Some(scene_id_schema()),
        SupportsResponse::None,
    )?;

    services.register(
        DOMAIN,
        "rename",
        move |call: ServiceCall| {
            let manager = manager.clone();
            async move {
                let from = call.get_str("rename_from").unwrap_or_default();
                let to = call.get_str("rename_to").unwrap_or_default();
                manager.rename(&from, &to).await.map_err(call_failed)?;
                Ok(None)
            }
        },
        Some(rename_schema()),
        SupportsResponse::None,
    )?;

    info!("Scene services registered");
    Ok(())
}
