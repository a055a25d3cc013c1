//! Scene store operations: rename, delete, restore, options, persistence

mod common;

use std::sync::Arc;

use common::*;
use res_scene::{
    scene_store, OptionsOverlay, SceneError, SceneManager, SceneStorage, EntitySnapshot,
    SceneData, SceneMap,
};
use res_scene_core::SceneEvent;
use res_scene_hass::Hass;
use serde_json::{json, Map};
use tempfile::TempDir;
use tokio_test::assert_ok;

fn scenes(ids: &[&str]) -> SceneMap {
    let mut map = SceneMap::new();
    for scene_id in ids {
        let mut entities = indexmap::IndexMap::new();
        entities.insert(id("switch.fan"), EntitySnapshot::new("on", Map::new()));
        map.insert(scene_id.to_string(), SceneData::new(entities));
    }
    map
}

#[tokio::test]
async fn test_rename_of_missing_scene_is_noop() {
    let mut home = TestHome::with_scenes(scenes(&["a"]));
    home.manager.rename("nope", "b").await.unwrap();

    assert_eq!(home.manager.scene_ids().await, vec!["a"]);
    assert_eq!(home.storage.save_count(), 0);
    assert!(home.scene_events().is_empty());
}

#[tokio::test]
async fn test_rename_onto_other_scene_is_rejected() {
    let mut home = TestHome::with_scenes(scenes(&["a", "b"]));
    let result = home.manager.rename("a", "b").await;

    assert!(matches!(result, Err(SceneError::AlreadyExists(ref to)) if to == "b"));
    assert_eq!(home.manager.scene_ids().await, vec!["a", "b"]);
    assert!(home.scene_events().is_empty());
}

#[tokio::test]
async fn test_rename_moves_scene_in_place() {
    let mut home = TestHome::with_scenes(scenes(&["a", "b", "c"]));
    home.manager.rename("b", "  bravo ").await.unwrap();

    let saved = home.storage.saved().unwrap();
    let order: Vec<&String> = saved.keys().collect();
    assert_eq!(order, vec!["a", "bravo", "c"]);
    assert!(home.manager.get("b").await.is_none());
    assert!(home.manager.get("bravo").await.is_some());
    assert_eq!(
        home.scene_events(),
        vec![
            SceneEvent::Removed("b".to_string()),
            SceneEvent::Added("bravo".to_string())
        ]
    );
}

#[tokio::test]
async fn test_rename_to_blank_or_itself() {
    let mut home = TestHome::with_scenes(scenes(&["a"]));
    home.manager.rename("a", "   ").await.unwrap();
    assert!(home.scene_events().is_empty());

    home.manager.rename("a", "a").await.unwrap();
    assert_eq!(home.manager.scene_ids().await, vec!["a"]);
    assert_eq!(
        home.scene_events(),
        vec![
            SceneEvent::Removed("a".to_string()),
            SceneEvent::Added("a".to_string())
        ]
    );
}

#[tokio::test]
async fn test_delete_publishes_even_when_missing() {
    let mut home = TestHome::with_scenes(scenes(&["a"]));

    home.manager.delete("a").await.unwrap();
    home.manager.delete("ghost").await.unwrap();

    assert!(home.manager.is_empty().await);
    assert_eq!(home.storage.save_count(), 1);
    assert_eq!(
        home.scene_events(),
        vec![
            SceneEvent::Removed("a".to_string()),
            SceneEvent::Removed("ghost".to_string())
        ]
    );
}

#[tokio::test]
async fn test_restore_all_reannounces_without_changes() {
    let mut home = TestHome::with_scenes(scenes(&["morning", "evening"]));
    home.manager.restore_all().await;

    assert_eq!(
        home.scene_events(),
        vec![
            SceneEvent::Added("morning".to_string()),
            SceneEvent::Added("evening".to_string())
        ]
    );
    assert_eq!(home.storage.save_count(), 0);
    assert!(home.dispatcher.issued().is_empty());
}

#[tokio::test]
async fn test_user_options_are_copied() {
    let home = TestHome::new();
    let mut options = OptionsOverlay {
        restore_light_attributes: Some(true),
        action_timeout: Some(2.0),
    };
    home.manager.set_user_options(options.clone());
    options.action_timeout = Some(99.0);

    let mut read = home.manager.get_user_options();
    assert_eq!(read.action_timeout, Some(2.0));
    read.restore_light_attributes = Some(false);
    assert_eq!(
        home.manager.get_user_options().restore_light_attributes,
        Some(true)
    );
}

#[tokio::test]
async fn test_scenes_persist_across_managers() {
    let dir = TempDir::new().unwrap();
    let hass = Hass::new(dir.path());
    hass.install_virtual_devices(std::time::Duration::ZERO)
        .unwrap();
    hass.states.set(
        id("switch.fan"),
        "on",
        attrs(json!({"friendly_name": "Fan"})),
        res_scene_core::Context::new(),
    );

    let host = res_scene::Host::from_hass(&hass);
    let storage: Arc<dyn SceneStorage> = Arc::new(scene_store(&hass.storage));
    let settings = fast_settings(res_scene::FallbackPolicy::Drop);

    let manager = assert_ok!(SceneManager::load(host.clone(), storage.clone(), settings).await);
    assert!(manager.is_empty().await);
    assert_ok!(
        manager
            .save(
                "evening",
                &[id("switch.fan")],
                Some(OptionsOverlay {
                    restore_light_attributes: Some(true),
                    action_timeout: None,
                }),
            )
            .await
    );

    let raw: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(".storage/res_scene.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["data"]["evening"]["switch.fan"]["state"], "on");
    assert_eq!(
        raw["data"]["evening"]["_options"],
        json!({"restore_light_attributes": true})
    );

    let reloaded = assert_ok!(SceneManager::load(host, storage, settings).await);
    assert_eq!(reloaded.scene_ids().await, vec!["evening"]);
    assert_eq!(
        reloaded.get("evening").await,
        manager.get("evening").await
    );
}

#[tokio::test]
async fn test_failed_write_leaves_scenes_unchanged() {
    let mut home = TestHome::with_scenes(scenes(&["a", "b", "c"]));
    home.set("switch.fan", "off", json!({}));
    home.storage.set_read_only(true);

    let result = home.manager.save("d", &[id("switch.fan")], None).await;
    assert!(matches!(result, Err(SceneError::Storage(_))));
    assert!(home.manager.get("d").await.is_none());

    assert!(home.manager.save("b", &[id("switch.fan")], None).await.is_err());
    assert_eq!(
        home.manager.get("b").await.unwrap().get(&id("switch.fan")).unwrap().status,
        "on"
    );

    assert!(home.manager.delete("b").await.is_err());
    assert!(home.manager.rename("c", "charlie").await.is_err());
    assert!(home.scene_events().is_empty());
    assert_eq!(home.storage.save_count(), 0);

    // Positions survive the rollbacks
    home.storage.set_read_only(false);
    home.manager.delete("a").await.unwrap();
    let order: Vec<String> = home.storage.saved().unwrap().keys().cloned().collect();
    assert_eq!(order, vec!["b", "c"]);
}
