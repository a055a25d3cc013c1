//! A test home wired to a scene manager

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use res_scene::{
    hass_directory, register_services, EngineSettings, FallbackPolicy, Host, OptionsOverlay,
    SceneManager, SceneMap,
};
use res_scene_core::{Context, EntityId, SceneEvent, State};
use res_scene_hass::{EntityEntry, Hass, MATCH_ALL};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{MockStorage, RecordingDispatcher};

pub fn id(s: &str) -> EntityId {
    s.parse().expect("valid entity id")
}

pub fn attrs(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

/// Settings with short pacing so tests run quickly
pub fn fast_settings(policy: FallbackPolicy) -> EngineSettings {
    EngineSettings {
        command_delay: Duration::from_millis(5),
        fallback_policy: policy,
    }
}

pub struct TestHome {
    pub hass: Hass,
    pub host: Host,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub storage: Arc<MockStorage>,
    pub manager: Arc<SceneManager>,
    events: broadcast::Receiver<res_scene_core::Event>,
}

impl TestHome {
    pub fn new() -> Self {
        Self::build(SceneMap::new(), FallbackPolicy::Drop, Duration::ZERO)
    }

    pub fn strict() -> Self {
        Self::build(SceneMap::new(), FallbackPolicy::Strict, Duration::ZERO)
    }

    pub fn with_scenes(scenes: SceneMap) -> Self {
        Self::build(scenes, FallbackPolicy::Drop, Duration::ZERO)
    }

    /// Devices that take `latency` to report every change
    pub fn with_latency(latency: Duration) -> Self {
        Self::build(SceneMap::new(), FallbackPolicy::Drop, latency)
    }

    fn build(scenes: SceneMap, policy: FallbackPolicy, latency: Duration) -> Self {
        let hass = Hass::new(std::env::temp_dir());
        hass.install_virtual_devices(latency)
            .expect("device services register");

        let base = Host::from_hass(&hass);
        let dispatcher = Arc::new(RecordingDispatcher::new(base.dispatcher.clone()));
        let host = Host {
            dispatcher: dispatcher.clone(),
            ..base
        };

        let storage = Arc::new(MockStorage::with_scenes(scenes.clone()));
        let manager = Arc::new(SceneManager::new(
            host.clone(),
            storage.clone(),
            scenes,
            fast_settings(policy),
        ));
        manager.set_user_options(OptionsOverlay {
            restore_light_attributes: None,
            action_timeout: Some(1.0),
        });

        let events = hass.bus.subscribe(MATCH_ALL);
        Self {
            hass,
            host,
            dispatcher,
            storage,
            manager,
            events,
        }
    }

    /// Register the `res_scene.*` services
    pub fn with_services(self) -> Self {
        register_services(
            &self.hass.services,
            self.manager.clone(),
            hass_directory(&self.hass),
            self.host.status.clone(),
        )
        .expect("scene services register");
        self
    }

    pub fn set(&self, entity_id: &str, state: &str, attributes: Value) -> State {
        self.hass
            .states
            .set(id(entity_id), state, attrs(attributes), Context::new())
    }

    pub fn register(&self, entry: EntityEntry) {
        self.hass.entities.register(entry);
    }

    pub fn state(&self, entity_id: &str) -> State {
        self.hass
            .states
            .get(&id(entity_id))
            .unwrap_or_else(|| panic!("no state for {}", entity_id))
    }

    pub fn status(&self, entity_id: &str) -> String {
        self.state(entity_id).state
    }

    /// Let dispatched device handlers run
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    /// Scene notifications fired since the last call
    pub fn scene_events(&mut self) -> Vec<SceneEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Some(scene_event) = SceneEvent::from_event(&event) {
                out.push(scene_event);
            }
        }
        out
    }

    /// A living room with one entity of most restorable domains, plus a
    /// sensor
    pub fn seed_living_room(&self) {
        use serde_json::json;

        self.set(
            "light.sofa",
            "on",
            json!({
                "supported_color_modes": ["hs", "color_temp"],
                "color_mode": "hs",
                "hs_color": [30, 80],
                "brightness": 120
            }),
        );
        self.set("switch.fan", "on", json!({}));
        self.set("cover.blind", "open", json!({"current_position": 30}));
        self.set(
            "climate.hall",
            "heat",
            json!({"temperature": 21.5, "fan_mode": "low"}),
        );
        self.set(
            "media_player.tv",
            "playing",
            json!({"volume_level": 0.4, "source": "HDMI 1"}),
        );
        self.set("lock.front", "locked", json!({}));
        self.set("input_number.level", "42", json!({"min": 0, "max": 100}));
        self.set("input_select.mode", "away", json!({"options": ["home", "away"]}));
        self.set("input_text.note", "hello", json!({}));
        self.set("sensor.temperature", "21.0", json!({"unit_of_measurement": "°C"}));

        self.register(EntityEntry::new(id("light.sofa")).with_area("living_room"));
        self.register(
            EntityEntry::new(id("switch.fan"))
                .with_area("living_room")
                .with_label("evening"),
        );
        self.register(EntityEntry::new(id("cover.blind")).with_label("evening"));
        self.register(EntityEntry::new(id("sensor.temperature")).with_area("living_room"));
    }

    pub fn living_room_ids() -> Vec<EntityId> {
        [
            "light.sofa",
            "switch.fan",
            "cover.blind",
            "climate.hall",
            "media_player.tv",
            "lock.front",
            "input_number.level",
            "input_select.mode",
            "input_text.note",
            "sensor.temperature",
        ]
        .into_iter()
        .map(id)
        .collect()
    }
}
