//! Simulated devices
//!
//! Registers the per-domain services a scene can issue and answers them by
//! writing the resulting state, optionally after a fixed latency. Lights
//! keep their last "on" attributes while off, so turning one on reveals the
//! color it will come back with.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use res_scene_core::{
    EntityId, State, STATE_CLOSED, STATE_IDLE, STATE_LOCKED, STATE_OFF, STATE_ON, STATE_OPEN,
    STATE_PAUSED, STATE_PLAYING, STATE_UNLOCKED,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::services::{ServiceCall, ServiceError, ServiceRegistry, SupportsResponse};
use crate::states::StateStore;

type Attributes = HashMap<String, Value>;

/// Computes the next status and attributes of one targeted entity
type Transition =
    Arc<dyn Fn(&State, &ServiceCall) -> Result<(String, Attributes), ServiceError> + Send + Sync>;

/// Light attributes that only exist while the light is on
const LIGHT_ON_ATTRS: &[&str] = &[
    "brightness",
    "color_mode",
    "hs_color",
    "rgb_color",
    "rgbw_color",
    "rgbww_color",
    "xy_color",
    "color_temp",
    "color_temp_kelvin",
    "effect",
];

/// Service data key and the color mode it selects
const LIGHT_COLOR_KEYS: &[(&str, &str)] = &[
    ("hs_color", "hs"),
    ("rgb_color", "rgb"),
    ("rgbw_color", "rgbw"),
    ("rgbww_color", "rgbww"),
    ("xy_color", "xy"),
    ("color_temp_kelvin", "color_temp"),
    ("color_temp", "color_temp"),
];

const TOGGLE_DOMAINS: &[&str] = &[
    "switch",
    "fan",
    "input_boolean",
    "humidifier",
    "remote",
    "siren",
];

/// Service handlers backed by the state store
pub struct VirtualDevices {
    states: Arc<StateStore>,
    latency: Duration,
    /// Last "on" attributes of each light
    light_memory: Arc<DashMap<EntityId, Attributes>>,
}

impl VirtualDevices {
    pub fn new(states: Arc<StateStore>) -> Self {
        Self {
            states,
            latency: Duration::ZERO,
            light_memory: Arc::new(DashMap::new()),
        }
    }

    /// Delay between receiving a command and reporting the new state
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Register every supported domain's services
    pub fn register(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        self.register_lights(services)?;
        for domain in TOGGLE_DOMAINS {
            self.register_toggles(services, domain)?;
        }
        self.register_covers(services)?;
        self.register_climate(services)?;
        self.register_media_players(services)?;
        self.register_locks(services)?;
        self.register_inputs(services)?;
        info!("Virtual device services registered");
        Ok(())
    }

    fn add(
        &self,
        services: &ServiceRegistry,
        domain: &str,
        service: &str,
        schema: Option<Value>,
        transition: Transition,
    ) -> Result<(), ServiceError> {
        let states = self.states.clone();
        let latency = self.latency;
        let domain_name = domain.to_string();

        services.register(
            domain,
            service,
            move |call: ServiceCall| {
                let states = states.clone();
                let transition = transition.clone();
                let domain = domain_name.clone();
                async move {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    for entity_id in target_entities(&call, &domain) {
                        let Some(current) = states.get(&entity_id) else {
                            continue;
                        };
                        let (state, attrs) = transition(&current, &call)?;
                        debug!(entity_id = %entity_id, state = %state, "Device reporting state");
                        states.set(entity_id, state, attrs, call.context.clone());
                    }
                    Ok(None)
                }
            },
            schema,
            SupportsResponse::None,
        )
    }

    fn register_lights(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        let memory = self.light_memory.clone();
        self.add(
            services,
            "light",
            "turn_on",
            None,
            Arc::new(move |current: &State, call: &ServiceCall| {
                let mut on_attrs = memory
                    .get(&current.entity_id)
                    .map(|m| m.clone())
                    .unwrap_or_default();
                if current.state == STATE_ON {
                    on_attrs.extend(pick(&current.attributes, LIGHT_ON_ATTRS));
                }
                apply_light_data(&mut on_attrs, current, &call.data);
                memory.insert(current.entity_id.clone(), on_attrs.clone());

                let mut attrs = omit(&current.attributes, LIGHT_ON_ATTRS);
                attrs.extend(on_attrs);
                Ok((STATE_ON.to_string(), attrs))
            }),
        )?;

        let memory = self.light_memory.clone();
        self.add(
            services,
            "light",
            "turn_off",
            None,
            Arc::new(move |current: &State, _: &ServiceCall| {
                if current.state == STATE_ON {
                    memory.insert(
                        current.entity_id.clone(),
                        pick(&current.attributes, LIGHT_ON_ATTRS),
                    );
                }
                Ok((
                    STATE_OFF.to_string(),
                    omit(&current.attributes, LIGHT_ON_ATTRS),
                ))
            }),
        )
    }

    fn register_toggles(&self, services: &ServiceRegistry, domain: &str) -> Result<(), ServiceError> {
        self.add(services, domain, "turn_on", None, set_status(STATE_ON))?;
        self.add(services, domain, "turn_off", None, set_status(STATE_OFF))?;
        self.add(
            services,
            domain,
            "toggle",
            None,
            Arc::new(|current: &State, _: &ServiceCall| {
                let next = if current.state == STATE_ON {
                    STATE_OFF
                } else {
                    STATE_ON
                };
                Ok((next.to_string(), current.attributes.clone()))
            }),
        )
    }

    fn register_covers(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        self.add(
            services,
            "cover",
            "open_cover",
            None,
            Arc::new(|current: &State, _: &ServiceCall| Ok(cover_at(current, 100))),
        )?;
        self.add(
            services,
            "cover",
            "close_cover",
            None,
            Arc::new(|current: &State, _: &ServiceCall| Ok(cover_at(current, 0))),
        )?;
        self.add(
            services,
            "cover",
            "set_cover_position",
            Some(required_number("position", 0.0, 100.0)),
            Arc::new(|current: &State, call: &ServiceCall| {
                let position = call.get::<f64>("position").unwrap_or_default();
                Ok(cover_at(current, position.round() as i64))
            }),
        )?;
        self.add(
            services,
            "cover",
            "set_cover_tilt_position",
            Some(required_number("tilt_position", 0.0, 100.0)),
            Arc::new(|current: &State, call: &ServiceCall| {
                let mut attrs = current.attributes.clone();
                attrs.insert(
                    "current_tilt_position".to_string(),
                    call.data["tilt_position"].clone(),
                );
                Ok((current.state.clone(), attrs))
            }),
        )
    }

    fn register_climate(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        self.add(
            services,
            "climate",
            "set_hvac_mode",
            Some(required_string("hvac_mode")),
            Arc::new(|current: &State, call: &ServiceCall| {
                let mode = call.get_str("hvac_mode").unwrap_or_default();
                Ok((mode, current.attributes.clone()))
            }),
        )?;
        self.add(
            services,
            "climate",
            "set_temperature",
            None,
            Arc::new(|current: &State, call: &ServiceCall| {
                let mut attrs = current.attributes.clone();
                if call.data.get("temperature").is_some() {
                    copy_field(&mut attrs, call, "temperature");
                    attrs.insert("target_temp_low".to_string(), Value::Null);
                    attrs.insert("target_temp_high".to_string(), Value::Null);
                } else {
                    copy_field(&mut attrs, call, "target_temp_low");
                    copy_field(&mut attrs, call, "target_temp_high");
                    attrs.insert("temperature".to_string(), Value::Null);
                }
                let state = call.get_str("hvac_mode").unwrap_or_else(|| current.state.clone());
                Ok((state, attrs))
            }),
        )?;
        for (service, field) in [
            ("set_fan_mode", "fan_mode"),
            ("set_swing_mode", "swing_mode"),
            ("set_preset_mode", "preset_mode"),
        ] {
            self.add(
                services,
                "climate",
                service,
                Some(required_string(field)),
                set_attribute(field),
            )?;
        }
        self.add(
            services,
            "climate",
            "set_humidity",
            Some(required_number("humidity", 0.0, 100.0)),
            set_attribute("humidity"),
        )
    }

    fn register_media_players(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        for (service, status) in [
            ("turn_on", STATE_ON),
            ("turn_off", STATE_OFF),
            ("media_play", STATE_PLAYING),
            ("media_pause", STATE_PAUSED),
            ("media_stop", STATE_IDLE),
        ] {
            self.add(services, "media_player", service, None, set_status(status))?;
        }
        self.add(
            services,
            "media_player",
            "volume_set",
            Some(required_number("volume_level", 0.0, 1.0)),
            set_attribute("volume_level"),
        )?;
        self.add(
            services,
            "media_player",
            "select_source",
            Some(required_string("source")),
            set_attribute("source"),
        )
    }

    fn register_locks(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        self.add(services, "lock", "lock", None, set_status(STATE_LOCKED))?;
        self.add(services, "lock", "unlock", None, set_status(STATE_UNLOCKED))
    }

    fn register_inputs(&self, services: &ServiceRegistry) -> Result<(), ServiceError> {
        self.add(
            services,
            "input_number",
            "set_value",
            Some(json!({
                "type": "object",
                "required": ["value"],
                "properties": {"value": {"type": "number"}}
            })),
            Arc::new(|current: &State, call: &ServiceCall| {
                let value = call.get::<f64>("value").unwrap_or_default();
                let min = current.attribute::<f64>("min").unwrap_or(f64::MIN);
                let max = current.attribute::<f64>("max").unwrap_or(f64::MAX);
                Ok((
                    format_number(value.clamp(min, max)),
                    current.attributes.clone(),
                ))
            }),
        )?;
        self.add(
            services,
            "input_select",
            "select_option",
            Some(required_string("option")),
            Arc::new(|current: &State, call: &ServiceCall| {
                let option = call.get_str("option").unwrap_or_default();
                if let Some(options) = current.attribute::<Vec<String>>("options") {
                    if !options.contains(&option) {
                        return Err(ServiceError::InvalidData(format!(
                            "invalid option for {}: {}",
                            current.entity_id, option
                        )));
                    }
                }
                Ok((option, current.attributes.clone()))
            }),
        )?;
        self.add(
            services,
            "input_text",
            "set_value",
            Some(json!({
                "type": "object",
                "required": ["value"],
                "properties": {"value": {"type": "string"}}
            })),
            Arc::new(|current: &State, call: &ServiceCall| {
                let value = call.get::<String>("value").unwrap_or_default();
                Ok((value, current.attributes.clone()))
            }),
        )
    }
}

/// Entity ids targeted by a call, restricted to the service's domain
fn target_entities(call: &ServiceCall, domain: &str) -> Vec<EntityId> {
    call.entity_ids()
        .iter()
        .filter_map(|id| id.parse::<EntityId>().ok())
        .filter(|id| id.domain() == domain)
        .collect()
}

fn set_status(status: &'static str) -> Transition {
    Arc::new(move |current: &State, _: &ServiceCall| {
        Ok((status.to_string(), current.attributes.clone()))
    })
}

fn set_attribute(field: &'static str) -> Transition {
    Arc::new(move |current: &State, call: &ServiceCall| {
        let mut attrs = current.attributes.clone();
        copy_field(&mut attrs, call, field);
        Ok((current.state.clone(), attrs))
    })
}

fn copy_field(attrs: &mut Attributes, call: &ServiceCall, field: &str) {
    if let Some(value) = call.data.get(field) {
        attrs.insert(field.to_string(), value.clone());
    }
}

fn cover_at(current: &State, position: i64) -> (String, Attributes) {
    let position = position.clamp(0, 100);
    let mut attrs = current.attributes.clone();
    attrs.insert("current_position".to_string(), json!(position));
    let status = if position > 0 { STATE_OPEN } else { STATE_CLOSED };
    (status.to_string(), attrs)
}

/// Merge `light.turn_on` data into the remembered on-attributes
fn apply_light_data(on_attrs: &mut Attributes, current: &State, data: &Value) {
    if let Some(brightness) = data.get("brightness").and_then(Value::as_f64) {
        on_attrs.insert("brightness".to_string(), json!(brightness.round() as i64));
    } else if let Some(pct) = data.get("brightness_pct").and_then(Value::as_f64) {
        on_attrs.insert(
            "brightness".to_string(),
            json!((pct * 255.0 / 100.0).round() as i64),
        );
    }

    if let Some((key, mode)) = LIGHT_COLOR_KEYS
        .iter()
        .find(|(key, _)| data.get(*key).is_some())
    {
        for (other, _) in LIGHT_COLOR_KEYS {
            on_attrs.remove(*other);
        }
        on_attrs.insert(key.to_string(), data[*key].clone());
        if *mode == "color_temp" {
            fill_color_temp(on_attrs);
        }
        on_attrs.insert("color_mode".to_string(), json!(mode));
    }

    if let Some(effect) = data.get("effect") {
        on_attrs.insert("effect".to_string(), effect.clone());
    }

    if !on_attrs.contains_key("color_mode") {
        let mode = current
            .attribute::<Vec<String>>("supported_color_modes")
            .and_then(|modes| modes.into_iter().next())
            .unwrap_or_else(|| "brightness".to_string());
        on_attrs.insert("color_mode".to_string(), json!(mode));
    }
    if !on_attrs.contains_key("brightness") && on_attrs["color_mode"] != "onoff" {
        on_attrs.insert("brightness".to_string(), json!(255));
    }
}

/// Keep kelvin and mireds in agreement
fn fill_color_temp(attrs: &mut Attributes) {
    let kelvin = attrs.get("color_temp_kelvin").and_then(Value::as_f64);
    let mireds = attrs.get("color_temp").and_then(Value::as_f64);
    match (kelvin, mireds) {
        (Some(k), None) if k > 0.0 => {
            attrs.insert("color_temp".to_string(), json!((1_000_000.0 / k).round() as i64));
        }
        (None, Some(m)) if m > 0.0 => {
            attrs.insert(
                "color_temp_kelvin".to_string(),
                json!((1_000_000.0 / m).round() as i64),
            );
        }
        _ => {}
    }
}

fn pick(attrs: &Attributes, keys: &[&str]) -> Attributes {
    attrs
        .iter()
        .filter(|(k, _)| keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn omit(attrs: &Attributes, keys: &[&str]) -> Attributes {
    attrs
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn required_string(field: &str) -> Value {
    json!({
        "type": "object",
        "required": [field],
        "properties": {field: {"type": "string", "minLength": 1}}
    })
}

fn required_number(field: &str, min: f64, max: f64) -> Value {
    json!({
        "type": "object",
        "required": [field],
        "properties": {field: {"type": "number", "minimum": min, "maximum": max}}
    })
}

/// Numbers without a fractional part print without one
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use res_scene_core::Context;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn setup() -> (Arc<StateStore>, ServiceRegistry) {
        let states = Arc::new(StateStore::new(Arc::new(EventBus::new())));
        let services = ServiceRegistry::new();
        VirtualDevices::new(states.clone())
            .register(&services)
            .unwrap();
        (states, services)
    }

    async fn call(services: &ServiceRegistry, domain: &str, service: &str, data: Value) {
        services
            .call(domain, service, data, Context::new(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_light_remembers_color_while_off() {
        let (states, services) = setup();
        let lamp = id("light.lamp");
        let attrs = HashMap::from([(
            "supported_color_modes".to_string(),
            json!(["hs", "color_temp"]),
        )]);
        states.set(lamp.clone(), STATE_OFF, attrs, Context::new());

        call(
            &services,
            "light",
            "turn_on",
            json!({"entity_id": "light.lamp", "hs_color": [30, 80], "brightness": 90}),
        )
        .await;
        let on = states.get(&lamp).unwrap();
        assert_eq!(on.attributes["color_mode"], json!("hs"));
        assert_eq!(on.attributes["brightness"], json!(90));

        call(&services, "light", "turn_off", json!({"entity_id": "light.lamp"})).await;
        let off = states.get(&lamp).unwrap();
        assert_eq!(off.state, STATE_OFF);
        assert!(!off.attributes.contains_key("hs_color"));

        call(&services, "light", "turn_on", json!({"entity_id": "light.lamp"})).await;
        let back = states.get(&lamp).unwrap();
        assert_eq!(back.attributes["hs_color"], json!([30, 80]));
        assert_eq!(back.attributes["brightness"], json!(90));
    }

    #[tokio::test]
    async fn test_light_color_temp_fills_both_units() {
        let (states, services) = setup();
        states.set(id("light.desk"), STATE_OFF, HashMap::new(), Context::new());
        call(
            &services,
            "light",
            "turn_on",
            json!({"entity_id": "light.desk", "color_temp_kelvin": 4000}),
        )
        .await;
        let on = states.get(&id("light.desk")).unwrap();
        assert_eq!(on.attributes["color_mode"], json!("color_temp"));
        assert_eq!(on.attributes["color_temp"], json!(250));
    }

    #[tokio::test]
    async fn test_cover_position_sets_status() {
        let (states, services) = setup();
        states.set(id("cover.blind"), STATE_OPEN, HashMap::new(), Context::new());
        call(
            &services,
            "cover",
            "set_cover_position",
            json!({"entity_id": "cover.blind", "position": 0}),
        )
        .await;
        let cover = states.get(&id("cover.blind")).unwrap();
        assert_eq!(cover.state, STATE_CLOSED);
        assert_eq!(cover.attributes["current_position"], json!(0));
    }

    #[tokio::test]
    async fn test_input_select_rejects_unknown_option() {
        let (states, services) = setup();
        let attrs = HashMap::from([("options".to_string(), json!(["a", "b"]))]);
        states.set(id("input_select.mode"), "a", attrs, Context::new());

        let result = services
            .call(
                "input_select",
                "select_option",
                json!({"entity_id": "input_select.mode", "option": "z"}),
                Context::new(),
                false,
            )
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidData(_))));
        assert_eq!(states.get_state(&id("input_select.mode")).unwrap(), "a");
    }

    #[tokio::test]
    async fn test_schema_rejects_missing_field() {
        let (_, services) = setup();
        let result = services.dispatch(
            "climate",
            "set_hvac_mode",
            json!({"entity_id": "climate.hall"}),
            Context::new(),
        );
        assert!(matches!(result, Err(ServiceError::InvalidData(_))));
    }
}
