//! The `res_scene.yaml` document

use std::path::{Path, PathBuf};
use std::time::Duration;

use res_scene::options::seconds;
use res_scene::{
    EngineSettings, FallbackPolicy, OptionsOverlay, DEFAULT_ACTION_TIMEOUT, DEFAULT_COMMAND_DELAY,
};
use res_scene_core::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

/// Default file name inside the config directory
pub const CONFIG_FILE: &str = "res_scene.yaml";

/// An entity to create on startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySeed {
    pub entity_id: String,

    pub state: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default)]
    pub area: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,
}

impl EntitySeed {
    pub fn entity_id(&self) -> ConfigResult<EntityId> {
        self.entity_id
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "entities".to_string(),
                reason: format!("{}: {}", self.entity_id, e),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResSceneConfig {
    /// Directory holding `.storage/`
    pub config_dir: PathBuf,

    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    pub restore_light_attributes: bool,

    /// Seconds to wait for a light to confirm a command
    pub action_timeout: f64,

    /// Seconds between paced commands to one entity
    pub command_delay: f64,

    pub fallback_policy: FallbackPolicy,

    /// Seconds the simulated devices take to report a change
    pub device_latency: f64,

    pub entities: Vec<EntitySeed>,
}

impl Default for ResSceneConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            restore_light_attributes: false,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            command_delay: DEFAULT_COMMAND_DELAY,
            fallback_policy: FallbackPolicy::default(),
            device_latency: 0.0,
            entities: Vec::new(),
        }
    }
}

impl ResSceneConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str, path: &Path) -> ConfigResult<Self> {
        // An empty file is an empty mapping, not an error
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: ResSceneConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if seconds(self.action_timeout).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "action_timeout".to_string(),
                reason: format!("must be a positive number of seconds, got {}", self.action_timeout),
            });
        }
        for (key, value) in [
            ("command_delay", self.command_delay),
            ("device_latency", self.device_latency),
        ] {
            if value != 0.0 && seconds(value).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("must be zero or a positive number of seconds, got {}", value),
                });
            }
        }
        for seed in &self.entities {
            seed.entity_id()?;
        }
        Ok(())
    }

    /// The user-level option layer scenes resolve against
    pub fn user_options(&self) -> OptionsOverlay {
        OptionsOverlay {
            restore_light_attributes: Some(self.restore_light_attributes),
            action_timeout: Some(self.action_timeout),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            command_delay: seconds(self.command_delay).unwrap_or_default(),
            fallback_policy: self.fallback_policy,
        }
    }

    pub fn device_latency(&self) -> Duration {
        seconds(self.device_latency).unwrap_or_default()
    }
}

/// Load the configuration at `path`
///
/// A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ResSceneConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "No configuration file, using defaults");
        return Ok(ResSceneConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let config = ResSceneConfig::from_yaml_str(&content, path)?;
    debug!(path = %path.display(), entities = config.entities.len(), "Loaded configuration");
    Ok(config)
}
