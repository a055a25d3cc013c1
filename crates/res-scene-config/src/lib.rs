//! Configuration for the scene engine
//!
//! Everything lives in one YAML file, `res_scene.yaml`; every key is
//! optional.
//!
//! ```yaml
//! config_dir: .
//! log_level: info
//! restore_light_attributes: false
//! action_timeout: 10.0
//! command_delay: 1.0
//! fallback_policy: drop
//! device_latency: 0.0
//! entities:
//!   - entity_id: light.sofa
//!     state: "on"
//!     attributes: {brightness: 120}
//!     area: living_room
//!     labels: [evening]
//! ```

mod config;
mod error;

pub use config::{load_config, EntitySeed, ResSceneConfig, CONFIG_FILE};
pub use error::{ConfigError, ConfigResult};
