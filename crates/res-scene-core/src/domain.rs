//! Entity categories
//!
//! The domain half of an entity id decides how a scene captures and
//! restores that entity. Unknown domains are kept as `Other` so they can
//! still be snapshotted.

use std::fmt;

/// Domains that only report state; they are never captured into a scene
/// and never receive restore commands.
pub const NON_RESTORABLE_DOMAINS: &[&str] = &[
    "sensor",
    "binary_sensor",
    "device_tracker",
    "camera",
    "vacuum",
    "scene",
    "script",
];

/// Category tag of an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    Light,
    Cover,
    Climate,
    MediaPlayer,
    Lock,
    Fan,
    Humidifier,
    Remote,
    Siren,
    Switch,
    InputBoolean,
    InputNumber,
    InputSelect,
    InputText,
    Sensor,
    BinarySensor,
    DeviceTracker,
    Camera,
    Vacuum,
    Scene,
    Script,
    Other(String),
}

impl Domain {
    pub fn parse(domain: &str) -> Self {
        match domain {
            "light" => Self::Light,
            "cover" => Self::Cover,
            "climate" => Self::Climate,
            "media_player" => Self::MediaPlayer,
            "lock" => Self::Lock,
            "fan" => Self::Fan,
            "humidifier" => Self::Humidifier,
            "remote" => Self::Remote,
            "siren" => Self::Siren,
            "switch" => Self::Switch,
            "input_boolean" => Self::InputBoolean,
            "input_number" => Self::InputNumber,
            "input_select" => Self::InputSelect,
            "input_text" => Self::InputText,
            "sensor" => Self::Sensor,
            "binary_sensor" => Self::BinarySensor,
            "device_tracker" => Self::DeviceTracker,
            "camera" => Self::Camera,
            "vacuum" => Self::Vacuum,
            "scene" => Self::Scene,
            "script" => Self::Script,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Light => "light",
            Self::Cover => "cover",
            Self::Climate => "climate",
            Self::MediaPlayer => "media_player",
            Self::Lock => "lock",
            Self::Fan => "fan",
            Self::Humidifier => "humidifier",
            Self::Remote => "remote",
            Self::Siren => "siren",
            Self::Switch => "switch",
            Self::InputBoolean => "input_boolean",
            Self::InputNumber => "input_number",
            Self::InputSelect => "input_select",
            Self::InputText => "input_text",
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::DeviceTracker => "device_tracker",
            Self::Camera => "camera",
            Self::Vacuum => "vacuum",
            Self::Scene => "scene",
            Self::Script => "script",
            Self::Other(name) => name,
        }
    }

    /// Whether entities of this domain may appear in a scene at all
    pub fn is_restorable(&self) -> bool {
        !NON_RESTORABLE_DOMAINS.contains(&self.as_str())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
