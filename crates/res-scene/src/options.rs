//! Restoration options
//!
//! Options come in three layers: built-in defaults, the user's global
//! options and an optional per-scene overlay stored with the scene. Each
//! layer only overrides what it sets.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Seconds to wait for a confirmed command to take effect
pub const DEFAULT_ACTION_TIMEOUT: f64 = 10.0;

/// Seconds between consecutive paced commands to one entity
pub const DEFAULT_COMMAND_DELAY: f64 = 1.0;

/// A partial set of options; unset fields defer to the layer below
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsOverlay {
    /// Capture and restore light attributes even while the light is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_light_attributes: Option<bool>,

    /// Confirmation timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_timeout: Option<f64>,
}

impl OptionsOverlay {
    pub fn is_empty(&self) -> bool {
        self.restore_light_attributes.is_none() && self.action_timeout.is_none()
    }

    /// `self` with every field `other` sets replaced
    pub fn merged(&self, other: &OptionsOverlay) -> OptionsOverlay {
        OptionsOverlay {
            restore_light_attributes: other
                .restore_light_attributes
                .or(self.restore_light_attributes),
            action_timeout: other.action_timeout.or(self.action_timeout),
        }
    }
}

/// Fully resolved options used while capturing and restoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreOptions {
    pub restore_light_attributes: bool,
    pub action_timeout: Duration,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            restore_light_attributes: false,
            action_timeout: Duration::from_secs_f64(DEFAULT_ACTION_TIMEOUT),
        }
    }
}

impl RestoreOptions {
    /// Apply one overlay on top of these options
    ///
    /// A timeout that is not a positive finite number of seconds is ignored.
    pub fn overlay(mut self, overlay: &OptionsOverlay) -> Self {
        if let Some(restore) = overlay.restore_light_attributes {
            self.restore_light_attributes = restore;
        }
        if let Some(secs) = overlay.action_timeout {
            match seconds(secs) {
                Some(timeout) => self.action_timeout = timeout,
                None => warn!(action_timeout = secs, "Ignoring invalid action_timeout"),
            }
        }
        self
    }

    /// Defaults, then user options, then the scene's overlay
    pub fn resolve(user: &OptionsOverlay, scene: Option<&OptionsOverlay>) -> Self {
        let options = Self::default().overlay(user);
        match scene {
            Some(scene) => options.overlay(scene),
            None => options,
        }
    }
}

/// What to do with requested entities that end up with no snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Leave them out of the scene and log a warning
    #[default]
    Drop,
    /// Reject the whole save
    Strict,
}

/// Engine-wide settings fixed at startup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Pause between consecutive paced commands to the same entity
    pub command_delay: Duration,
    pub fallback_policy: FallbackPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_delay: Duration::from_secs_f64(DEFAULT_COMMAND_DELAY),
            fallback_policy: FallbackPolicy::Drop,
        }
    }
}

/// A positive finite number of seconds as a duration
///
/// `None` for zero, negatives, NaN, infinities and values too large for a
/// `Duration`.
pub fn seconds(secs: f64) -> Option<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
