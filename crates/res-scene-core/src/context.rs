//! Causality tracking for commands and events

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies the operation a command or event belongs to
///
/// A scene apply or save creates one root context; every command it issues
/// carries a child of that context so the resulting state changes can be
/// traced back to the scene operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: None,
        }
    }

    /// A fresh context whose parent is `self`
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
