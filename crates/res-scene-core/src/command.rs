//! A single service invocation aimed at one entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Context, EntityId};

/// A device command: `domain.service` with data, targeting one entity
///
/// The target is kept apart from the payload; [`Command::service_data`]
/// merges it back in as `entity_id` when the command is handed to the
/// service registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Service domain, e.g. "light"
    pub domain: String,

    /// Service name, e.g. "turn_on"
    pub service: String,

    pub target: EntityId,

    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(default)]
    pub context: Context,
}

impl Command {
    pub fn new(domain: impl Into<String>, service: impl Into<String>, target: EntityId) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            target,
            data: Map::new(),
            context: Context::new(),
        }
    }

    /// Add one payload field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// `domain.service`
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Payload including the target's `entity_id`
    pub fn service_data(&self) -> Value {
        let mut data = self.data.clone();
        data.insert("entity_id".to_string(), Value::String(self.target.to_string()));
        Value::Object(data)
    }

    /// Typed payload lookup
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
