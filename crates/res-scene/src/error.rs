//! Error types for the scene engine

use res_scene_core::EntityId;
use res_scene_hass::{ServiceError, StorageError};
use thiserror::Error;

pub type SceneResult<T> = Result<T, SceneError>;

/// Failures surfaced by the scene manager's public operations
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene '{0}' already exists")]
    AlreadyExists(String),

    /// Raised only under the strict fallback policy
    #[error("scene '{scene_id}' could not capture {} entities: {missing:?}", missing.len())]
    IncompleteCapture {
        scene_id: String,
        missing: Vec<EntityId>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A command could not be handed to the host
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("service {0} is not registered")]
    UnknownService(String),

    #[error("command {service} rejected: {reason}")]
    Rejected { service: String, reason: String },
}

impl DispatchError {
    pub(crate) fn from_service(service: String, err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => Self::UnknownService(service),
            other => Self::Rejected {
                service,
                reason: other.to_string(),
            },
        }
    }
}

/// Why no commands were planned for an entity
///
/// These are diagnostics; none of them fails an apply.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("{0} belongs to a domain that cannot be restored")]
    NotRestorable(EntityId),

    #[error("{0} belongs to a domain without restore rules")]
    UnsupportedDomain(EntityId),

    #[error("{0} has no saved status")]
    MissingState(EntityId),

    #[error("saved status {status:?} of {entity_id} cannot be restored")]
    InvalidState { entity_id: EntityId, status: String },

    #[error("unknown media_player status {status:?} for {entity_id}")]
    UnknownMediaState { entity_id: EntityId, status: String },

    #[error("{0} is missing, unavailable or unknown")]
    UnusableTarget(EntityId),
}
