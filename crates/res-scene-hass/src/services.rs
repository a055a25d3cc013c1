//! Service registry with async handlers
//!
//! Services are registered per `domain.service` with an optional JSON
//! schema for their data. A service can be awaited with
//! [`ServiceRegistry::call`] or handed off with [`ServiceRegistry::dispatch`],
//! which validates synchronously and runs the handler on its own task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::JSONSchema;
use res_scene_core::Context;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Result type for service calls
pub type ServiceResult = Result<Option<Value>, ServiceError>;

/// Future type for async service handlers
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// Service handler function type
pub type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("invalid schema for {0}: {1}")]
    InvalidSchema(String, String),

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service call failed: {0}")]
    CallFailed(String),

    #[error("service does not support responses")]
    ResponseNotSupported,
}

/// Whether a service can return a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupportsResponse {
    #[default]
    None,
    Optional,
    Only,
}

/// One invocation of a service as seen by its handler
#[derive(Debug, Clone)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Value,
    pub context: Context,
}

impl ServiceCall {
    /// Typed data lookup; `None` when missing or of another type
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// A string field, trimmed; `None` when missing or blank
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// A field that may be a single string or a list of strings
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.data.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Entity ids in `entity_id`
    pub fn entity_ids(&self) -> Vec<String> {
        self.get_list("entity_id")
    }
}

struct RegisteredService {
    handler: ServiceHandler,
    schema: Option<Arc<JSONSchema>>,
    supports_response: SupportsResponse,
}

impl RegisteredService {
    fn validate(&self, key: &str, data: &Value) -> Result<(), ServiceError> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };
        schema.validate(data).map_err(|errors| {
            let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
            ServiceError::InvalidData(format!("{}: {}", key, reasons.join("; ")))
        })
    }
}

pub struct ServiceRegistry {
    /// Services keyed by "domain.service"
    services: DashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register (or replace) a service
    #[instrument(skip(self, handler, schema))]
    pub fn register<F, Fut>(
        &self,
        domain: &str,
        service: &str,
        handler: F,
        schema: Option<Value>,
        supports_response: SupportsResponse,
    ) -> Result<(), ServiceError>
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let key = format!("{}.{}", domain, service);

        let schema = match schema {
            Some(schema) => Some(Arc::new(
                JSONSchema::compile(&schema)
                    .map_err(|e| ServiceError::InvalidSchema(key.clone(), e.to_string()))?,
            )),
            None => None,
        };

        let handler: ServiceHandler =
            Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture);

        debug!("Registering service");
        self.services.insert(
            key,
            RegisteredService {
                handler,
                schema,
                supports_response,
            },
        );
        Ok(())
    }

    fn prepare(
        &self,
        domain: &str,
        service: &str,
        data: &Value,
        return_response: bool,
    ) -> Result<ServiceHandler, ServiceError> {
        let key = format!("{}.{}", domain, service);
        let registered = self.services.get(&key).ok_or_else(|| {
            warn!(domain, service, "Service not found");
            ServiceError::NotFound {
                domain: domain.to_string(),
                service: service.to_string(),
            }
        })?;

        if return_response && registered.supports_response == SupportsResponse::None {
            return Err(ServiceError::ResponseNotSupported);
        }
        registered.validate(&key, data)?;

        Ok(registered.handler.clone())
    }

    /// Call a service and wait for its handler to finish
    #[instrument(skip(self, data, context))]
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        context: Context,
        return_response: bool,
    ) -> ServiceResult {
        // The map guard is released before awaiting the handler
        let handler = self.prepare(domain, service, &data, return_response)?;

        debug!("Calling service");
        let result = handler(ServiceCall {
            domain: domain.to_string(),
            service: service.to_string(),
            data,
            context,
        })
        .await?;

        Ok(if return_response { result } else { None })
    }

    /// Validate and hand a call off to its own task without waiting
    ///
    /// Errors raised by the handler are only logged.
    #[instrument(skip(self, data, context))]
    pub fn dispatch(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        context: Context,
    ) -> Result<(), ServiceError> {
        let handler = self.prepare(domain, service, &data, false)?;
        let call = ServiceCall {
            domain: domain.to_string(),
            service: service.to_string(),
            data,
            context,
        };

        tokio::spawn(async move {
            let service_id = format!("{}.{}", call.domain, call.service);
            if let Err(e) = handler(call).await {
                warn!(service = %service_id, "Dispatched service failed: {}", e);
            }
        });
        Ok(())
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&format!("{}.{}", domain, service))
    }

    /// Service names registered for a domain, sorted
    pub fn domain_services(&self, domain: &str) -> Vec<String> {
        let prefix = format!("{}.", domain);
        let mut names: Vec<String> = self
            .services
            .iter()
            .filter_map(|s| s.key().strip_prefix(&prefix).map(String::from))
            .collect();
        names.sort();
        names
    }

    #[instrument(skip(self))]
    pub fn unregister(&self, domain: &str, service: &str) -> bool {
        self.services
            .remove(&format!("{}.{}", domain, service))
            .is_some()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedServiceRegistry = Arc<ServiceRegistry>;
