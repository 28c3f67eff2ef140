//! Resource generation module.
//!
//! Turns a DragonflyDb into the ordered list of child objects the
//! reconciler creates.
//!
//! ## Resources Generated
//!
//! | Order | Resource | Purpose |
//! |-------|----------|---------|
//! | 1 | StatefulSet `<name>` | Runs the Dragonfly pod |
//! | 2 | Service `<name>` | Client endpoint |
//! | 3 | ConfigMap `<name>-config` | Dragonfly flag file |

pub mod common;
pub mod configmap;
pub mod services;
pub mod statefulset;

use std::fmt;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::Resource;
use thiserror::Error;

use crate::crd::DragonflyDb;
use crate::resources::common::ParentMeta;

// Re-export commonly used items from common
pub use common::{owner_reference, standard_labels};

/// Errors computing the desired child resources from a spec.
#[derive(Error, Debug)]
pub enum FactoryError {
    /// Missing required field in the resource
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Spec value that cannot be turned into a child resource
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Kind of a child resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildKind {
    Workload,
    Endpoint,
    Config,
}

impl ChildKind {
    /// Kubernetes kind backing this child.
    pub fn api_kind(&self) -> &'static str {
        match self {
            ChildKind::Workload => "StatefulSet",
            ChildKind::Endpoint => "Service",
            ChildKind::Config => "ConfigMap",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKind::Workload => write!(f, "workload"),
            ChildKind::Endpoint => write!(f, "endpoint"),
            ChildKind::Config => write!(f, "config"),
        }
    }
}

/// A child object of a DragonflyDb, carrying its own creation payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ChildResource {
    Workload(StatefulSet),
    Endpoint(Service),
    Config(ConfigMap),
}

impl ChildResource {
    pub fn kind(&self) -> ChildKind {
        match self {
            ChildResource::Workload(_) => ChildKind::Workload,
            ChildResource::Endpoint(_) => ChildKind::Endpoint,
            ChildResource::Config(_) => ChildKind::Config,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    pub fn metadata(&self) -> &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
        match self {
            ChildResource::Workload(o) => o.meta(),
            ChildResource::Endpoint(o) => o.meta(),
            ChildResource::Config(o) => o.meta(),
        }
    }
}

impl fmt::Display for ChildResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\"{}\"", self.kind(), self.name())
    }
}

/// Computes the child resources a DragonflyDb should have.
///
/// Implementations must be deterministic and must not read cluster state:
/// the same resource always yields the same list, so a failed creation
/// pass can be retried from the top.
pub trait ResourceFactory: Send + Sync {
    fn desired_resources(&self, resource: &DragonflyDb) -> Result<Vec<ChildResource>, FactoryError>;
}

/// Factory producing the StatefulSet, Service and ConfigMap for Dragonfly.
#[derive(Clone, Copy, Debug, Default)]
pub struct DragonflyResourceFactory;

impl ResourceFactory for DragonflyResourceFactory {
    fn desired_resources(&self, resource: &DragonflyDb) -> Result<Vec<ChildResource>, FactoryError> {
        validate_spec(resource)?;
        let parent = ParentMeta::resolve(resource)?;

        Ok(vec![
            ChildResource::Workload(statefulset::generate_statefulset(resource, &parent)),
            ChildResource::Endpoint(services::generate_client_service(resource, &parent)),
            ChildResource::Config(configmap::generate_configmap(resource, &parent)?),
        ])
    }
}

fn validate_spec(resource: &DragonflyDb) -> Result<(), FactoryError> {
    let spec = &resource.spec;
    if spec.image.repository.trim().is_empty() {
        return Err(FactoryError::Validation(
            "image.repository must not be empty".to_string(),
        ));
    }
    if spec.image.tag.trim().is_empty() {
        return Err(FactoryError::Validation(
            "image.tag must not be empty".to_string(),
        ));
    }
    if !(1..=65535).contains(&spec.port) {
        return Err(FactoryError::Validation(format!(
            "port must be between 1 and 65535, got {}",
            spec.port
        )));
    }
    Ok(())
}
