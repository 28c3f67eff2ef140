//! Cluster state client module.
//!
//! The reconciler reads DragonflyDb objects, creates child resources and
//! writes the status subresource through the `ClusterStateClient` trait.
//! Production code uses `KubeStateClient`; tests substitute an in-memory store.
//!
//! ## Architecture
//!
//! - `error`: classified store errors (not found, already exists, conflict)
//! - `kube_client`: implementation over `kube::Api`

pub mod error;
pub mod kube_client;

use std::sync::Arc;

use async_trait::async_trait;

use crate::crd::{DragonflyDb, ObjectKey};
use crate::resources::ChildResource;

pub use error::ClientError;
pub use kube_client::KubeStateClient;

/// Access to the cluster state store needed by the reconciler.
#[async_trait]
pub trait ClusterStateClient: Send + Sync {
    /// Fetch a DragonflyDb by key. Missing objects yield `ClientError::NotFound`.
    async fn get(&self, key: &ObjectKey) -> Result<DragonflyDb, ClientError>;

    /// Create a child resource. Taken names yield `ClientError::AlreadyExists`.
    async fn create(&self, child: &ChildResource) -> Result<(), ClientError>;

    /// UIDs in the owner references of the existing object that `child`
    /// collides with. A missing object yields `ClientError::NotFound`.
    async fn child_owner_uids(&self, child: &ChildResource) -> Result<Vec<String>, ClientError>;

    /// Write only the status of `resource`, guarded by its resource version.
    /// A stale copy yields `ClientError::Conflict`.
    async fn update_status(&self, resource: &DragonflyDb) -> Result<(), ClientError>;
}

#[async_trait]
impl<T: ClusterStateClient + ?Sized> ClusterStateClient for Arc<T> {
    async fn get(&self, key: &ObjectKey) -> Result<DragonflyDb, ClientError> {
        (**self).get(key).await
    }

    async fn create(&self, child: &ChildResource) -> Result<(), ClientError> {
        (**self).create(child).await
    }

    async fn child_owner_uids(&self, child: &ChildResource) -> Result<Vec<String>, ClientError> {
        (**self).child_owner_uids(child).await
    }

    async fn update_status(&self, resource: &DragonflyDb) -> Result<(), ClientError> {
        (**self).update_status(resource).await
    }
}
