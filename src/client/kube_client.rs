//! `ClusterStateClient` implementation backed by the Kubernetes API.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::{ClientError, ClusterStateClient};
use crate::crd::{DragonflyDb, ObjectKey};
use crate::resources::{ChildKind, ChildResource};

/// Cluster state client talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStateClient {
    client: Client,
    field_manager: String,
}

impl KubeStateClient {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    async fn create_namespaced<K>(&self, namespace: &str, obj: &K) -> Result<(), kube::Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&self.post_params(), obj).await?;
        Ok(())
    }

    async fn owner_uids<K>(&self, namespace: &str, name: &str) -> Result<Vec<String>, kube::Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let existing = api.get_metadata(name).await?;
        Ok(existing
            .metadata
            .owner_references
            .unwrap_or_default()
            .into_iter()
            .map(|owner| owner.uid)
            .collect())
    }
}

#[async_trait]
impl ClusterStateClient for KubeStateClient {
    async fn get(&self, key: &ObjectKey) -> Result<DragonflyDb, ClientError> {
        let api: Api<DragonflyDb> = Api::namespaced(self.client.clone(), &key.namespace);
        api.get(&key.name)
            .await
            .map_err(|e| ClientError::classify(e, "DragonflyDb", &key.to_string()))
    }

    async fn create(&self, child: &ChildResource) -> Result<(), ClientError> {
        let namespace = child.namespace().ok_or_else(|| {
            ClientError::InvalidObject(format!("{child} has no namespace"))
        })?;

        let result = match child {
            ChildResource::Workload(sts) => self.create_namespaced(namespace, sts).await,
            ChildResource::Endpoint(svc) => self.create_namespaced(namespace, svc).await,
            ChildResource::Config(cm) => self.create_namespaced(namespace, cm).await,
        };
        result.map_err(|e| ClientError::classify(e, child.kind().api_kind(), child.name()))?;

        debug!(kind = %child.kind(), name = %child.name(), namespace = %namespace, "Created child resource");
        Ok(())
    }

    async fn child_owner_uids(&self, child: &ChildResource) -> Result<Vec<String>, ClientError> {
        let namespace = child.namespace().ok_or_else(|| {
            ClientError::InvalidObject(format!("{child} has no namespace"))
        })?;

        let result = match child.kind() {
            ChildKind::Workload => self.owner_uids::<StatefulSet>(namespace, child.name()).await,
            ChildKind::Endpoint => self.owner_uids::<Service>(namespace, child.name()).await,
            ChildKind::Config => self.owner_uids::<ConfigMap>(namespace, child.name()).await,
        };
        result.map_err(|e| ClientError::classify(e, child.kind().api_kind(), child.name()))
    }

    async fn update_status(&self, resource: &DragonflyDb) -> Result<(), ClientError> {
        let key = resource.key();
        // The resource version turns the merge patch into a compare-and-swap:
        // the API server answers 409 if the object moved on since it was read.
        let resource_version = resource.resource_version().ok_or_else(|| {
            ClientError::InvalidObject(format!("DragonflyDb {key} has no resourceVersion"))
        })?;

        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": resource_version
            },
            "status": resource.status
        });

        let api: Api<DragonflyDb> = Api::namespaced(self.client.clone(), &key.namespace);
        api.patch_status(
            &key.name,
            &PatchParams::apply(&self.field_manager),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| ClientError::classify(e, "DragonflyDb", &key.to_string()))?;
        Ok(())
    }
}
