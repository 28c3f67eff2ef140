//! Common resource generation utilities.
//!
//! Names, labels, annotations and owner references shared by every child
//! resource of a DragonflyDb.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::crd::DragonflyDb;
use crate::resources::FactoryError;

/// Value of the `app.kubernetes.io/managed-by` label.
pub const MANAGED_BY: &str = "dragonfly-operator";

/// Identity of the parent resource, resolved once per generation.
#[derive(Clone, Debug)]
pub struct ParentMeta {
    pub name: String,
    pub namespace: String,
    pub owner: OwnerReference,
}

impl ParentMeta {
    /// Resolve name, namespace and owner reference from a DragonflyDb.
    pub fn resolve(resource: &DragonflyDb) -> Result<Self, FactoryError> {
        let name = resource
            .meta()
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FactoryError::MissingField("metadata.name".to_string()))?;
        let namespace = resource
            .namespace()
            .ok_or_else(|| FactoryError::MissingField("metadata.namespace".to_string()))?;
        let owner = owner_reference(resource)?;
        Ok(Self {
            name,
            namespace,
            owner,
        })
    }
}

/// Standard labels applied to all managed resources, merged with user labels.
pub fn standard_labels(resource: &DragonflyDb) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    // User labels first so operator labels win on collision
    for (key, value) in &resource.spec.labels {
        labels.insert(key.clone(), value.clone());
    }
    labels.extend(selector_labels(resource));
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "cache".to_string(),
    );
    labels
}

/// Labels used to select the Dragonfly pod.
pub fn selector_labels(resource: &DragonflyDb) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "dragonfly".to_string()),
        (
            "app.kubernetes.io/instance".to_string(),
            resource.name_any(),
        ),
    ])
}

/// User annotations, or None when there are none.
pub fn standard_annotations(resource: &DragonflyDb) -> Option<BTreeMap<String, String>> {
    if resource.spec.annotations.is_empty() {
        None
    } else {
        Some(resource.spec.annotations.clone())
    }
}

/// Create the controller owner reference pointing back at the DragonflyDb.
pub fn owner_reference(resource: &DragonflyDb) -> Result<OwnerReference, FactoryError> {
    let uid = resource
        .uid()
        .ok_or_else(|| FactoryError::MissingField("metadata.uid".to_string()))?;
    Ok(OwnerReference {
        api_version: DragonflyDb::api_version(&()).to_string(),
        kind: DragonflyDb::kind(&()).to_string(),
        name: resource.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Object metadata for a child resource.
pub fn child_metadata(resource: &DragonflyDb, parent: &ParentMeta, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(parent.namespace.clone()),
        labels: Some(standard_labels(resource)),
        annotations: standard_annotations(resource),
        owner_references: Some(vec![parent.owner.clone()]),
        ..Default::default()
    }
}

/// Name of the ConfigMap holding the flag file.
pub fn config_map_name(name: &str) -> String {
    format!("{name}-config")
}
