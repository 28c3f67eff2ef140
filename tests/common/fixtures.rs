//! Test fixtures and builder patterns for DragonflyDb.

use std::collections::BTreeMap;

use dragonfly_operator::crd::{DragonflyDb, DragonflyDbSpec, DragonflyDbStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Builder for creating DragonflyDb test fixtures.
///
/// # Example
/// ```ignore
/// let resource = DragonflyDbBuilder::new("cache")
///     .namespace("cache-ns")
///     .config("maxmemory", "2gb")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct DragonflyDbBuilder {
    name: String,
    namespace: Option<String>,
    spec: DragonflyDbSpec,
    generation: Option<i64>,
    uid: Option<String>,
    resource_version: Option<String>,
    status: Option<DragonflyDbStatus>,
}

impl DragonflyDbBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uid: Some(format!("uid-{name}")),
            name,
            namespace: Some("default".to_string()),
            spec: DragonflyDbSpec::default(),
            generation: Some(1),
            resource_version: Some("1".to_string()),
            status: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.image.tag = tag.into();
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.spec.image.repository = repository.into();
        self
    }

    pub fn port(mut self, port: i32) -> Self {
        self.spec.port = port;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    /// Add a Dragonfly flag to the generated flagfile.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.config.insert(key.into(), value.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.labels.insert(key.into(), value.into());
        self
    }

    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Drop the UID, as for an object that was never persisted.
    pub fn without_uid(mut self) -> Self {
        self.uid = None;
        self
    }

    pub fn without_resource_version(mut self) -> Self {
        self.resource_version = None;
        self
    }

    pub fn status(mut self, created: bool) -> Self {
        self.status = Some(DragonflyDbStatus {
            created,
            observed_generation: self.generation,
        });
        self
    }

    /// Mark the resource as already provisioned.
    pub fn created(self) -> Self {
        self.status(true)
    }

    pub fn build(self) -> DragonflyDb {
        DragonflyDb {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: self.namespace,
                generation: self.generation,
                uid: self.uid,
                resource_version: self.resource_version,
                ..Default::default()
            },
            spec: self.spec,
            status: self.status,
        }
    }
}

impl Default for DragonflyDbBuilder {
    fn default() -> Self {
        Self::new("cache")
    }
}

/// A DragonflyDb with default spec in the `default` namespace.
pub fn test_resource(name: &str) -> DragonflyDb {
    DragonflyDbBuilder::new(name).build()
}

/// Labels map helper for assertions.
pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
