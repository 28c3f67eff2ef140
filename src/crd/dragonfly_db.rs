//! DragonflyDb Custom Resource Definition.
//!
//! Defines the DragonflyDb CRD for deploying a single Dragonfly instance on
//! Kubernetes. The spec is only interpreted by the resource factory; the
//! status records whether the child resources have been created.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DragonflyDb is a custom resource for deploying a Dragonfly instance.
///
/// Example:
/// ```yaml
/// apiVersion: dragonflydb.io/v1alpha1
/// kind: DragonflyDb
/// metadata:
///   name: cache
/// spec:
///   image:
///     tag: v1.21.2
///   config:
///     maxmemory: 2gb
///     proactor_threads: "2"
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "dragonflydb.io",
    version = "v1alpha1",
    kind = "DragonflyDb",
    plural = "dragonflydbs",
    shortname = "dfdb",
    status = "DragonflyDbStatus",
    namespaced,
    printcolumn = r#"{"name":"Created", "type":"boolean", "jsonPath":".status.created"}"#,
    printcolumn = r#"{"name":"Image", "type":"string", "jsonPath":".spec.image.tag"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DragonflyDbSpec {
    /// Dragonfly container image configuration.
    #[serde(default)]
    pub image: ImageSpec,

    /// Client port Dragonfly listens on (default 6379).
    #[serde(default = "default_port")]
    pub port: i32,

    /// Extra command-line flags passed to the dragonfly binary verbatim.
    #[serde(default)]
    pub args: Vec<String>,

    /// Dragonfly flags rendered into the flag file, keyed by flag name
    /// without the leading dashes (e.g. `maxmemory: 2gb`).
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// Resource requests and limits for the Dragonfly pod.
    #[serde(default)]
    pub resources: ResourceRequirementsSpec,

    /// Additional labels to apply to all managed resources.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Additional annotations to apply to all managed resources.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Default for DragonflyDbSpec {
    fn default() -> Self {
        Self {
            image: ImageSpec::default(),
            port: default_port(),
            args: Vec::new(),
            config: BTreeMap::new(),
            resources: ResourceRequirementsSpec::default(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

fn default_port() -> i32 {
    DEFAULT_PORT
}

/// Container image specification.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Container image repository (default: docker.dragonflydb.io/dragonflydb/dragonfly).
    #[serde(default = "default_image_repository")]
    pub repository: String,

    /// Image tag (default: latest).
    #[serde(default = "default_image_tag")]
    pub tag: String,

    /// Image pull policy (default: IfNotPresent).
    #[serde(default = "default_image_pull_policy")]
    pub pull_policy: String,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            repository: default_image_repository(),
            tag: default_image_tag(),
            pull_policy: default_image_pull_policy(),
        }
    }
}

impl ImageSpec {
    /// Full image reference, `repository:tag`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

fn default_image_repository() -> String {
    "docker.dragonflydb.io/dragonflydb/dragonfly".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_image_pull_policy() -> String {
    "IfNotPresent".to_string()
}

/// Resource requirements for the Dragonfly container.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirementsSpec {
    /// Resource requests.
    #[serde(default)]
    pub requests: ResourceSpec,

    /// Resource limits.
    #[serde(default)]
    pub limits: ResourceLimitsSpec,
}

/// CPU and memory requests.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// CPU request (default: 500m).
    #[serde(default = "default_cpu_request")]
    pub cpu: String,

    /// Memory request (default: 1Gi).
    #[serde(default = "default_memory_request")]
    pub memory: String,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            cpu: default_cpu_request(),
            memory: default_memory_request(),
        }
    }
}

fn default_cpu_request() -> String {
    "500m".to_string()
}

fn default_memory_request() -> String {
    "1Gi".to_string()
}

/// CPU and memory limits.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimitsSpec {
    /// CPU limit (default: 2).
    #[serde(default = "default_cpu_limit")]
    pub cpu: String,

    /// Memory limit (default: 2Gi).
    #[serde(default = "default_memory_limit")]
    pub memory: String,
}

impl Default for ResourceLimitsSpec {
    fn default() -> Self {
        Self {
            cpu: default_cpu_limit(),
            memory: default_memory_limit(),
        }
    }
}

fn default_cpu_limit() -> String {
    "2".to_string()
}

fn default_memory_limit() -> String {
    "2Gi".to_string()
}

/// Status of a DragonflyDb resource.
///
/// `created` flips from false to true once, after every child resource has
/// been created. Nothing clears it again.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DragonflyDbStatus {
    /// Whether all child resources have been created.
    #[serde(default)]
    pub created: bool,

    /// Generation of the spec the child resources were created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl DragonflyDbStatus {
    /// Status recorded once creation has completed for `generation`.
    pub fn created_at(generation: Option<i64>) -> Self {
        Self {
            created: true,
            observed_generation: generation,
        }
    }
}

impl DragonflyDb {
    /// Whether the status records completed creation.
    pub fn is_created(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.created)
    }

    /// Namespaced identity of this resource.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(
            self.namespace().unwrap_or_else(|| "default".to_string()),
            self.name_any(),
        )
    }
}

/// Namespaced identity of a DragonflyDb, unique across the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Default client port for Dragonfly (Redis protocol).
pub const DEFAULT_PORT: i32 = 6379;
