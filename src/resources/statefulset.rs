//! StatefulSet generation for Dragonfly.
//!
//! Creates a single-replica StatefulSet running Dragonfly:
//! - Flag file mounted from the generated ConfigMap
//! - Scratch volume for snapshots
//! - TCP liveness/readiness probes on the client port
//! - Non-root, capability-less security context

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource,
    PodSecurityContext, PodSpec, PodTemplateSpec, Probe, ResourceRequirements, SeccompProfile,
    SecurityContext, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::DragonflyDb;
use crate::resources::common::{
    ParentMeta, child_metadata, config_map_name, selector_labels, standard_annotations,
    standard_labels,
};
use crate::resources::configmap::FLAGFILE_KEY;
use crate::resources::services::CLIENT_PORT_NAME;

/// Mount path of the flag file volume
const CONFIG_MOUNT_PATH: &str = "/etc/dragonfly";
/// Mount path of the snapshot directory
const DATA_MOUNT_PATH: &str = "/data";
/// Dragonfly user ID in the official container image
const DRAGONFLY_USER_ID: i64 = 999;
/// Grace period for Dragonfly to flush a snapshot on shutdown
const TERMINATION_GRACE_PERIOD: i64 = 30;

/// Generate the StatefulSet for a DragonflyDb.
///
/// Always one replica; the operator does not scale Dragonfly horizontally.
pub fn generate_statefulset(resource: &DragonflyDb, parent: &ParentMeta) -> StatefulSet {
    StatefulSet {
        metadata: child_metadata(resource, parent, parent.name.clone()),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: Some(parent.name.clone()),
            selector: LabelSelector {
                match_labels: Some(selector_labels(resource)),
                ..Default::default()
            },
            template: generate_pod_template(resource, parent),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn generate_pod_template(resource: &DragonflyDb, parent: &ParentMeta) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(standard_labels(resource)),
            annotations: standard_annotations(resource),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD),
            security_context: Some(PodSecurityContext {
                run_as_non_root: Some(true),
                run_as_user: Some(DRAGONFLY_USER_ID),
                fs_group: Some(DRAGONFLY_USER_ID),
                seccomp_profile: Some(SeccompProfile {
                    type_: "RuntimeDefault".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            containers: vec![generate_dragonfly_container(resource)],
            volumes: Some(generate_volumes(parent)),
            ..Default::default()
        }),
    }
}

fn generate_dragonfly_container(resource: &DragonflyDb) -> Container {
    let mut args = vec![format!("--flagfile={CONFIG_MOUNT_PATH}/{FLAGFILE_KEY}")];
    args.extend(resource.spec.args.iter().cloned());

    Container {
        name: "dragonfly".to_string(),
        image: Some(resource.spec.image.reference()),
        image_pull_policy: Some(resource.spec.image.pull_policy.clone()),
        args: Some(args),
        ports: Some(vec![ContainerPort {
            container_port: resource.spec.port,
            name: Some(CLIENT_PORT_NAME.to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        resources: Some(generate_resource_requirements(resource)),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "config".to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: "data".to_string(),
                mount_path: DATA_MOUNT_PATH.to_string(),
                ..Default::default()
            },
        ]),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            read_only_root_filesystem: Some(true),
            run_as_non_root: Some(true),
            capabilities: Some(Capabilities {
                drop: Some(vec!["ALL".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        liveness_probe: Some(tcp_probe(10, 10)),
        readiness_probe: Some(tcp_probe(5, 5)),
        ..Default::default()
    }
}

fn tcp_probe(initial_delay_seconds: i32, period_seconds: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::String(CLIENT_PORT_NAME.to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_seconds),
        period_seconds: Some(period_seconds),
        timeout_seconds: Some(5),
        failure_threshold: Some(3),
        ..Default::default()
    }
}

fn generate_resource_requirements(resource: &DragonflyDb) -> ResourceRequirements {
    let spec = &resource.spec.resources;
    ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(spec.requests.cpu.clone())),
            ("memory".to_string(), Quantity(spec.requests.memory.clone())),
        ])),
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(spec.limits.cpu.clone())),
            ("memory".to_string(), Quantity(spec.limits.memory.clone())),
        ])),
        ..Default::default()
    }
}

fn generate_volumes(parent: &ParentMeta) -> Vec<Volume> {
    vec![
        Volume {
            name: "config".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name(&parent.name),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "data".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ]
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::crd::{DragonflyDbSpec, ImageSpec};

    fn test_resource(name: &str) -> DragonflyDb {
        DragonflyDb {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: Some("test-uid".to_string()),
                ..Default::default()
            },
            spec: DragonflyDbSpec {
                image: ImageSpec {
                    tag: "v1.21.2".to_string(),
                    ..Default::default()
                },
                args: vec!["--cache_mode=true".to_string()],
                ..Default::default()
            },
            status: None,
        }
    }

    fn container(sts: &StatefulSet) -> Container {
        sts.spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers
            .first()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_generate_statefulset() {
        let resource = test_resource("cache");
        let parent = ParentMeta::resolve(&resource).unwrap();
        let sts = generate_statefulset(&resource, &parent);

        assert_eq!(sts.metadata.name, Some("cache".to_string()));
        assert_eq!(sts.metadata.namespace, Some("default".to_string()));
        let spec = sts.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.service_name, Some("cache".to_string()));
        assert_eq!(spec.selector.match_labels, Some(selector_labels(&resource)));
    }

    #[test]
    fn test_container_args_and_image() {
        let resource = test_resource("cache");
        let parent = ParentMeta::resolve(&resource).unwrap();
        let c = container(&generate_statefulset(&resource, &parent));

        assert_eq!(
            c.image,
            Some("docker.dragonflydb.io/dragonflydb/dragonfly:v1.21.2".to_string())
        );
        assert_eq!(
            c.args,
            Some(vec![
                "--flagfile=/etc/dragonfly/dragonfly.conf".to_string(),
                "--cache_mode=true".to_string(),
            ])
        );
        let ports = c.ports.unwrap();
        assert_eq!(ports.first().unwrap().container_port, 6379);
    }

    #[test]
    fn test_config_volume_references_configmap() {
        let resource = test_resource("cache");
        let parent = ParentMeta::resolve(&resource).unwrap();
        let sts = generate_statefulset(&resource, &parent);
        let volumes = sts.spec.unwrap().template.spec.unwrap().volumes.unwrap();

        let config = volumes.iter().find(|v| v.name == "config").unwrap();
        assert_eq!(
            config.config_map.as_ref().unwrap().name,
            "cache-config".to_string()
        );
        assert!(volumes.iter().any(|v| v.name == "data"));
    }

    #[test]
    fn test_resource_requirements() {
        let resource = test_resource("cache");
        let parent = ParentMeta::resolve(&resource).unwrap();
        let resources = container(&generate_statefulset(&resource, &parent))
            .resources
            .unwrap();

        let limits = resources.limits.unwrap();
        assert_eq!(limits.get("memory"), Some(&Quantity("2Gi".to_string())));
        let requests = resources.requests.unwrap();
        assert_eq!(requests.get("cpu"), Some(&Quantity("500m".to_string())));
    }
}
