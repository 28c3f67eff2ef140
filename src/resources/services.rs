//! Service generation for Dragonfly.
//!
//! Creates the client Service: a ClusterIP endpoint named after the
//! DragonflyDb that exposes the Redis-protocol port.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::DragonflyDb;
use crate::resources::common::{ParentMeta, child_metadata, selector_labels};

/// Name of the client port on both the container and the Service.
pub const CLIENT_PORT_NAME: &str = "redis";

/// Generate the client Service for a DragonflyDb.
pub fn generate_client_service(resource: &DragonflyDb, parent: &ParentMeta) -> Service {
    Service {
        metadata: child_metadata(resource, parent, parent.name.clone()),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(resource)),
            ports: Some(vec![ServicePort {
                port: resource.spec.port,
                target_port: Some(IntOrString::String(CLIENT_PORT_NAME.to_string())),
                name: Some(CLIENT_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
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
    use crate::crd::DragonflyDbSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn test_resource(name: &str) -> DragonflyDb {
        DragonflyDb {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                uid: Some("test-uid".to_string()),
                ..Default::default()
            },
            spec: DragonflyDbSpec {
                port: 6380,
                ..Default::default()
            },
            status: None,
        }
    }

    #[test]
    fn test_generate_client_service() {
        let resource = test_resource("cache");
        let parent = ParentMeta::resolve(&resource).unwrap();
        let svc = generate_client_service(&resource, &parent);

        assert_eq!(svc.metadata.name, Some("cache".to_string()));
        assert_eq!(svc.metadata.namespace, Some("default".to_string()));
        assert_eq!(svc.metadata.owner_references.unwrap().len(), 1);

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_, Some("ClusterIP".to_string()));

        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports.first().unwrap().port, 6380);
        assert_eq!(
            ports.first().unwrap().name,
            Some(CLIENT_PORT_NAME.to_string())
        );
    }

    #[test]
    fn test_service_selects_instance() {
        let resource = test_resource("cache");
        let parent = ParentMeta::resolve(&resource).unwrap();
        let selector = generate_client_service(&resource, &parent)
            .spec
            .unwrap()
            .selector
            .unwrap();
        assert_eq!(
            selector.get("app.kubernetes.io/instance"),
            Some(&"cache".to_string())
        );
    }
}
