//! dragonfly-operator library crate
//!
//! This module exports the controller, CRD definitions, resource generators
//! and the cluster state client.

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod leader;
pub mod resources;

pub use config::{ConfigError, OperatorConfig};
pub use health::HealthState;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, metadata_watcher, predicates, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use client::KubeStateClient;
use controller::context::KubeContext;
use controller::handlers;
use crd::{DragonflyDb, ObjectKey};
use resources::DragonflyResourceFactory;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a reflector-backed stream of DragonflyDb objects.
///
/// Watch errors are retried with backoff, deletions are dropped, and
/// status-only updates are filtered out by the generation predicate so the
/// operator's own status write does not trigger another reconcile.
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// Run the DragonflyDb controller until its watch stream ends.
///
/// Watches `config.watch_namespace` (cluster-wide when unset) and reconciles
/// at most `config.max_concurrent_reconciles` objects at once. Reconciles of
/// the same object never overlap.
pub async fn run_controller(
    client: Client,
    config: &OperatorConfig,
    health_state: Option<Arc<HealthState>>,
) {
    let namespace = config.watch_namespace.as_deref();
    info!(
        scope = namespace.unwrap_or("cluster-wide"),
        concurrency = config.max_concurrent_reconciles,
        duplicate_policy = %config.duplicate_policy,
        "Starting controller for DragonflyDb resources"
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(KubeContext::new(client.clone(), config, health_state));

    let dragonflies: Api<DragonflyDb> = scoped_api(client.clone(), namespace);
    let statefulsets: Api<StatefulSet> = scoped_api(client.clone(), namespace);
    let services: Api<Service> = scoped_api(client.clone(), namespace);
    let configmaps: Api<ConfigMap> = scoped_api(client, namespace);

    let watcher_config = default_watcher_config();
    let (reader, resource_stream) = create_filtered_stream(dragonflies, watcher_config.clone());

    let controller_config =
        ControllerConfig::default().concurrency(config.max_concurrent_reconciles);

    let policy_ctx = ctx.clone();

    // Services and ConfigMaps are watched by metadata only
    Controller::for_stream(resource_stream, reader)
        .with_config(controller_config)
        .owns(statefulsets, watcher_config.clone())
        .owns_stream(metadata_watcher(services, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(configmaps, watcher_config).touched_objects())
        .run(
            handlers::reconcile::<KubeStateClient, DragonflyResourceFactory>,
            handlers::error_policy::<KubeStateClient, DragonflyResourceFactory>,
            ctx,
        )
        .for_each(|result| {
            let ctx = policy_ctx.clone();
            async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!("Reconciled: {}", obj.name);
                    }
                    Err(e) => {
                        let is_not_found = match &e {
                            kube::runtime::controller::Error::ObjectNotFound(obj_ref) => {
                                let key = ObjectKey::new(
                                    obj_ref.namespace.clone().unwrap_or_default(),
                                    obj_ref.name.clone(),
                                );
                                handlers::forget_object(&ctx, &key);
                                true
                            }
                            kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                                err.is_not_found()
                            }
                            _ => false,
                        };
                        if is_not_found {
                            debug!("Object no longer exists (likely deleted): {:?}", e);
                        } else {
                            error!("Reconciliation error: {:?}", e);
                        }
                    }
                }
            }
        })
        .await;

    error!("Controller stream ended unexpectedly");
}
