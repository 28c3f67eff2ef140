//! Shared context for the controller.
//!
//! The Context struct holds shared state that is passed to the kube-runtime
//! handlers: the reconciler with its collaborators, the requeue backoff,
//! the event recorder and the optional health state.

use std::sync::Arc;

use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};

use crate::client::KubeStateClient;
use crate::config::OperatorConfig;
use crate::controller::backoff::RequeueBackoff;
use crate::controller::reconciler::Reconciler;
use crate::crd::DragonflyDb;
use crate::health::HealthState;
use crate::resources::DragonflyResourceFactory;

/// Field manager name for the operator
pub const FIELD_MANAGER: &str = "dragonfly-operator";

/// Context wired to the Kubernetes API
pub type KubeContext = Context<KubeStateClient, DragonflyResourceFactory>;

/// Shared context for the controller
pub struct Context<C, F> {
    /// Reconciler with its state client and resource factory
    pub reconciler: Reconciler<C, F>,
    /// Per-key requeue backoff
    pub backoff: RequeueBackoff,
    /// Event recorder; None when running without an API server
    recorder: Option<Recorder>,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
}

impl KubeContext {
    /// Create a context talking to the cluster through `client`
    pub fn new(
        client: Client,
        config: &OperatorConfig,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        let reconciler = Reconciler::new(
            KubeStateClient::new(client.clone(), FIELD_MANAGER),
            DragonflyResourceFactory,
        )
        .with_duplicate_policy(config.duplicate_policy);

        let reporter = Reporter {
            controller: FIELD_MANAGER.into(),
            instance: Some(config.pod_name.clone()),
        };

        Self {
            reconciler,
            backoff: RequeueBackoff::new(config.requeue_base, config.requeue_max),
            recorder: Some(Recorder::new(client, reporter)),
            health_state,
        }
    }
}

impl<C, F> Context<C, F> {
    /// Create a context from pre-built parts, without event publishing
    pub fn from_parts(
        reconciler: Reconciler<C, F>,
        backoff: RequeueBackoff,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            reconciler,
            backoff,
            recorder: None,
            health_state,
        }
    }

    /// Publish a normal event for a resource
    pub async fn publish_normal_event(
        &self,
        resource: &DragonflyDb,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish(resource, EventType::Normal, reason, action, note)
            .await;
    }

    /// Publish a warning event for a resource
    pub async fn publish_warning_event(
        &self,
        resource: &DragonflyDb,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish(resource, EventType::Warning, reason, action, note)
            .await;
    }

    async fn publish(
        &self,
        resource: &DragonflyDb,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let object_ref = resource.object_ref(&());
        if let Err(e) = recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note,
                    action: action.into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}
