//! kube-runtime entry points for the DragonflyDb controller.
//!
//! `reconcile` and `error_policy` adapt the reconciler to
//! `kube::runtime::Controller`: they translate outcomes into actions,
//! publish Kubernetes events, record metrics and apply the per-key backoff.

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, warn};

use crate::client::ClusterStateClient;
use crate::controller::context::Context;
use crate::controller::error::Error;
use crate::controller::reconciler::ReconcileOutcome;
use crate::crd::{DragonflyDb, ObjectKey};
use crate::resources::ResourceFactory;

/// Reconcile a DragonflyDb on behalf of the controller runtime.
///
/// Settled outcomes wait for the next watch event; there is no periodic resync.
pub async fn reconcile<C, F>(obj: Arc<DragonflyDb>, ctx: Arc<Context<C, F>>) -> Result<Action, Error>
where
    C: ClusterStateClient,
    F: ResourceFactory,
{
    let start_time = Instant::now();
    let key = obj.key();

    debug!(name = %key.name, namespace = %key.namespace, "Reconcile triggered");

    let result = ctx.reconciler.reconcile(&key).await;

    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_reconcile(
            &key.namespace,
            &key.name,
            start_time.elapsed().as_secs_f64(),
        );
    }

    match result {
        Ok(outcome) => {
            ctx.backoff.reset(&key);
            if let ReconcileOutcome::Created { created, adopted } = outcome {
                if let Some(ref health_state) = ctx.health_state {
                    health_state.metrics.record_children(created, adopted);
                    health_state.touch_last_reconcile();
                }
                ctx.publish_normal_event(
                    &obj,
                    "Created",
                    "CreateResources",
                    Some(format!(
                        "Created {created} resources ({adopted} already existed)"
                    )),
                )
                .await;
            }
            Ok(Action::await_change())
        }
        Err(e) => {
            if !e.is_not_found() {
                ctx.publish_warning_event(&obj, e.reason(), "CreateResources", Some(e.to_string()))
                    .await;
            }
            Err(e)
        }
    }
}

/// Error policy for the controller
pub fn error_policy<C, F>(obj: Arc<DragonflyDb>, error: &Error, ctx: Arc<Context<C, F>>) -> Action {
    let name = obj.name_any();
    let key = obj.key();

    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&key.namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        ctx.backoff.reset(&key);
        return Action::await_change();
    }

    if error.is_retryable() {
        let delay = ctx.backoff.next_delay(&key);
        warn!(name = %name, error = %error, delay_secs = delay.as_secs(), "Retryable error, will retry");
        Action::requeue(delay)
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
        Action::requeue(ctx.backoff.max_delay())
    }
}

/// Drop the retry history of an object the runtime no longer finds.
///
/// Requeues of deleted objects never reach `reconcile`, so their backoff
/// entry would otherwise outlive them and leak into a recreated object.
pub fn forget_object<C, F>(ctx: &Context<C, F>, key: &ObjectKey) {
    debug!(key = %key, "Object gone, clearing requeue backoff");
    ctx.backoff.reset(key);
}
