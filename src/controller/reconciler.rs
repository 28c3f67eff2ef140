//! Reconciliation core for DragonflyDb.
//!
//! `Reconciler::reconcile` drives one DragonflyDb from `created=false` to
//! `created=true`: fetch, compute the child resources, create them in order,
//! then record completion on the status subresource. It holds no state
//! between invocations and performs no retries; a failed invocation leaves
//! the resource uninitialized and the caller decides when to try again.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info};

use crate::client::{ClientError, ClusterStateClient};
use crate::controller::error::{Error, Result};
use crate::controller::state_machine::{CreationEvent, CreationPhase, CreationStateMachine};
use crate::crd::ObjectKey;
use crate::resources::{ChildResource, ResourceFactory};

/// How a create that hits an existing object with the same name is treated.
///
/// Children left behind by an interrupted creation pass are recreated on the
/// next attempt, so the choice decides whether a partial failure can heal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Count the existing object as created and continue with the next child,
    /// provided its owner references name this DragonflyDb. Objects owned by
    /// anything else still fail the reconcile.
    #[default]
    Adopt,
    /// Fail the reconcile like any other creation error
    Fail,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adopt" => Ok(DuplicatePolicy::Adopt),
            "fail" => Ok(DuplicatePolicy::Fail),
            other => Err(format!("unknown duplicate policy '{other}' (expected adopt or fail)")),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Adopt => write!(f, "adopt"),
            DuplicatePolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Successful result of a reconcile. Every variant is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The DragonflyDb no longer exists
    Absent,
    /// Status already records creation; nothing was done
    AlreadyCreated,
    /// Children were created (or adopted) and the status was written
    Created { created: usize, adopted: usize },
}

impl ReconcileOutcome {
    /// Whether the resource needs no further work from this controller
    pub fn is_settled(&self) -> bool {
        true
    }
}

/// Drives DragonflyDb resources to their created state.
pub struct Reconciler<C, F> {
    client: C,
    factory: F,
    duplicate_policy: DuplicatePolicy,
    state_machine: CreationStateMachine,
}

impl<C, F> Reconciler<C, F>
where
    C: ClusterStateClient,
    F: ResourceFactory,
{
    pub fn new(client: C, factory: F) -> Self {
        Self {
            client,
            factory,
            duplicate_policy: DuplicatePolicy::default(),
            state_machine: CreationStateMachine::new(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    /// Reconcile the DragonflyDb identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the fetch, the factory, a child create or
    /// the status write. Children created before the failure stay in place.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let mut resource = match self.client.get(key).await {
            Ok(resource) => resource,
            Err(e) if e.is_not_found() => {
                info!(key = %key, "DragonflyDb not found, assuming it was deleted");
                return Ok(ReconcileOutcome::Absent);
            }
            Err(e) => {
                error!(key = %key, error = %e, "Could not get DragonflyDb");
                return Err(Error::Fetch(e));
            }
        };

        info!(key = %key, "Reconciling DragonflyDb");

        // Spec edits after creation are not applied
        let phase = CreationPhase::of(resource.status.as_ref());
        if phase.is_terminal() {
            debug!(key = %key, "Resources already created, nothing to do");
            return Ok(ReconcileOutcome::AlreadyCreated);
        }

        info!(key = %key, "Creating resources");
        let children = self.factory.desired_resources(&resource).map_err(|e| {
            error!(key = %key, error = %e, "Could not compute resources");
            Error::SpecComputation {
                key: key.clone(),
                source: e,
            }
        })?;

        let mut created = 0;
        let mut adopted = 0;
        for child in &children {
            match self.client.create(child).await {
                Ok(()) => created += 1,
                Err(e) if e.is_already_exists() && self.duplicate_policy == DuplicatePolicy::Adopt => {
                    let uid = resource.metadata.uid.as_deref();
                    let owned = self.is_owned_by(child, uid).await.map_err(|source| {
                        error!(key = %key, kind = %child.kind(), name = %child.name(), error = %source, "Could not read existing resource");
                        Error::ChildCreation {
                            kind: child.kind(),
                            name: child.name().to_string(),
                            source,
                        }
                    })?;
                    if !owned {
                        error!(key = %key, kind = %child.kind(), name = %child.name(), "Resource already exists and is not owned by this DragonflyDb");
                        return Err(Error::ChildCreation {
                            kind: child.kind(),
                            name: child.name().to_string(),
                            source: e,
                        });
                    }
                    info!(key = %key, kind = %child.kind(), name = %child.name(), "Resource already exists, adopting");
                    adopted += 1;
                }
                Err(e) => {
                    error!(key = %key, kind = %child.kind(), name = %child.name(), error = %e, "Could not create resource");
                    return Err(Error::ChildCreation {
                        kind: child.kind(),
                        name: child.name().to_string(),
                        source: e,
                    });
                }
            }
        }

        let next = self
            .state_machine
            .transition(phase, CreationEvent::ChildrenCreated)?;
        resource.status = Some(next.status(resource.metadata.generation));

        if let Err(e) = self.client.update_status(&resource).await {
            error!(key = %key, error = %e, "Could not update DragonflyDb status");
            return Err(Error::StatusWrite {
                key: key.clone(),
                source: e,
            });
        }

        info!(key = %key, created, adopted, "Created resources for DragonflyDb");
        Ok(ReconcileOutcome::Created { created, adopted })
    }

    async fn is_owned_by(
        &self,
        child: &ChildResource,
        uid: Option<&str>,
    ) -> std::result::Result<bool, ClientError> {
        let Some(uid) = uid else {
            return Ok(false);
        };
        let owners = self.client.child_owner_uids(child).await?;
        Ok(owners.iter().any(|owner| owner == uid))
    }
}
