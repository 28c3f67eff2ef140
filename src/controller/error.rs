//! Error types for the controller.
//!
//! One variant per failure point of a reconcile, each classified for
//! retry behavior. A missing DragonflyDb on fetch is not an error and never
//! reaches this type.

use thiserror::Error;

use crate::client::ClientError;
use crate::controller::state_machine::TransitionError;
use crate::crd::ObjectKey;
use crate::resources::{ChildKind, FactoryError};

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching the DragonflyDb failed for a reason other than not-found
    #[error(transparent)]
    Fetch(ClientError),

    /// The resource factory rejected the spec; nothing was created
    #[error("Failed to compute resources for {key}: {source}")]
    SpecComputation {
        key: ObjectKey,
        #[source]
        source: FactoryError,
    },

    /// Creating a child resource failed; earlier children were left in place
    #[error("Failed to create {kind} {name}: {source}")]
    ChildCreation {
        kind: ChildKind,
        name: String,
        #[source]
        source: ClientError,
    },

    /// Writing `status.created` failed after all children were created
    #[error("Failed to update status of {key}: {source}")]
    StatusWrite {
        key: ObjectKey,
        #[source]
        source: ClientError,
    },

    /// The status state machine refused the transition
    #[error("Invalid state transition: {0}")]
    InvalidTransition(#[from] TransitionError),
}

impl Error {
    /// Check if this error indicates the DragonflyDb itself is gone
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Fetch(e) | Error::StatusWrite { source: e, .. } => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(e)
            | Error::ChildCreation { source: e, .. }
            | Error::StatusWrite { source: e, .. } => e.is_retryable(),
            Error::SpecComputation { .. } | Error::InvalidTransition(_) => false,
        }
    }

    /// Short machine-readable reason, used for Kubernetes events
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Fetch(_) => "FetchFailed",
            Error::SpecComputation { .. } => "InvalidSpec",
            Error::ChildCreation { .. } => "CreateFailed",
            Error::StatusWrite { .. } => "StatusUpdateFailed",
            Error::InvalidTransition(_) => "InvalidTransition",
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
