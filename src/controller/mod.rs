//! Controller module for dragonfly-operator.
//!
//! Contains the reconciliation core, the status state machine, error
//! handling, requeue backoff and the kube-runtime handlers.

pub mod backoff;
pub mod context;
pub mod error;
pub mod handlers;
pub mod reconciler;
pub mod state_machine;

pub use reconciler::{DuplicatePolicy, ReconcileOutcome, Reconciler};
