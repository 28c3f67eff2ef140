// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the DragonflyDb reconcile loop.
//!
//! The reconciler and the controller handlers run against an in-memory
//! state store, so no Kubernetes cluster is needed.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_first_reconcile_creates_children_in_order
//! ```
//!
//! ## Test Categories
//!
//! - **Scenario tests**: reconcile sequences against the store, including
//!   partial failures, retries and duplicate handling
//! - **Handler tests**: requeue actions, backoff and metrics of the
//!   kube-runtime entry points

#[path = "../common/fixtures.rs"]
#[allow(dead_code)]
mod fixtures;
mod scenario_tests;

pub use mock_state::*;
