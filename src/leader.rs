//! Lease-based leader election.
//!
//! Only the lease holder runs the controller. Losing the lease ends the
//! process so the pod restarts and re-enters the election.

use std::time::Duration;

use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tracing::{error, info, warn};

use crate::config::OperatorConfig;

pub const LEASE_NAME: &str = "dragonfly-operator-leader";
const LEASE_TTL_SECS: u64 = 15;
const LEASE_RENEW_INTERVAL_SECS: u64 = 5;

/// Lease parameters for this pod
pub fn lease_params(config: &OperatorConfig) -> LeaseLockParams {
    LeaseLockParams {
        holder_id: config.pod_name.clone(),
        lease_name: LEASE_NAME.to_string(),
        lease_ttl: Duration::from_secs(LEASE_TTL_SECS),
    }
}

/// Lease lock in the operator's own namespace
pub fn lease_lock(client: Client, config: &OperatorConfig) -> LeaseLock {
    info!(
        holder_id = %config.pod_name,
        namespace = %config.pod_namespace,
        lease_name = LEASE_NAME,
        "Initializing leader election"
    );
    LeaseLock::new(client, &config.pod_namespace, lease_params(config))
}

/// Block until this instance holds the lease
pub async fn acquire_leadership(lease_lock: &LeaseLock) {
    info!("Waiting to acquire leadership...");
    loop {
        match lease_lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("Acquired leadership");
                return;
            }
            Ok(_) => info!("Another instance is leader, waiting..."),
            Err(e) => warn!("Failed to acquire lease: {}, retrying...", e),
        }
        tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;
    }
}

/// Keep renewing the lease; exit the process when it is lost.
#[allow(clippy::exit)]
pub async fn renew_leadership(lease_lock: LeaseLock) {
    loop {
        tokio::time::sleep(Duration::from_secs(LEASE_RENEW_INTERVAL_SECS)).await;

        match lease_lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {}
            Ok(_) => {
                error!("Lost leadership! Shutting down...");
                std::process::exit(1);
            }
            Err(e) => {
                error!("Failed to renew lease: {}. Shutting down...", e);
                std::process::exit(1);
            }
        }
    }
}
