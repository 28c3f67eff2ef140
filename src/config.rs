//! Operator configuration.
//!
//! Read once at startup from environment variables set by the Deployment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `POD_NAME` | hostname | Leader election holder id, event reporter instance |
//! | `POD_NAMESPACE` | `default` | Namespace of the leader election lease |
//! | `WATCH_NAMESPACE` | unset (cluster-wide) | Restrict the watch to one namespace |
//! | `HEALTH_PORT` | `8080` | Port of `/healthz`, `/readyz`, `/metrics` |
//! | `LEADER_ELECTION` | `true` | Acquire a lease before reconciling |
//! | `MAX_CONCURRENT_RECONCILES` | `4` | Reconciles running at once across keys |
//! | `DUPLICATE_POLICY` | `adopt` | `adopt` or `fail` on already-existing children |
//! | `REQUEUE_BASE_SECS` | `5` | First retry delay after a failure, at least 1 |
//! | `REQUEUE_MAX_SECS` | `300` | Retry delay cap |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::controller::DuplicatePolicy;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable present but not parseable
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration of the operator
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub pod_name: String,
    pub pod_namespace: String,
    pub watch_namespace: Option<String>,
    pub health_port: u16,
    pub leader_election: bool,
    pub max_concurrent_reconciles: u16,
    pub duplicate_policy: DuplicatePolicy,
    pub requeue_base: Duration,
    pub requeue_max: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            pod_name: "dragonfly-operator".to_string(),
            pod_namespace: "default".to_string(),
            watch_namespace: None,
            health_port: 8080,
            leader_election: true,
            max_concurrent_reconciles: 4,
            duplicate_policy: DuplicatePolicy::default(),
            requeue_base: Duration::from_secs(5),
            requeue_max: Duration::from_secs(300),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for any variable that is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let pod_name = lookup("POD_NAME").unwrap_or_else(|| {
            warn!("POD_NAME not set, using hostname");
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| defaults.pod_name.clone())
        });
        let pod_namespace = lookup("POD_NAMESPACE").unwrap_or_else(|| {
            warn!("POD_NAMESPACE not set, using 'default'");
            defaults.pod_namespace.clone()
        });
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        let health_port = parse_var(&lookup, "HEALTH_PORT")?.unwrap_or(defaults.health_port);
        let leader_election =
            parse_bool(&lookup, "LEADER_ELECTION")?.unwrap_or(defaults.leader_election);
        let max_concurrent_reconciles = parse_var::<u16, _>(&lookup, "MAX_CONCURRENT_RECONCILES")?
            .unwrap_or(defaults.max_concurrent_reconciles);
        if max_concurrent_reconciles == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_CONCURRENT_RECONCILES",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let duplicate_policy =
            parse_var(&lookup, "DUPLICATE_POLICY")?.unwrap_or(defaults.duplicate_policy);

        let requeue_base = parse_var(&lookup, "REQUEUE_BASE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.requeue_base);
        if requeue_base.is_zero() {
            return Err(ConfigError::Invalid {
                var: "REQUEUE_BASE_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let requeue_max = parse_var(&lookup, "REQUEUE_MAX_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.requeue_max);
        if requeue_max < requeue_base {
            return Err(ConfigError::Invalid {
                var: "REQUEUE_MAX_SECS",
                value: requeue_max.as_secs().to_string(),
                reason: format!("must not be below REQUEUE_BASE_SECS ({})", requeue_base.as_secs()),
            });
        }

        Ok(Self {
            pod_name,
            pod_namespace,
            watch_namespace,
            health_port,
            leader_election,
            max_concurrent_reconciles,
            duplicate_policy,
            requeue_base,
            requeue_max,
        })
    }
}

fn parse_var<T, L>(lookup: &L, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool<L>(lookup: &L, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value: value.clone(),
                reason: "expected a boolean".to_string(),
            }),
        })
        .transpose()
}
