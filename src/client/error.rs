//! Errors returned by the cluster state client.
//!
//! Kubernetes API failures are classified by status code and reason so the
//! reconciler can tell a missing object, a duplicate create and a lost
//! optimistic-concurrency race apart without inspecting raw responses.

use thiserror::Error;

/// Error type for cluster state store operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Object does not exist (HTTP 404)
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    /// Create targeted a name that is already taken (HTTP 409, reason AlreadyExists)
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    /// Write raced with another writer (HTTP 409, reason Conflict)
    #[error("Conflict writing {kind} {name}: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    /// Object cannot be submitted as-is
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Any other Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Classify a kube error raised while operating on `kind` `name`.
    pub fn classify(err: kube::Error, kind: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 404 => ClientError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(ref resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                ClientError::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            kube::Error::Api(resp) if resp.code == 409 => ClientError::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                message: resp.message,
            },
            other => ClientError::Kube(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict { .. })
    }

    /// Check if a later attempt could succeed without user intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Conflict { .. } => true,
            ClientError::Kube(e) => {
                // Retry on network errors, rate limiting, and server errors
                matches!(
                    e,
                    kube::Error::Api(api_err) if api_err.code >= 500 || api_err.code == 429
                ) || matches!(e, kube::Error::Service(_))
            }
            ClientError::NotFound { .. }
            | ClientError::AlreadyExists { .. }
            | ClientError::InvalidObject(_)
            | ClientError::Serialization(_) => false,
        }
    }
}
