//! Error types for the storage cluster client.

use thiserror::Error;

/// Result type alias for cluster client operations.
pub type MemberResult<T> = Result<T, MemberError>;

#[derive(Debug, Error)]
pub enum MemberError {
    #[error("cannot set up client for {endpoint}: {reason}")]
    ConnectionSetup { endpoint: String, reason: String },

    #[error("invalid storage endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("cluster at {endpoint} rejected member {name:?}: {reason}")]
    Membership {
        endpoint: String,
        name: String,
        reason: String,
    },

    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("member at {endpoint} is unhealthy: {reason}")]
    Unhealthy { endpoint: String, reason: String },

    #[error("cluster at {endpoint} not available after {attempts} attempts: {last_error}")]
    ClusterUnavailable {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },
}
