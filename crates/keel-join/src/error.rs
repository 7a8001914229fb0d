//! Error types for the join workflow.

use keel_core::CoreError;
use keel_initsys::InitSystemError;
use keel_member::MemberError;
use thiserror::Error;

/// Result type alias for join operations.
pub type JoinResult<T> = Result<T, JoinError>;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    InitSystem(#[from] InitSystemError),

    #[error(transparent)]
    Member(#[from] MemberError),

    #[error("storage cluster is not healthy: member {endpoint} reported: {reason}")]
    ClusterUnhealthy { endpoint: String, reason: String },

    #[error("failed to discover storage replicas: {0}")]
    Discovery(String),
}
