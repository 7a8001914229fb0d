//! Error types for unit writing and init-system control.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for init-system operations.
pub type InitSystemResult<T> = Result<T, InitSystemError>;

#[derive(Debug, Error)]
pub enum InitSystemError {
    #[error("no supported init system found on this host (looked for {0})")]
    UnsupportedPlatform(String),

    #[error("failed to start service {unit:?}: {reason}")]
    ServiceStart { unit: String, reason: String },

    #[error("failed to query service {unit:?}: {reason}")]
    Status { unit: String, reason: String },

    #[error("failed to write unit file for {component:?} ({path:?}): {source}")]
    UnitWrite {
        component: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid unit for {component:?}: {reason}")]
    InvalidUnit { component: String, reason: String },
}
