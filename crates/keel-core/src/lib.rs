//! keel-core — shared types for the keel node bootstrapper.
//!
//! Holds the pieces every other keel crate agrees on: the cluster
//! config document, the fixed set of managed components, well-known
//! paths and policy constants, owner-only file writing, and the
//! service-hosting marker.

pub mod config;
pub mod constants;
pub mod error;
pub mod fsutil;
pub mod hosting;
pub mod types;

pub use config::ClusterConfig;
pub use error::{CoreError, CoreResult};
pub use hosting::{ServiceHostedConfig, ServiceHostingCache};
pub use types::*;
