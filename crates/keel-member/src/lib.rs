//! keel-member — client for the storage cluster's membership and health APIs.
//!
//! Talks JSON over HTTPS with mutual TLS to one storage endpoint, using
//! client certificates found in the node's cert dir.
//!
//! # Architecture
//!
//! ```text
//! MemberClient
//!   ├── tls::load_client_config()   CA + client cert/key → rustls ClientConfig
//!   ├── transport::HttpsTransport   TCP → TLS → hyper http1, one connection per call
//!   ├── add_member() / list_members()
//!   └── check_health()
//!
//! wait::wait_for_cluster_available()   linear retry over any HealthProbe
//! ```
//!
//! Only the availability wait retries. A rejected membership change is
//! returned to the caller as is.

pub mod client;
pub mod error;
pub mod tls;
pub mod transport;
pub mod types;
pub mod wait;

pub use client::{HealthProbe, MemberApi, MemberClient};
pub use error::{MemberError, MemberResult};
pub use tls::TlsFiles;
pub use types::Member;
pub use wait::wait_for_cluster_available;
