//! Storage cluster client.
//!
//! `MemberApi` is the seam the join workflow is written against; the
//! real implementation is `MemberClient`, tests substitute fakes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use rustls::ClientConfig;
use tracing::{debug, info};

use crate::error::{MemberError, MemberResult};
use crate::tls::{TlsFiles, load_client_config};
use crate::transport::HttpsTransport;
use crate::types::{Member, MemberAddRequest, gateway_error_message, parse_health, parse_members};

const MEMBER_ADD_PATH: &str = "/v3/cluster/member/add";
const MEMBER_LIST_PATH: &str = "/v3/cluster/member/list";
const HEALTH_PATH: &str = "/health";

/// Per-request timeout used unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can report whether a storage endpoint is healthy.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// The endpoint this probe targets, for logs and errors.
    fn endpoint(&self) -> &str;

    /// One health check. No retries.
    async fn check_health(&self) -> MemberResult<()>;
}

/// Membership operations on a running storage cluster.
#[async_trait]
pub trait MemberApi: HealthProbe {
    /// Register a new member by peer URL. Returns the full member list
    /// including the new member, named `name`.
    async fn add_member(&self, name: &str, peer_url: &str) -> MemberResult<Vec<Member>>;

    async fn list_members(&self) -> MemberResult<Vec<Member>>;

    /// Poll health up to `max_attempts` times, `interval` apart.
    async fn wait_for_cluster_available(&self, max_attempts: u32, interval: Duration) -> MemberResult<()> {
        crate::wait::wait_for_cluster_available(self, max_attempts, interval).await
    }
}

/// Client for one storage endpoint, authenticated with mutual TLS.
pub struct MemberClient {
    transport: HttpsTransport,
}

impl MemberClient {
    /// Build a client for `endpoint` using the storage CA and client
    /// certificate under `cert_dir`. Nothing is sent until the first
    /// call.
    pub fn connect(endpoint: &str, cert_dir: &Path) -> MemberResult<Self> {
        let files = TlsFiles::in_cert_dir(cert_dir);
        let tls = load_client_config(&files).map_err(|reason| MemberError::ConnectionSetup {
            endpoint: endpoint.to_string(),
            reason,
        })?;
        Self::with_tls(endpoint, tls)
    }

    /// Build a client from an already loaded TLS config.
    pub fn with_tls(endpoint: &str, tls: Arc<ClientConfig>) -> MemberResult<Self> {
        let transport = HttpsTransport::new(endpoint, tls, DEFAULT_REQUEST_TIMEOUT)?;
        debug!(%endpoint, "storage client ready");
        Ok(Self { transport })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(self, timeout: Duration) -> MemberResult<Self> {
        let endpoint = self.transport.endpoint().to_string();
        let tls = self.transport.tls_config();
        let transport = HttpsTransport::new(&endpoint, tls, timeout)?;
        Ok(Self { transport })
    }

    fn decode_err(&self, reason: String) -> MemberError {
        MemberError::Decode {
            endpoint: self.transport.endpoint().to_string(),
            reason,
        }
    }
}

#[async_trait]
impl HealthProbe for MemberClient {
    fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    async fn check_health(&self) -> MemberResult<()> {
        let (status, body) = self.transport.request(Method::GET, HEALTH_PATH, None).await?;

        let verdict = if status.is_success() {
            parse_health(&body)
        } else {
            Err(format!("HTTP {status}: {}", gateway_error_message(&body)))
        };

        verdict.map_err(|reason| MemberError::Unhealthy {
            endpoint: self.endpoint().to_string(),
            reason,
        })
    }
}

#[async_trait]
impl MemberApi for MemberClient {
    async fn add_member(&self, name: &str, peer_url: &str) -> MemberResult<Vec<Member>> {
        let payload = serde_json::to_vec(&MemberAddRequest { peer_urls: [peer_url] })
            .map_err(|e| self.decode_err(format!("encode member add: {e}")))?;

        let (status, body) = self
            .transport
            .request(Method::POST, MEMBER_ADD_PATH, Some(payload))
            .await?;

        if !status.is_success() {
            return Err(MemberError::Membership {
                endpoint: self.endpoint().to_string(),
                name: name.to_string(),
                reason: format!("HTTP {status}: {}", gateway_error_message(&body)),
            });
        }

        let members = parse_members(&body, Some(name)).map_err(|e| self.decode_err(e))?;
        info!(endpoint = %self.endpoint(), %name, %peer_url, members = members.len(), "storage member added");
        Ok(members)
    }

    async fn list_members(&self) -> MemberResult<Vec<Member>> {
        let (status, body) = self
            .transport
            .request(Method::POST, MEMBER_LIST_PATH, Some(b"{}".to_vec()))
            .await?;

        if !status.is_success() {
            return Err(MemberError::Request {
                endpoint: self.endpoint().to_string(),
                reason: format!("HTTP {status}: {}", gateway_error_message(&body)),
            });
        }

        parse_members(&body, None).map_err(|e| self.decode_err(e))
    }
}
