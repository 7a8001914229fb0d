//! Finding storage replicas when the control plane runs as workloads.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use keel_core::ComponentId;
use keel_core::constants::{ADMIN_CLIENT_CERT, ADMIN_CLIENT_KEY, CA_CERT, STORAGE_CLIENT_URLS_ANNOTATION, SYSTEM_NAMESPACE};
use keel_member::TlsFiles;
use keel_member::tls::load_client_config;
use keel_member::transport::HttpsTransport;
use serde::Deserialize;
use tracing::debug;

use crate::error::{JoinError, JoinResult};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the storage client URLs of every running replica.
#[async_trait]
pub trait WorkloadDiscovery: Send + Sync {
    async fn storage_client_urls(&self) -> JoinResult<Vec<String>>;
}

/// A fixed replica list.
#[derive(Debug, Clone, Default)]
pub struct StaticReplicas {
    urls: Vec<String>,
}

impl StaticReplicas {
    pub fn new(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl WorkloadDiscovery for StaticReplicas {
    async fn storage_client_urls(&self) -> JoinResult<Vec<String>> {
        if self.urls.is_empty() {
            return Err(JoinError::Discovery("no storage replicas configured".to_string()));
        }
        Ok(self.urls.clone())
    }
}

/// Lists the storage pods through the API server and reads the client
/// URL each one advertises in its annotations.
pub struct ApiServerDiscovery {
    transport: HttpsTransport,
}

impl ApiServerDiscovery {
    /// Client for the API server at `host:port`, authenticated with the
    /// admin pair under `cert_dir`.
    pub fn connect(api_server_endpoint: &str, cert_dir: &Path) -> JoinResult<Self> {
        let files = TlsFiles {
            ca_cert: cert_dir.join(CA_CERT),
            client_cert: cert_dir.join(ADMIN_CLIENT_CERT),
            client_key: cert_dir.join(ADMIN_CLIENT_KEY),
        };
        let tls = load_client_config(&files).map_err(JoinError::Discovery)?;
        let transport = HttpsTransport::new(&format!("https://{api_server_endpoint}"), tls, DISCOVERY_TIMEOUT)
            .map_err(|e| JoinError::Discovery(e.to_string()))?;
        Ok(Self { transport })
    }
}

#[async_trait]
impl WorkloadDiscovery for ApiServerDiscovery {
    async fn storage_client_urls(&self) -> JoinResult<Vec<String>> {
        let path = format!(
            "/api/v1/namespaces/{SYSTEM_NAMESPACE}/pods?labelSelector=component%3D{}",
            ComponentId::StorageNode.name()
        );
        let (status, body) = self
            .transport
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| JoinError::Discovery(e.to_string()))?;

        if !status.is_success() {
            return Err(JoinError::Discovery(format!(
                "listing storage pods at {} returned HTTP {status}",
                self.transport.endpoint()
            )));
        }

        let urls = client_urls_from_pod_list(&body)?;
        debug!(endpoint = %self.transport.endpoint(), replicas = urls.len(), "discovered storage replicas");
        Ok(urls)
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMeta,
}

#[derive(Debug, Deserialize)]
struct PodMeta {
    name: String,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

/// The advertised client URL of every pod in a pod list body.
///
/// A pod without the annotation is an error, never skipped.
pub(crate) fn client_urls_from_pod_list(body: &[u8]) -> JoinResult<Vec<String>> {
    let list: PodList =
        serde_json::from_slice(body).map_err(|e| JoinError::Discovery(format!("invalid pod list: {e}")))?;

    if list.items.is_empty() {
        return Err(JoinError::Discovery("no storage pods found".to_string()));
    }

    list.items
        .into_iter()
        .map(|pod| {
            pod.metadata
                .annotations
                .get(STORAGE_CLIENT_URLS_ANNOTATION)
                .and_then(|v| v.split(',').map(str::trim).find(|u| !u.is_empty()))
                .map(str::to_string)
                .ok_or_else(|| {
                    JoinError::Discovery(format!(
                        "pod {} has no {STORAGE_CLIENT_URLS_ANNOTATION} annotation",
                        pod.metadata.name
                    ))
                })
        })
        .collect()
}
