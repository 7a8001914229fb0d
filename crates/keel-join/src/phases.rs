//! Workflow phases run by `keeladm` during a node join.

use keel_core::types::storage_client_url_from_join_endpoint;
use keel_core::{ClusterConfig, CoreError, ServiceHostingCache};
use keel_member::{HealthProbe, MemberClient, MemberResult};
use tracing::{debug, info};

use crate::discovery::{StaticReplicas, WorkloadDiscovery};
use crate::error::JoinResult;
use crate::verify::HealthCheckStrategy;

/// What the check-storage phase ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStorageOutcome {
    /// The node joins as a worker; there is no local storage to check.
    SkippedNotControlPlane,
    SkippedExternal,
    /// Checked the single member on the host being joined.
    CheckedEndpoint(String),
    CheckedDiscovered,
}

/// Check that the storage cluster being joined is healthy before this
/// node adds itself to it.
///
/// On a service-hosted control plane the replicas cannot be discovered
/// through the API server, so the member on the join endpoint's host is
/// checked. `discover` is only called when discovery is needed.
pub async fn run_check_storage_phase<D, F>(
    cfg: &ClusterConfig,
    hosting: &ServiceHostingCache,
    discover: F,
) -> JoinResult<CheckStorageOutcome>
where
    D: WorkloadDiscovery,
    F: FnOnce() -> JoinResult<D>,
{
    let cert_dir = cfg.paths.cert_dir.clone();
    run_check_storage_phase_with(cfg, hosting, discover, move |endpoint| {
        MemberClient::connect(endpoint, &cert_dir)
    })
    .await
}

/// [`run_check_storage_phase`] with probes built by `connect`.
pub async fn run_check_storage_phase_with<D, F, P, C>(
    cfg: &ClusterConfig,
    hosting: &ServiceHostingCache,
    discover: F,
    connect: C,
) -> JoinResult<CheckStorageOutcome>
where
    D: WorkloadDiscovery,
    F: FnOnce() -> JoinResult<D>,
    P: HealthProbe,
    C: Fn(&str) -> MemberResult<P>,
{
    let join = cfg.join()?;
    if !join.control_plane {
        debug!("[check-storage] Not a control-plane join, skipping");
        return Ok(CheckStorageOutcome::SkippedNotControlPlane);
    }

    if cfg.is_external_storage() {
        info!("[check-storage] Skipping storage check in external mode");
        return Ok(CheckStorageOutcome::SkippedExternal);
    }

    info!("[check-storage] Checking that the storage cluster is healthy");

    if service_hosted(hosting)? {
        let endpoint = storage_client_url_from_join_endpoint(&join.api_server_endpoint)?;
        HealthCheckStrategy::<StaticReplicas>::ViaEndpoint(endpoint.clone())
            .check_with(connect)
            .await?;
        return Ok(CheckStorageOutcome::CheckedEndpoint(endpoint));
    }

    HealthCheckStrategy::ViaDiscovery(discover()?)
        .check_with(connect)
        .await?;
    Ok(CheckStorageOutcome::CheckedDiscovered)
}

/// Whether the marker exists, loading it through the cache.
fn service_hosted(hosting: &ServiceHostingCache) -> JoinResult<bool> {
    match hosting.load() {
        Ok(marker) => {
            debug!(endpoint = %marker.api_server_advertise_endpoint, "control plane is service-hosted");
            Ok(true)
        }
        Err(CoreError::MarkerNotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Default location of the marker for `cfg`, wrapped in a fresh cache.
pub fn hosting_cache_for(cfg: &ClusterConfig) -> ServiceHostingCache {
    ServiceHostingCache::new(cfg.service_hosted_marker_path())
}
