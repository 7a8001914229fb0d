//! Post-join storage health verification.
//!
//! A single pass, no retries: every replica is probed once and the
//! first unhealthy one fails the check.

use std::path::Path;

use keel_member::{HealthProbe, MemberClient, MemberError, MemberResult};
use tracing::{debug, info};

use crate::discovery::{StaticReplicas, WorkloadDiscovery};
use crate::error::{JoinError, JoinResult};

/// Where the replicas to check come from.
pub enum HealthCheckStrategy<D> {
    /// One known storage client URL.
    ViaEndpoint(String),
    /// Every replica the discovery source returns.
    ViaDiscovery(D),
}

impl<D: WorkloadDiscovery> HealthCheckStrategy<D> {
    /// Check with mTLS clients built from `cert_dir`.
    pub async fn check(&self, cert_dir: &Path) -> JoinResult<()> {
        self.check_with(|endpoint| MemberClient::connect(endpoint, cert_dir))
            .await
    }

    /// Check using probes built by `connect`.
    pub async fn check_with<P, F>(&self, connect: F) -> JoinResult<()>
    where
        P: HealthProbe,
        F: Fn(&str) -> MemberResult<P>,
    {
        match self {
            HealthCheckStrategy::ViaEndpoint(endpoint) => {
                check_endpoints_with(std::slice::from_ref(endpoint), connect).await
            }
            HealthCheckStrategy::ViaDiscovery(discovery) => {
                let endpoints = discovery.storage_client_urls().await?;
                check_endpoints_with(&endpoints, connect)
                    .await
                    .map_err(discovered_endpoint_error)
            }
        }
    }
}

/// A discovered URL that is not a usable endpoint is a discovery failure.
fn discovered_endpoint_error(err: JoinError) -> JoinError {
    match err {
        JoinError::Member(e @ MemberError::InvalidEndpoint { .. }) => JoinError::Discovery(e.to_string()),
        other => other,
    }
}

/// Probe the storage member at `endpoint` once.
pub async fn check_via_endpoint(endpoint: &str, cert_dir: &Path) -> JoinResult<()> {
    HealthCheckStrategy::<StaticReplicas>::ViaEndpoint(endpoint.to_string())
        .check(cert_dir)
        .await
}

/// Discover the storage replicas through `discovery` and probe each once.
pub async fn check_via_discovery<D: WorkloadDiscovery>(discovery: D, cert_dir: &Path) -> JoinResult<()> {
    HealthCheckStrategy::ViaDiscovery(discovery).check(cert_dir).await
}

/// Probe every endpoint in order, failing on the first unhealthy one.
pub async fn check_endpoints_with<P, F>(endpoints: &[String], connect: F) -> JoinResult<()>
where
    P: HealthProbe,
    F: Fn(&str) -> MemberResult<P>,
{
    if endpoints.is_empty() {
        return Err(JoinError::Discovery("no storage endpoints to check".to_string()));
    }

    for endpoint in endpoints {
        let probe = connect(endpoint)?;
        probe
            .check_health()
            .await
            .map_err(|e| JoinError::ClusterUnhealthy {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        debug!(%endpoint, "storage member healthy");
    }

    info!(members = endpoints.len(), "[check-storage] Storage cluster is healthy");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct FixedProbe {
        endpoint: String,
        healthy: bool,
    }

    #[async_trait]
    impl HealthProbe for FixedProbe {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        async fn check_health(&self) -> MemberResult<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(MemberError::Unhealthy {
                    endpoint: self.endpoint.clone(),
                    reason: "no leader".to_string(),
                })
            }
        }
    }

    /// Connector that marks `bad` unhealthy and records every endpoint.
    fn connector<'a>(
        bad: &'a str,
        seen: &'a Mutex<Vec<String>>,
    ) -> impl Fn(&str) -> MemberResult<FixedProbe> + 'a {
        move |endpoint| {
            seen.lock().unwrap().push(endpoint.to_string());
            Ok(FixedProbe {
                endpoint: endpoint.to_string(),
                healthy: endpoint != bad,
            })
        }
    }

    #[tokio::test]
    async fn endpoint_strategy_probes_one_address() {
        let seen = Mutex::new(Vec::new());
        let strategy = HealthCheckStrategy::<StaticReplicas>::ViaEndpoint("https://a:2379".to_string());
        strategy.check_with(connector("", &seen)).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), ["https://a:2379"]);
    }

    #[tokio::test]
    async fn discovery_strategy_probes_every_replica() {
        let seen = Mutex::new(Vec::new());
        let strategy = HealthCheckStrategy::ViaDiscovery(StaticReplicas::new([
            "https://a:2379",
            "https://b:2379",
            "https://c:2379",
        ]));
        strategy.check_with(connector("", &seen)).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unhealthy_replica_fails_the_check() {
        let seen = Mutex::new(Vec::new());
        let strategy = HealthCheckStrategy::ViaDiscovery(StaticReplicas::new([
            "https://a:2379",
            "https://b:2379",
            "https://c:2379",
        ]));
        let err = strategy
            .check_with(connector("https://b:2379", &seen))
            .await
            .unwrap_err();

        match err {
            JoinError::ClusterUnhealthy { endpoint, reason } => {
                assert_eq!(endpoint, "https://b:2379");
                assert!(reason.contains("no leader"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Stops at the first unhealthy member.
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn discovery_failure_is_reported() {
        let seen = Mutex::new(Vec::new());
        let strategy = HealthCheckStrategy::ViaDiscovery(StaticReplicas::default());
        let err = strategy.check_with(connector("", &seen)).await.unwrap_err();
        assert!(matches!(err, JoinError::Discovery(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn discovery_check_needs_client_certs() {
        let tmp = tempfile::tempdir().unwrap();
        let err = check_via_discovery(StaticReplicas::new(["https://10.0.0.1:2379"]), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::Member(MemberError::ConnectionSetup { .. })));
    }

    #[tokio::test]
    async fn unusable_discovered_url_is_a_discovery_error() {
        let seen = Mutex::new(Vec::new());
        let strategy = HealthCheckStrategy::ViaDiscovery(StaticReplicas::new(["http://10.0.0.2:2379"]));
        let err = strategy
            .check_with(|endpoint: &str| -> MemberResult<FixedProbe> {
                seen.lock().unwrap().push(endpoint.to_string());
                Err(MemberError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: "endpoint must use https".to_string(),
                })
            })
            .await
            .unwrap_err();

        match err {
            JoinError::Discovery(reason) => assert!(reason.contains("http://10.0.0.2:2379"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_certs_fail_before_probing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = check_via_endpoint("https://10.0.0.1:2379", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, JoinError::Member(MemberError::ConnectionSetup { .. })));
    }
}
