//! Check-storage phase branching.

use std::sync::Mutex;

use async_trait::async_trait;
use keel_core::config::{ExternalStorage, JoinConfig};
use keel_core::hosting::{ServiceHostedConfig, mark_service_hosted};
use keel_core::{ClusterConfig, ServiceHostingCache};
use keel_join::{CheckStorageOutcome, JoinError, JoinResult, StaticReplicas, run_check_storage_phase_with};
use keel_member::{HealthProbe, MemberError, MemberResult};

struct Probe {
    endpoint: String,
    healthy: bool,
}

#[async_trait]
impl HealthProbe for Probe {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn check_health(&self) -> MemberResult<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(MemberError::Unhealthy {
                endpoint: self.endpoint.clone(),
                reason: "RAFT NO LEADER".to_string(),
            })
        }
    }
}

fn control_plane_join(config_dir: &std::path::Path) -> ClusterConfig {
    let mut cfg = ClusterConfig::scaffold("cp-3", "10.0.0.3");
    cfg.paths.config_dir = config_dir.to_path_buf();
    cfg.join = Some(JoinConfig {
        api_server_endpoint: "10.0.0.1:6443".to_string(),
        control_plane: true,
    });
    cfg
}

fn replicas() -> JoinResult<StaticReplicas> {
    Ok(StaticReplicas::new(["https://10.0.0.1:2379", "https://10.0.0.2:2379"]))
}

#[tokio::test]
async fn worker_join_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = control_plane_join(tmp.path());
    cfg.join.as_mut().unwrap().control_plane = false;
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());
    let probed = Mutex::new(Vec::<String>::new());

    let outcome = run_check_storage_phase_with(&cfg, &hosting, replicas, |ep: &str| {
        probed.lock().unwrap().push(ep.to_string());
        Ok(Probe {
            endpoint: ep.to_string(),
            healthy: true,
        })
    })
    .await
    .unwrap();

    assert_eq!(outcome, CheckStorageOutcome::SkippedNotControlPlane);
    assert!(probed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn external_storage_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = control_plane_join(tmp.path());
    cfg.storage.external = Some(ExternalStorage {
        endpoints: vec!["https://db-1:2379".to_string()],
        ca_file: None,
        cert_file: None,
        key_file: None,
    });
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());

    let outcome = run_check_storage_phase_with(
        &cfg,
        &hosting,
        || -> JoinResult<StaticReplicas> { panic!("discovery must not run") },
        |ep: &str| {
            Ok(Probe {
                endpoint: ep.to_string(),
                healthy: false,
            })
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome, CheckStorageOutcome::SkippedExternal);
}

#[tokio::test]
async fn service_hosted_checks_join_endpoint_host() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = control_plane_join(tmp.path());
    mark_service_hosted(
        &cfg.service_hosted_marker_path(),
        &ServiceHostedConfig {
            api_server_advertise_endpoint: "10.0.0.1:6443".to_string(),
        },
    )
    .unwrap();
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());
    let probed = Mutex::new(Vec::<String>::new());

    let outcome = run_check_storage_phase_with(
        &cfg,
        &hosting,
        || -> JoinResult<StaticReplicas> { panic!("discovery must not run") },
        |ep: &str| {
            probed.lock().unwrap().push(ep.to_string());
            Ok(Probe {
                endpoint: ep.to_string(),
                healthy: true,
            })
        },
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        CheckStorageOutcome::CheckedEndpoint("https://10.0.0.1:2379".to_string())
    );
    assert_eq!(*probed.lock().unwrap(), ["https://10.0.0.1:2379"]);
    assert!(hosting.is_loaded());
}

#[tokio::test]
async fn workload_hosted_checks_every_discovered_replica() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = control_plane_join(tmp.path());
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());
    let probed = Mutex::new(Vec::<String>::new());

    let outcome = run_check_storage_phase_with(&cfg, &hosting, replicas, |ep: &str| {
        probed.lock().unwrap().push(ep.to_string());
        Ok(Probe {
            endpoint: ep.to_string(),
            healthy: true,
        })
    })
    .await
    .unwrap();

    assert_eq!(outcome, CheckStorageOutcome::CheckedDiscovered);
    assert_eq!(probed.lock().unwrap().len(), 2);
    assert!(!hosting.is_loaded());
}

#[tokio::test]
async fn unhealthy_replica_fails_the_phase() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = control_plane_join(tmp.path());
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());

    let err = run_check_storage_phase_with(&cfg, &hosting, replicas, |ep: &str| {
        Ok(Probe {
            endpoint: ep.to_string(),
            healthy: ep != "https://10.0.0.2:2379",
        })
    })
    .await
    .unwrap_err();

    match err {
        JoinError::ClusterUnhealthy { endpoint, reason } => {
            assert_eq!(endpoint, "https://10.0.0.2:2379");
            assert!(reason.contains("RAFT NO LEADER"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn discovery_error_is_surfaced() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = control_plane_join(tmp.path());
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());

    let err = run_check_storage_phase_with(
        &cfg,
        &hosting,
        || -> JoinResult<StaticReplicas> { Err(JoinError::Discovery("api server unreachable".to_string())) },
        |ep: &str| {
            Ok(Probe {
                endpoint: ep.to_string(),
                healthy: true,
            })
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, JoinError::Discovery(_)));
}

#[tokio::test]
async fn missing_join_section_is_a_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = control_plane_join(tmp.path());
    cfg.join = None;
    let hosting = ServiceHostingCache::new(cfg.service_hosted_marker_path());

    let err = run_check_storage_phase_with(&cfg, &hosting, replicas, |ep: &str| {
        Ok(Probe {
            endpoint: ep.to_string(),
            healthy: true,
        })
    })
    .await
    .unwrap_err();

    assert!(matches!(err, JoinError::Core(_)));
}
