//! The storage node unit: command line, descriptor, and first-node write.

use std::path::{Path, PathBuf};

use keel_core::constants::*;
use keel_core::{ApiEndpoint, ClusterConfig, ComponentId};
use keel_initsys::{RestartPolicy, UnitInstall, UnitService, UnitSpec, write_unit_to_disk};
use keel_member::Member;
use tracing::info;

use crate::command::{build_command, flags};
use crate::error::{JoinError, JoinResult};

/// The component every storage unit is written and started as.
pub const STORAGE_COMPONENT: ComponentId = ComponentId::StorageNode;

const STORAGE_DESCRIPTION: &str = "keel storage node";
const STORAGE_DOCUMENTATION: &str = "https://etcd.io/docs";

/// Command line of the storage process on this node.
///
/// With an empty `initial_cluster` the process bootstraps a new cluster
/// made of itself. Otherwise it joins the existing members; a member
/// without a name (added but not yet started) is this node.
pub fn storage_command(
    cfg: &ClusterConfig,
    endpoint: &ApiEndpoint,
    node_name: &str,
    initial_cluster: &[Member],
) -> Vec<String> {
    let cert_dir = &cfg.paths.cert_dir;
    let cert = |name: &str| cert_dir.join(name).display().to_string();

    let client_url = endpoint.storage_client_url();
    let peer_url = endpoint.storage_peer_url();
    let loopback = if endpoint.advertise_address.contains(':') {
        "[::1]"
    } else {
        "127.0.0.1"
    };

    let mut defaults = flags([
        ("name", node_name.to_string()),
        ("data-dir", cfg.storage.data_dir.display().to_string()),
        (
            "listen-client-urls",
            format!("https://{loopback}:{STORAGE_CLIENT_PORT},{client_url}"),
        ),
        ("advertise-client-urls", client_url),
        ("listen-peer-urls", peer_url.clone()),
        ("initial-advertise-peer-urls", peer_url.clone()),
        (
            "listen-metrics-urls",
            format!("http://{loopback}:{STORAGE_METRICS_PORT}"),
        ),
        ("cert-file", cert(STORAGE_SERVER_CERT)),
        ("key-file", cert(STORAGE_SERVER_KEY)),
        ("trusted-ca-file", cert(STORAGE_CA_CERT)),
        ("client-cert-auth", "true".to_string()),
        ("peer-cert-file", cert(STORAGE_PEER_CERT)),
        ("peer-key-file", cert(STORAGE_PEER_KEY)),
        ("peer-trusted-ca-file", cert(STORAGE_CA_CERT)),
        ("peer-client-cert-auth", "true".to_string()),
        ("snapshot-count", "10000".to_string()),
    ]);

    if initial_cluster.is_empty() {
        defaults.insert("initial-cluster".to_string(), format!("{node_name}={peer_url}"));
    } else {
        let members = initial_cluster
            .iter()
            .map(|m| {
                let name = if m.name.is_empty() { node_name } else { &m.name };
                format!("{name}={}", m.peer_url)
            })
            .collect::<Vec<_>>()
            .join(",");
        defaults.insert("initial-cluster".to_string(), members);
        defaults.insert("initial-cluster-state".to_string(), "existing".to_string());
    }

    build_command(&cfg.storage.binary, defaults, &cfg.storage.extra_args)
}

/// Unit descriptor for the storage process.
pub fn storage_unit_spec(
    cfg: &ClusterConfig,
    endpoint: &ApiEndpoint,
    node_name: &str,
    initial_cluster: &[Member],
) -> UnitSpec {
    UnitSpec {
        description: STORAGE_DESCRIPTION.to_string(),
        documentation: STORAGE_DOCUMENTATION.to_string(),
        service: UnitService {
            exec_start: storage_command(cfg, endpoint, node_name, initial_cluster),
            restart: RestartPolicy::Always,
            restart_sec: DEFAULT_UNIT_RESTART_SEC,
        },
        install: UnitInstall::wanted_by(MULTI_USER_TARGET),
    }
}

/// Write the storage unit for the first node of a new cluster.
///
/// Refused when the cluster uses external storage.
pub fn create_storage_unit_file(
    units_dir: &Path,
    node_name: &str,
    cfg: &ClusterConfig,
    endpoint: &ApiEndpoint,
) -> JoinResult<PathBuf> {
    if cfg.is_external_storage() {
        return Err(JoinError::Config(
            "storage unit cannot be generated for a cluster using external storage".to_string(),
        ));
    }

    let spec = storage_unit_spec(cfg, endpoint, node_name, &[]);
    let path = write_unit_to_disk(STORAGE_COMPONENT.name(), units_dir, &spec)?;

    info!(component = %STORAGE_COMPONENT, ?path, "[control-plane] wrote service unit for storage");
    Ok(path)
}
