//! Well-known paths, ports and policy constants.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client port of the storage (quorum KV) process.
pub const STORAGE_CLIENT_PORT: u16 = 2379;
/// Peer port of the storage process.
pub const STORAGE_PEER_PORT: u16 = 2380;
/// Plain-HTTP metrics port, bound to loopback only.
pub const STORAGE_METRICS_PORT: u16 = 2381;

/// How many times the join waits for the storage cluster to report healthy.
pub const STORAGE_HEALTHY_CHECK_RETRIES: u32 = 8;
/// Pause between two storage availability polls.
pub const STORAGE_HEALTHY_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Default `RestartSec` of every generated unit.
pub const DEFAULT_UNIT_RESTART_SEC: u32 = 5;
/// Install target used by every generated unit.
pub const MULTI_USER_TARGET: &str = "multi-user.target";

pub const DEFAULT_CONFIG_DIR: &str = "/etc/keel";
pub const DEFAULT_CERT_DIR: &str = "/etc/keel/pki";
pub const DEFAULT_UNITS_DIR: &str = "/etc/systemd/system";
pub const DEFAULT_STORAGE_DATA_DIR: &str = "/var/lib/keel/storage";
pub const SERVICE_HOSTED_CONFIG_FILE: &str = "service-hosted.toml";

/// Namespace the control-plane workloads live in when not service-hosted.
pub const SYSTEM_NAMESPACE: &str = "kube-system";
/// Pod annotation carrying a storage replica's advertised client URL.
pub const STORAGE_CLIENT_URLS_ANNOTATION: &str = "keel.io/storage.advertise-client-urls";

// Certificate material, relative to the cert dir.
pub const STORAGE_CA_CERT: &str = "storage/ca.crt";
pub const STORAGE_SERVER_CERT: &str = "storage/server.crt";
pub const STORAGE_SERVER_KEY: &str = "storage/server.key";
pub const STORAGE_PEER_CERT: &str = "storage/peer.crt";
pub const STORAGE_PEER_KEY: &str = "storage/peer.key";
pub const APISERVER_STORAGE_CLIENT_CERT: &str = "apiserver-storage-client.crt";
pub const APISERVER_STORAGE_CLIENT_KEY: &str = "apiserver-storage-client.key";
pub const CA_CERT: &str = "ca.crt";
pub const CA_KEY: &str = "ca.key";
pub const SERVICE_ACCOUNT_KEY: &str = "sa.key";
pub const SERVICE_ACCOUNT_PUB: &str = "sa.pub";
pub const APISERVER_CERT: &str = "apiserver.crt";
pub const APISERVER_KEY: &str = "apiserver.key";
/// Client pair used to query the API server during workload discovery.
pub const ADMIN_CLIENT_CERT: &str = "admin.crt";
pub const ADMIN_CLIENT_KEY: &str = "admin.key";

pub const CONTROLLER_MANAGER_KUBECONFIG: &str = "controller-manager.conf";
pub const SCHEDULER_KUBECONFIG: &str = "scheduler.conf";

/// Path of the unit file for `component` inside `units_dir`.
pub fn unit_filepath(component: &str, units_dir: &Path) -> PathBuf {
    units_dir.join(format!("{component}.service"))
}
