//! keel.toml cluster configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use crate::types::ApiEndpoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub node: NodeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    pub join: Option<JoinConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub advertise_address: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// When set, storage is managed outside this cluster and keel never
    /// writes or starts a local storage unit.
    pub external: Option<ExternalStorage>,
    #[serde(default = "default_storage_binary")]
    pub binary: String,
    #[serde(default = "default_storage_data_dir")]
    pub data_dir: PathBuf,
    /// Flags merged over the generated ones, without the leading `--`.
    #[serde(default)]
    pub extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalStorage {
    pub endpoints: Vec<String>,
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Release of the control-plane binaries, shown in unit descriptions.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_service_subnet")]
    pub service_subnet: String,
    pub pod_subnet: Option<String>,
    #[serde(default = "default_apiserver_binary")]
    pub apiserver_binary: String,
    #[serde(default = "default_controller_manager_binary")]
    pub controller_manager_binary: String,
    #[serde(default = "default_scheduler_binary")]
    pub scheduler_binary: String,
    #[serde(default)]
    pub apiserver_extra_args: BTreeMap<String, String>,
    #[serde(default)]
    pub controller_manager_extra_args: BTreeMap<String, String>,
    #[serde(default)]
    pub scheduler_extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,
    #[serde(default = "default_units_dir")]
    pub units_dir: PathBuf,
    /// Holds kubeconfig files and the service-hosting marker.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// `host:port` of an API server already in the cluster.
    pub api_server_endpoint: String,
    /// Whether this node joins as a control-plane node.
    #[serde(default)]
    pub control_plane: bool,
}

impl ClusterConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::io("failed to read cluster config", path, e))?;
        toml::from_str(&content).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Minimal config for a node, everything else defaulted.
    pub fn scaffold(node_name: &str, advertise_address: &str) -> Self {
        ClusterConfig {
            node: NodeConfig {
                name: node_name.to_string(),
                advertise_address: advertise_address.to_string(),
                bind_port: default_bind_port(),
            },
            storage: StorageConfig::default(),
            control_plane: ControlPlaneConfig::default(),
            paths: PathsConfig::default(),
            join: None,
        }
    }

    pub fn endpoint(&self) -> ApiEndpoint {
        ApiEndpoint::new(self.node.advertise_address.clone(), self.node.bind_port)
    }

    pub fn is_external_storage(&self) -> bool {
        self.storage.external.is_some()
    }

    /// The `[join]` section, or a config error naming what is missing.
    pub fn join(&self) -> CoreResult<&JoinConfig> {
        self.join
            .as_ref()
            .ok_or_else(|| CoreError::Config("missing [join] section".to_string()))
    }

    pub fn service_hosted_marker_path(&self) -> PathBuf {
        self.paths.config_dir.join(SERVICE_HOSTED_CONFIG_FILE)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            external: None,
            binary: default_storage_binary(),
            data_dir: default_storage_data_dir(),
            extra_args: BTreeMap::new(),
        }
    }
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            service_subnet: default_service_subnet(),
            pod_subnet: None,
            apiserver_binary: default_apiserver_binary(),
            controller_manager_binary: default_controller_manager_binary(),
            scheduler_binary: default_scheduler_binary(),
            apiserver_extra_args: BTreeMap::new(),
            controller_manager_extra_args: BTreeMap::new(),
            scheduler_extra_args: BTreeMap::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cert_dir: default_cert_dir(),
            units_dir: default_units_dir(),
            config_dir: default_config_dir(),
        }
    }
}

fn default_bind_port() -> u16 {
    6443
}

fn default_storage_binary() -> String {
    "etcd".to_string()
}

fn default_storage_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_DATA_DIR)
}

fn default_version() -> String {
    "v1.21.0".to_string()
}

fn default_service_subnet() -> String {
    "10.96.0.0/12".to_string()
}

fn default_apiserver_binary() -> String {
    "kube-apiserver".to_string()
}

fn default_controller_manager_binary() -> String {
    "kube-controller-manager".to_string()
}

fn default_scheduler_binary() -> String {
    "kube-scheduler".to_string()
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CERT_DIR)
}

fn default_units_dir() -> PathBuf {
    PathBuf::from(DEFAULT_UNITS_DIR)
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}
