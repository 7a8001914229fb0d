//! Service-hosting marker.
//!
//! A node whose control plane runs as host-level services (instead of
//! workloads scheduled through the API server) carries a small marker
//! file written once during bootstrap. Its presence is the flag; its
//! content records the API server endpoint the node advertises.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::fsutil;

/// Content of the service-hosting marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHostedConfig {
    /// `host:port` of the API server this node advertises.
    pub api_server_advertise_endpoint: String,
}

/// Whether the marker exists. Not cached.
pub fn is_service_hosted(path: &Path) -> bool {
    path.exists()
}

/// Write the marker, flagging this node as service-hosted.
pub fn mark_service_hosted(path: &Path, cfg: &ServiceHostedConfig) -> CoreResult<()> {
    let content = toml::to_string(cfg).map_err(|e| CoreError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(dir) = path.parent() {
        fsutil::create_private_dir(dir)
            .map_err(|e| CoreError::io("failed to mark the node as service-hosted", dir, e))?;
    }
    fsutil::write_private_file(path, content.as_bytes())
        .map_err(|e| CoreError::io("failed to mark the node as service-hosted", path, e))?;

    info!(?path, endpoint = %cfg.api_server_advertise_endpoint, "node marked as service-hosted");
    Ok(())
}

/// Read and parse the marker, bypassing any cache.
pub fn read_service_hosted_config(path: &Path) -> CoreResult<ServiceHostedConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::MarkerNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(CoreError::io("failed to read service-hosting marker", path, e)),
    };

    toml::from_str(&content).map_err(|e| CoreError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load-once view of the marker.
///
/// The first successful load is kept for the lifetime of the cache and
/// never re-read, even if the file changes or disappears. A failed load
/// leaves the cache empty so a later call can retry. First loads are
/// serialized; reads after population take no lock.
#[derive(Debug)]
pub struct ServiceHostingCache {
    path: PathBuf,
    loaded: OnceLock<ServiceHostedConfig>,
    init: Mutex<()>,
}

impl ServiceHostingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached marker, loading it on first use.
    pub fn load(&self) -> CoreResult<&ServiceHostedConfig> {
        if let Some(cfg) = self.loaded.get() {
            return Ok(cfg);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cfg) = self.loaded.get() {
            return Ok(cfg);
        }

        let cfg = read_service_hosted_config(&self.path)?;
        debug!(path = ?self.path, "service-hosting marker loaded");
        Ok(self.loaded.get_or_init(|| cfg))
    }

    /// Whether a marker has been loaded into this cache.
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }
}
