//! Component identities and endpoint helpers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{STORAGE_CLIENT_PORT, STORAGE_PEER_PORT};
use crate::error::{CoreError, CoreResult};

/// The fixed set of processes keel writes units for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentId {
    ApiServer,
    ControllerManager,
    Scheduler,
    StorageNode,
}

impl ComponentId {
    /// Every managed component, control plane first.
    pub const ALL: [ComponentId; 4] = [
        ComponentId::ApiServer,
        ComponentId::ControllerManager,
        ComponentId::Scheduler,
        ComponentId::StorageNode,
    ];

    /// The three control-plane processes.
    pub const CONTROL_PLANE: [ComponentId; 3] = [
        ComponentId::ApiServer,
        ComponentId::ControllerManager,
        ComponentId::Scheduler,
    ];

    /// Unit name, also the stem of the unit file.
    pub fn name(self) -> &'static str {
        match self {
            ComponentId::ApiServer => "apiserver",
            ComponentId::ControllerManager => "controller-manager",
            ComponentId::Scheduler => "scheduler",
            ComponentId::StorageNode => "storage-node",
        }
    }

    pub fn is_control_plane(self) -> bool {
        !matches!(self, ComponentId::StorageNode)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentId::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| CoreError::Config(format!("unknown component {s:?}")))
    }
}

/// Address this node advertises, plus the API server bind port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub advertise_address: String,
    pub bind_port: u16,
}

impl ApiEndpoint {
    pub fn new(advertise_address: impl Into<String>, bind_port: u16) -> Self {
        Self {
            advertise_address: advertise_address.into(),
            bind_port,
        }
    }

    /// `https://<addr>:<client port>` of the storage process on this node.
    pub fn storage_client_url(&self) -> String {
        https_url(&self.advertise_address, STORAGE_CLIENT_PORT)
    }

    /// `https://<addr>:<peer port>` of the storage process on this node.
    pub fn storage_peer_url(&self) -> String {
        https_url(&self.advertise_address, STORAGE_PEER_PORT)
    }

    /// `host:port` form of the API server address.
    pub fn api_server_address(&self) -> String {
        format!("{}:{}", bracket_host(&self.advertise_address), self.bind_port)
    }
}

/// Storage client URL on the host of a `host:port` API server endpoint.
///
/// Used when the control plane is service-hosted and the only thing
/// known about the existing cluster is the address being joined.
pub fn storage_client_url_from_join_endpoint(endpoint: &str) -> CoreResult<String> {
    let (host, _) = split_host_port(endpoint)?;
    Ok(https_url(&host, STORAGE_CLIENT_PORT))
}

/// Split `host[:port]`, accepting bracketed and bare IPv6 hosts.
pub fn split_host_port(endpoint: &str) -> CoreResult<(String, Option<u16>)> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(CoreError::Config("empty endpoint".to_string()));
    }

    let invalid = || CoreError::Config(format!("invalid endpoint {endpoint:?}"));

    if let Some(rest) = endpoint.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => None,
            t => Some(t.strip_prefix(':').ok_or_else(invalid)?.parse().map_err(|_| invalid())?),
        };
        return Ok((host.to_string(), port));
    }

    match endpoint.matches(':').count() {
        0 => Ok((endpoint.to_string(), None)),
        1 => {
            let (host, port) = endpoint.split_once(':').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.to_string(), Some(port)))
        }
        // Bare IPv6 literal without a port.
        _ => Ok((endpoint.to_string(), None)),
    }
}

fn bracket_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

fn https_url(host: &str, port: u16) -> String {
    format!("https://{}:{port}", bracket_host(host))
}
