//! Cluster member type and the JSON shapes of the storage gateway API.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One member of the storage cluster, as known at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub peer_url: String,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.peer_url)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberAddRequest<'a> {
    #[serde(rename = "peerURLs")]
    pub peer_urls: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct MemberListBody {
    #[serde(default)]
    members: Vec<WireMember>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "peerURLs")]
    peer_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    health: serde_json::Value,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Members from a member-add or member-list response body.
///
/// A member that has been added but never started has no name yet; it
/// is given `unnamed_as` when provided. Members without a peer URL
/// cannot be addressed and are dropped.
pub(crate) fn parse_members(body: &[u8], unnamed_as: Option<&str>) -> Result<Vec<Member>, String> {
    let parsed: MemberListBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;

    let members = parsed
        .members
        .into_iter()
        .filter_map(|m| {
            let Some(peer_url) = m.peer_urls.into_iter().next() else {
                warn!(name = %m.name, "skipping member without peer URL");
                return None;
            };
            let name = match (m.name.is_empty(), unnamed_as) {
                (true, Some(fallback)) => fallback.to_string(),
                _ => m.name,
            };
            Some(Member { name, peer_url })
        })
        .collect();

    Ok(members)
}

/// `Ok` when a `/health` body reports the member healthy.
pub(crate) fn parse_health(body: &[u8]) -> Result<(), String> {
    let parsed: HealthBody = serde_json::from_slice(body).map_err(|e| format!("invalid health body: {e}"))?;

    let healthy = match &parsed.health {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s == "true",
        _ => false,
    };

    if healthy {
        Ok(())
    } else if parsed.reason.is_empty() {
        Err(format!("health={}", parsed.health))
    } else {
        Err(parsed.reason)
    }
}

/// Best-effort message from a gateway error body.
pub(crate) fn gateway_error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<GatewayErrorBody>(body) {
        Ok(GatewayErrorBody { message: Some(m), .. }) => m,
        Ok(GatewayErrorBody { error: Some(e), .. }) => e,
        _ => String::from_utf8_lossy(body).trim().to_string(),
    }
}
