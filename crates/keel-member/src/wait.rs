//! Waiting for a storage cluster to become available.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::HealthProbe;
use crate::error::{MemberError, MemberResult};

/// Poll `probe` until it reports healthy.
///
/// Makes at most `max_attempts` checks, sleeping `interval` between
/// them (never after the last). Returns on the first success.
pub async fn wait_for_cluster_available<P>(probe: &P, max_attempts: u32, interval: Duration) -> MemberResult<()>
where
    P: HealthProbe + ?Sized,
{
    let endpoint = probe.endpoint();
    let mut last_error = String::from("no health check attempted");

    for attempt in 1..=max_attempts {
        match probe.check_health().await {
            Ok(()) => {
                info!(%endpoint, attempt, "storage cluster is available");
                return Ok(());
            }
            Err(e) => {
                debug!(%endpoint, attempt, max_attempts, error = %e, "storage cluster not available yet");
                last_error = e.to_string();
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    warn!(%endpoint, attempts = max_attempts, error = %last_error, "gave up waiting for storage cluster");
    Err(MemberError::ClusterUnavailable {
        endpoint: endpoint.to_string(),
        attempts: max_attempts,
        last_error,
    })
}
