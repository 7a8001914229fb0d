//! Joining a node to a running stacked storage cluster.
//!
//! The member is registered with the cluster before its process is
//! started; a process started first would never be accepted as a peer.
//!
//! ```text
//! Start ──(external storage)──────────────────────────────────► Done
//!   │
//!   ▼
//! MemberRegistered ──► UnitWritten ──(dry run)──────────────────► Done
//!                                    │
//!                                    ▼
//!                               ServiceStarted ──► Verified
//! ```
//!
//! Every step is fatal on error and nothing is rolled back. An error
//! after registration leaves the member in the cluster; the operator
//! removes it by hand.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use keel_core::constants::{STORAGE_HEALTHY_CHECK_INTERVAL, STORAGE_HEALTHY_CHECK_RETRIES};
use keel_core::{ApiEndpoint, ClusterConfig};
use keel_initsys::{InitSystem, write_unit_to_disk};
use keel_member::{Member, MemberApi};
use tracing::{debug, info};

use crate::error::JoinResult;
use crate::storage::{STORAGE_COMPONENT, storage_unit_spec};

/// How long to wait for the cluster after starting the new member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: STORAGE_HEALTHY_CHECK_RETRIES,
            interval: STORAGE_HEALTHY_CHECK_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the whole wait. Saturates at [`Duration::MAX`].
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.retries)
    }
}

/// Steps of a storage join, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Start,
    MemberRegistered,
    UnitWritten,
    ServiceStarted,
    Verified,
    Done,
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinState::Start => "start",
            JoinState::MemberRegistered => "member-registered",
            JoinState::UnitWritten => "unit-written",
            JoinState::ServiceStarted => "service-started",
            JoinState::Verified => "verified",
            JoinState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReport {
    /// Every state reached, `Start` first.
    pub states: Vec<JoinState>,
    /// Unit file written, if any.
    pub unit_path: Option<PathBuf>,
    /// Membership snapshot the unit was rendered from. Empty for a dry
    /// run or external storage.
    pub members: Vec<Member>,
    pub dry_run: bool,
}

impl JoinReport {
    pub fn final_state(&self) -> JoinState {
        self.states.last().copied().unwrap_or(JoinState::Start)
    }
}

/// Sequences one storage join attempt.
pub struct JoinOrchestrator<'a, M: ?Sized, I: ?Sized> {
    cfg: &'a ClusterConfig,
    endpoint: ApiEndpoint,
    node_name: String,
    members: &'a M,
    init: &'a I,
    dry_run: bool,
    retry: RetryPolicy,
}

impl<'a, M, I> JoinOrchestrator<'a, M, I>
where
    M: MemberApi + ?Sized,
    I: InitSystem + ?Sized,
{
    /// Join as the node described by `cfg`, talking to the cluster
    /// through `members` and starting the unit through `init`.
    pub fn new(cfg: &'a ClusterConfig, members: &'a M, init: &'a I) -> Self {
        Self {
            cfg,
            endpoint: cfg.endpoint(),
            node_name: cfg.node.name.clone(),
            members,
            init,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn join(&self) -> JoinResult<JoinReport> {
        let mut report = JoinReport {
            states: vec![JoinState::Start],
            unit_path: None,
            members: Vec::new(),
            dry_run: self.dry_run,
        };

        if self.cfg.is_external_storage() {
            info!("[storage] External storage in use, nothing to join");
            report.states.push(JoinState::Done);
            return Ok(report);
        }

        let peer_url = self.endpoint.storage_peer_url();
        let node = self.node_name.as_str();

        if self.dry_run {
            info!(dry_run = true, %peer_url, "[dryrun] Would add storage member: {peer_url}");
        } else {
            debug!(%node, %peer_url, endpoint = %self.members.endpoint(), "[storage] Adding storage member");
            report.members = self.members.add_member(node, &peer_url).await?;
            info!(%node, "[storage] Announced new storage member joining the existing cluster");
            debug!(members = ?report.members, "[storage] Updated storage member list");
        }
        report.states.push(JoinState::MemberRegistered);

        let component = STORAGE_COMPONENT.name();
        info!(%component, "[storage] Creating service unit file for {component:?}");
        let spec = storage_unit_spec(self.cfg, &self.endpoint, node, &report.members);
        report.unit_path = Some(write_unit_to_disk(component, &self.cfg.paths.units_dir, &spec)?);
        report.states.push(JoinState::UnitWritten);

        if self.dry_run {
            info!(dry_run = true, "[dryrun] Would wait for the new storage member to join the cluster");
            report.states.push(JoinState::Done);
            return Ok(report);
        }

        self.init.start(component).await?;
        report.states.push(JoinState::ServiceStarted);

        let budget = self.retry.budget();
        info!(
            init = self.init.name(),
            "[storage] Waiting for the new storage member to join the cluster. This can take up to {budget:?}"
        );
        self.members
            .wait_for_cluster_available(self.retry.retries, self.retry.interval)
            .await?;
        report.states.push(JoinState::Verified);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_constants() {
        let p = RetryPolicy::default();
        assert_eq!(p.retries, 8);
        assert_eq!(p.interval, Duration::from_secs(5));
        assert_eq!(p.budget(), Duration::from_secs(40));
    }

    #[test]
    fn oversized_policy_budget_saturates() {
        let p = RetryPolicy {
            retries: 4,
            interval: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(p.budget(), Duration::MAX);
    }

    #[test]
    fn final_state_of_empty_report() {
        let report = JoinReport {
            states: Vec::new(),
            unit_path: None,
            members: Vec::new(),
            dry_run: false,
        };
        assert_eq!(report.final_state(), JoinState::Start);
    }

    #[test]
    fn state_names() {
        assert_eq!(JoinState::MemberRegistered.to_string(), "member-registered");
        assert_eq!(JoinState::Verified.to_string(), "verified");
    }
}
