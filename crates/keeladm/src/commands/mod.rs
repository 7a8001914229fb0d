//! Subcommand implementations.

use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use keel_core::ClusterConfig;
use keel_initsys::{InitSystem, InitSystemResult, ServiceState};
use tracing::info;

pub mod check;
pub mod config;
pub mod join;
pub mod mark;
pub mod units;

/// Options shared by every subcommand.
pub struct Context {
    pub config_path: PathBuf,
    pub dry_run: bool,
}

impl Context {
    pub fn load_config(&self) -> anyhow::Result<ClusterConfig> {
        ClusterConfig::from_file(&self.config_path)
            .with_context(|| format!("loading cluster config from {}", self.config_path.display()))
    }
}

/// Init system used for dry runs: logs what it would do, touches nothing.
pub struct DryRunInit;

#[async_trait]
impl InitSystem for DryRunInit {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn start(&self, unit: &str) -> InitSystemResult<()> {
        info!(dry_run = true, %unit, "[dryrun] Would start service {unit:?}");
        Ok(())
    }

    async fn status(&self, _unit: &str) -> InitSystemResult<ServiceState> {
        Ok(ServiceState::Unknown)
    }
}

/// The host init system, or [`DryRunInit`] for a dry run.
pub fn init_system(dry_run: bool) -> anyhow::Result<Box<dyn InitSystem>> {
    if dry_run {
        return Ok(Box::new(DryRunInit));
    }
    let init = keel_initsys::detect().context("detecting the host init system")?;
    info!(init = init.name(), "using host init system");
    Ok(Box::new(init))
}
