use anyhow::Context as _;
use keel_core::constants::unit_filepath;
use keel_core::types::storage_client_url_from_join_endpoint;
use keel_join::{JoinOrchestrator, JoinState, STORAGE_COMPONENT};
use keel_member::{MemberApi, MemberClient};
use tracing::info;

use super::{Context, init_system};

/// Join the stacked storage cluster behind the `[join]` API server.
///
/// A dry run writes the unit into a scratch directory and prints it
/// instead of touching the units dir.
pub async fn storage(ctx: &Context) -> anyhow::Result<()> {
    let mut cfg = ctx.load_config()?;

    if cfg.is_external_storage() {
        println!("[storage] External storage in use, nothing to join");
        return Ok(());
    }

    let join = cfg.join()?;
    let endpoint = storage_client_url_from_join_endpoint(&join.api_server_endpoint)?;
    info!(%endpoint, "[storage] Creating client that connects to the storage cluster");
    let client = MemberClient::connect(&endpoint, &cfg.paths.cert_dir)
        .with_context(|| format!("connecting to storage at {endpoint}"))?;

    let target = unit_filepath(STORAGE_COMPONENT.name(), &cfg.paths.units_dir);
    let scratch = if ctx.dry_run {
        let dir = tempfile::tempdir().context("creating dry-run units dir")?;
        cfg.paths.units_dir = dir.path().to_path_buf();
        Some(dir)
    } else {
        None
    };

    let init = init_system(ctx.dry_run)?;
    let report = JoinOrchestrator::new(&cfg, &client, init.as_ref())
        .with_dry_run(ctx.dry_run)
        .join()
        .await?;

    if scratch.is_some() {
        if let Some(path) = &report.unit_path {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            println!("[dryrun] Would write {}:", target.display());
            print!("{text}");
        }
    }

    if report.final_state() == JoinState::Verified {
        let members = client.list_members().await.context("listing storage members")?;
        println!(
            "[storage] Storage member {} joined a cluster of {} members",
            cfg.node.name,
            members.len()
        );
        for member in &members {
            println!("  {member}");
        }
    }
    Ok(())
}
