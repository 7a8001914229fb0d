use keel_join::{ApiServerDiscovery, CheckStorageOutcome, run_check_storage_phase};
use keel_join::phases::hosting_cache_for;

use super::Context;

/// Runs the check-storage phase. Read-only, so `--dry-run` changes nothing.
pub async fn storage(ctx: &Context) -> anyhow::Result<()> {
    let cfg = ctx.load_config()?;
    let hosting = hosting_cache_for(&cfg);

    let outcome = run_check_storage_phase(&cfg, &hosting, || {
        let join = cfg.join()?;
        ApiServerDiscovery::connect(&join.api_server_endpoint, &cfg.paths.cert_dir)
    })
    .await?;

    match outcome {
        CheckStorageOutcome::SkippedNotControlPlane => println!("[check-storage] Not a control-plane join, nothing to check"),
        CheckStorageOutcome::SkippedExternal => println!("[check-storage] External storage, nothing to check"),
        CheckStorageOutcome::CheckedEndpoint(endpoint) => {
            println!("[check-storage] Storage member at {endpoint} is healthy")
        }
        CheckStorageOutcome::CheckedDiscovered => println!("[check-storage] All storage replicas are healthy"),
    }
    Ok(())
}
