use anyhow::Context as _;
use keel_core::ServiceHostedConfig;
use keel_core::hosting::{is_service_hosted, mark_service_hosted};
use tracing::info;

use super::Context;

pub fn service_hosted(ctx: &Context) -> anyhow::Result<()> {
    let cfg = ctx.load_config()?;
    let path = cfg.service_hosted_marker_path();
    let marker = ServiceHostedConfig {
        api_server_advertise_endpoint: cfg.endpoint().api_server_address(),
    };

    if is_service_hosted(&path) {
        info!(?path, "[mark] Node already marked as service-hosted, rewriting marker");
    }

    if ctx.dry_run {
        info!(
            dry_run = true,
            ?path,
            endpoint = %marker.api_server_advertise_endpoint,
            "[dryrun] Would mark the node as service-hosted"
        );
        return Ok(());
    }

    mark_service_hosted(&path, &marker).context("writing the service-hosting marker")?;
    println!("[mark] Control plane of this node marked as service-hosted ({})", path.display());
    Ok(())
}
