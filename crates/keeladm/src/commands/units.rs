use anyhow::Context as _;
use keel_core::ComponentId;
use keel_core::constants::unit_filepath;
use keel_initsys::InitSystem;
use keel_join::{control_plane_unit_specs, create_service_unit_files, create_storage_unit_file, run_services, storage_unit_spec};
use tracing::info;

use super::{Context, init_system};

/// Write the units of `components` for the first node of a cluster.
pub fn write(ctx: &Context, components: &[ComponentId]) -> anyhow::Result<()> {
    let cfg = ctx.load_config()?;
    let endpoint = cfg.endpoint();
    let units_dir = &cfg.paths.units_dir;

    if ctx.dry_run {
        let specs = control_plane_unit_specs(&cfg, &endpoint);
        for component in components {
            let spec = match component {
                ComponentId::StorageNode => storage_unit_spec(&cfg, &endpoint, &cfg.node.name, &[]),
                cp => specs
                    .get(cp)
                    .cloned()
                    .with_context(|| format!("no unit for {cp}"))?,
            };
            spec.validate(component.name())?;
            let path = unit_filepath(component.name(), units_dir);
            info!(dry_run = true, %component, ?path, "[dryrun] Would write service unit");
            println!("[dryrun] Would write {}:", path.display());
            print!("{}", spec.render());
        }
        return Ok(());
    }

    for component in components {
        let path = match component {
            ComponentId::StorageNode => create_storage_unit_file(units_dir, &cfg.node.name, &cfg, &endpoint)?,
            cp => {
                let mut written = create_service_unit_files(units_dir, &cfg, &endpoint, &[*cp])?;
                written
                    .pop()
                    .with_context(|| format!("no unit written for {cp}"))?
            }
        };
        println!("[units] Wrote {}", path.display());
    }
    Ok(())
}

/// Enable and start `components`, stopping at the first failure.
pub async fn start(ctx: &Context, components: &[ComponentId]) -> anyhow::Result<()> {
    let init = init_system(ctx.dry_run)?;
    run_services(init.as_ref(), components).await?;
    if !ctx.dry_run {
        println!("[units] Started {} service(s) with {}", components.len(), init.name());
    }
    Ok(())
}

/// Print the init system's state for each of `components`.
pub async fn status(components: &[ComponentId]) -> anyhow::Result<()> {
    let init = init_system(false)?;
    for component in components {
        let state = init
            .status(component.name())
            .await
            .with_context(|| format!("querying {component}"))?;
        println!("{component}\t{state:?}");
    }
    Ok(())
}
