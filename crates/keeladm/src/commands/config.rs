use keel_core::ClusterConfig;

pub fn print_defaults(node_name: &str, advertise_address: &str) -> anyhow::Result<()> {
    let cfg = ClusterConfig::scaffold(node_name, advertise_address);
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}
