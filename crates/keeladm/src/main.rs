//! keeladm — bootstrap and join keel nodes.
//!
//! # Usage
//!
//! ```text
//! keeladm --config /etc/keel/keel.toml join storage
//! keeladm --dry-run units write --component apiserver --component scheduler
//! keeladm check storage
//! keeladm config print-defaults --node-name cp-1 --advertise-address 10.0.0.1
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use keel_core::ComponentId;
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_LOG_FILTER: &str = "info,keel=debug";

#[derive(Parser)]
#[command(
    name = "keeladm",
    about = "keel — node bootstrapper for a stacked control plane",
    version,
    propagate_version = true
)]
struct Cli {
    /// Cluster config file.
    #[arg(long, global = true, default_value = "/etc/keel/keel.toml")]
    config: PathBuf,

    /// Print what would change without changing it.
    #[arg(long, global = true)]
    dry_run: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Join this node to an existing cluster.
    Join {
        #[command(subcommand)]
        target: JoinTarget,
    },
    /// Manage host-level service units.
    Units {
        #[command(subcommand)]
        action: UnitsAction,
    },
    /// Health checks.
    Check {
        #[command(subcommand)]
        target: CheckTarget,
    },
    /// Record node facts for later phases.
    Mark {
        #[command(subcommand)]
        target: MarkTarget,
    },
    /// Cluster config helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum JoinTarget {
    /// Add this node to the stacked storage cluster and start its member.
    Storage,
}

#[derive(Subcommand)]
enum UnitsAction {
    /// Write unit files. Defaults to the control-plane components.
    Write {
        #[arg(long = "component", value_parser = parse_component)]
        components: Vec<ComponentId>,
    },
    /// Enable and start units. Defaults to the control-plane components.
    Start {
        #[arg(long = "component", value_parser = parse_component)]
        components: Vec<ComponentId>,
    },
    /// Show the init system's view of each unit.
    Status {
        #[arg(long = "component", value_parser = parse_component)]
        components: Vec<ComponentId>,
    },
}

#[derive(Subcommand)]
enum CheckTarget {
    /// Check that the storage cluster being joined is healthy.
    Storage,
}

#[derive(Subcommand)]
enum MarkTarget {
    /// Flag this node's control plane as running as host services.
    ServiceHosted,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a config with every default filled in.
    PrintDefaults {
        #[arg(long)]
        node_name: String,
        #[arg(long)]
        advertise_address: String,
    },
}

fn parse_component(s: &str) -> Result<ComponentId, String> {
    s.parse().map_err(|e: keel_core::CoreError| e.to_string())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Explicit components, or the control plane when none were given.
fn or_control_plane(components: Vec<ComponentId>) -> Vec<ComponentId> {
    if components.is_empty() {
        ComponentId::CONTROL_PLANE.to_vec()
    } else {
        components
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let ctx = commands::Context {
        config_path: cli.config,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Join { target } => match target {
            JoinTarget::Storage => commands::join::storage(&ctx).await,
        },
        Commands::Units { action } => match action {
            UnitsAction::Write { components } => commands::units::write(&ctx, &or_control_plane(components)),
            UnitsAction::Start { components } => {
                commands::units::start(&ctx, &or_control_plane(components)).await
            }
            UnitsAction::Status { components } => {
                commands::units::status(&or_control_plane(components)).await
            }
        },
        Commands::Check { target } => match target {
            CheckTarget::Storage => commands::check::storage(&ctx).await,
        },
        Commands::Mark { target } => match target {
            MarkTarget::ServiceHosted => commands::mark::service_hosted(&ctx),
        },
        Commands::Config { action } => match action {
            ConfigAction::PrintDefaults {
                node_name,
                advertise_address,
            } => commands::config::print_defaults(&node_name, &advertise_address),
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_components_and_global_flags() {
        let cli = Cli::try_parse_from([
            "keeladm",
            "units",
            "write",
            "--component",
            "storage-node",
            "--component",
            "scheduler",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.dry_run);
        match cli.command {
            Commands::Units {
                action: UnitsAction::Write { components },
            } => assert_eq!(components, [ComponentId::StorageNode, ComponentId::Scheduler]),
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn unknown_component_is_rejected() {
        assert!(Cli::try_parse_from(["keeladm", "units", "start", "--component", "etcd"]).is_err());
    }

    #[test]
    fn empty_component_list_means_control_plane() {
        assert_eq!(or_control_plane(Vec::new()), ComponentId::CONTROL_PLANE);
        assert_eq!(
            or_control_plane(vec![ComponentId::StorageNode]),
            [ComponentId::StorageNode]
        );
    }
}
