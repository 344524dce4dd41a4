//! fleetctl — drive fleetgrid deployment groups from the command line.
//!
//! Groups, composite apps and logical clouds come from a catalog file that
//! `fleetctl import` copies next to the state store. Every other command
//! works against the store and that imported catalog.
//!
//! # Usage
//!
//! ```text
//! fleetctl init --data-dir /var/lib/fleetgrid
//! fleetctl import demos/catalog.toml
//! fleetctl approve --project demo --app shop --version v1 --group east
//! fleetctl instantiate --project demo --app shop --version v1 --group east
//! fleetctl status --project demo --app shop --version v1 --group east
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fleetgrid_core::FleetConfig;
use fleetgrid_state::GroupKey;

mod catalog;
mod commands;
mod local;

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "fleetgrid: multi-cluster deployment lifecycle"
)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, default_value = "fleetgrid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file rooted at a data directory
    Init {
        #[arg(long, default_value = ".fleetgrid")]
        data_dir: PathBuf,
    },
    /// Import a catalog: logical clouds, labels, composite apps, groups and intents
    Import { path: PathBuf },
    /// Approve a deployment group
    Approve(GroupArgs),
    /// Instantiate an approved deployment group
    Instantiate(GroupArgs),
    /// Roll out the current intents of an instantiated group as a new revision
    Update(GroupArgs),
    /// Return an instantiated group to an earlier revision
    Rollback {
        #[command(flatten)]
        group: GroupArgs,
        #[arg(long)]
        revision: u64,
    },
    /// Move a group's workload to another approved group
    Migrate {
        #[command(flatten)]
        group: GroupArgs,
        /// Composite app version of the target group.
        #[arg(long)]
        to_version: String,
        #[arg(long)]
        to_group: String,
    },
    /// Terminate an instantiated group
    Terminate(GroupArgs),
    /// Stop an in-flight instantiation or termination
    Stop(GroupArgs),
    /// Delete a terminated or never-instantiated group
    Delete(GroupArgs),
    /// Show a group's state and action log
    Status(GroupArgs),
}

#[derive(Args, Clone)]
struct GroupArgs {
    #[arg(long)]
    project: String,
    /// Composite app name.
    #[arg(long)]
    app: String,
    #[arg(long)]
    version: String,
    #[arg(long)]
    group: String,
}

impl GroupArgs {
    fn key(&self) -> GroupKey {
        GroupKey::new(&self.project, &self.app, &self.version, &self.group)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = FleetConfig::load_or_default(&cli.config)?;
    init_tracing(&config)?;

    match cli.command {
        Commands::Init { data_dir } => commands::init(&cli.config, &data_dir),
        Commands::Import { path } => commands::import(&config, &path).await,
        Commands::Approve(args) => commands::approve(&config, &args.key()).await,
        Commands::Instantiate(args) => commands::instantiate(&config, &args.key()).await,
        Commands::Update(args) => commands::update(&config, &args.key()).await,
        Commands::Rollback { group, revision } => {
            commands::rollback(&config, &group.key(), revision).await
        }
        Commands::Migrate {
            group,
            to_version,
            to_group,
        } => {
            let target = GroupKey::new(&group.project, &group.app, &to_version, &to_group);
            commands::migrate(&config, &group.key(), &target).await
        }
        Commands::Terminate(args) => commands::terminate(&config, &args.key()).await,
        Commands::Stop(args) => commands::stop(&config, &args.key()).await,
        Commands::Delete(args) => commands::delete(&config, &args.key()).await,
        Commands::Status(args) => commands::status(&config, &args.key()).await,
    }
}

fn init_tracing(config: &FleetConfig) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(&config.logging.filter)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
