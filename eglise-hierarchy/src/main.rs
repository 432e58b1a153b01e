//! eglise-hierarchy - maintenance tool for the hierarchy database
//!
//! Creates or upgrades the database and rebuilds impact chains. Mutations
//! go through the library; this binary only covers operator tasks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eglise_common::config::{resolve_root_folder, HierarchyConfig};
use eglise_hierarchy::Hierarchy;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "eglise-hierarchy", version, about = "Church hierarchy maintenance")]
struct Cli {
    /// Root folder holding the database (overrides EGLISE_ROOT_FOLDER and config)
    #[arg(long, global = true)]
    root_folder: Option<String>,

    /// Config file (defaults to the platform config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database
    Init,
    /// Rebuild one church's impact chain
    Rebuild {
        #[arg(long)]
        church: Uuid,
    },
    /// Rebuild every church's impact chain
    RebuildAll,
    /// Print a church's impact chain as JSON
    Chain {
        #[arg(long)]
        church: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HierarchyConfig::load_or_default(path),
        None => HierarchyConfig::load(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting eglise-hierarchy v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(cli.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Database path: {}", config.database_path(&root_folder).display());

    let hierarchy = Hierarchy::open(&config, &root_folder)
        .await
        .context("Failed to open database")?;

    match cli.command {
        Command::Init => {
            info!("Database ready");
        }
        Command::Rebuild { church } => {
            let entries = hierarchy.rebuild(church).await?;
            info!(church_id = %church, rows = entries.len(), "Rebuild complete");
        }
        Command::RebuildAll => {
            let rebuilt = hierarchy.rebuild_all().await?;
            info!(rebuilt, "Rebuild complete");
        }
        Command::Chain { church } => {
            let entries = hierarchy.impact_chain(church).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    hierarchy.pool().close().await;
    Ok(())
}
