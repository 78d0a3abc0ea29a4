//! Street table extraction from an OSM PBF extract.
//!
//! Downloads the configured extract if missing, builds (or reuses) the entity
//! snapshot and writes `streets.osm.csv` into the target folder.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use osm_streets::config::Config;
use osm_streets::pipeline::{ExportManager, OUTPUT_FILE};
use osm_streets::Cancellation;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "extract")]
#[command(about = "Build a street table with postal codes from OpenStreetMap data")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract all streets into <FOLDER>/streets.osm.csv
    Extract {
        /// Output folder
        #[arg(short, long)]
        folder: PathBuf,

        /// Configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", e);
    }

    let args = Args::parse();
    let started = Instant::now();

    let result = match args.command {
        Command::Extract { folder, config } => extract(folder, config).await,
    };

    match result {
        Ok(()) => info!("Finished in {:.1?}", started.elapsed()),
        Err(e) => {
            error!("Extraction failed after {:.1?}: {:#}", started.elapsed(), e);
            std::process::exit(1);
        }
    }
}

async fn extract(folder: PathBuf, config_path: PathBuf) -> Result<()> {
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let cancel = Cancellation::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            signal_cancel.cancel();
        }
    });

    info!("Street extraction");
    info!("Output: {}", folder.join(OUTPUT_FILE).display());

    let manager = ExportManager::new(config, cancel);
    let rows = manager
        .run(&folder)
        .await
        .context("Street extraction failed")?;

    info!("Exported {} streets", rows);
    Ok(())
}
