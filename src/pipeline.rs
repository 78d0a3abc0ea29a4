//! End-to-end run: source download, snapshot, area resolution, CSV export.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::download::Downloader;
use crate::export::write_streets;
use crate::pip::{extract_streets, AreaResolver};
use crate::snapshot::{create_snapshot, EntitySource, EntityStore, PbfFileSource};
use crate::{Cancellation, Error, Result};

/// Name of the table written into the output folder.
pub const OUTPUT_FILE: &str = "streets.osm.csv";

/// Runs one export with a fixed configuration and cancellation token.
pub struct ExportManager {
    config: Config,
    cancel: Cancellation,
}

impl ExportManager {
    /// Create a manager for `config`; `cancel` is checked throughout the run.
    pub fn new(config: Config, cancel: Cancellation) -> Self {
        Self { config, cancel }
    }

    /// Run the whole export into `folder`, returning the number of rows.
    pub async fn run(&self, folder: &Path) -> Result<u64> {
        let pbf_path = self.ensure_pbf().await?;

        let source = PbfFileSource::new(pbf_path);
        let store = load_or_create_snapshot(&source, &self.config.snapshot_path(), &self.cancel)?;

        fs::create_dir_all(folder).map_err(|e| Error::io(folder, e))?;
        export_store(&store, &folder.join(OUTPUT_FILE), &self.cancel)
    }

    /// Local PBF path, downloading the extract first if it is missing.
    async fn ensure_pbf(&self) -> Result<PathBuf> {
        let path = self.config.pbf_path();
        if path.exists() {
            info!("Using local extract {}", path.display());
            return Ok(path);
        }

        let downloader = Downloader::new(self.config.download.clone())?;
        downloader
            .download(&self.config.sources.osm.remote_pbf_url, &path, &self.cancel)
            .await?;
        Ok(path)
    }
}

/// Read the cached snapshot at `snapshot_path`, or extract it from `source`
/// and cache it there.
pub fn load_or_create_snapshot(
    source: &dyn EntitySource,
    snapshot_path: &Path,
    cancel: &Cancellation,
) -> Result<EntityStore> {
    if snapshot_path.exists() {
        info!("Loading snapshot {}", snapshot_path.display());
        return EntityStore::load(snapshot_path);
    }

    let store = create_snapshot(source, cancel)?;
    if let Some(parent) = snapshot_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    store.save(snapshot_path)?;
    info!("Saved snapshot {}", snapshot_path.display());
    Ok(store)
}

/// Resolve every street of `store` and write the table to `output`.
pub fn export_store(store: &EntityStore, output: &Path, cancel: &Cancellation) -> Result<u64> {
    let resolver = AreaResolver::from_store(store, cancel)?;
    let streets = extract_streets(store, cancel)?;
    let records = resolver.build_streets(&streets, cancel)?;
    write_streets(output, &records, cancel)
}
