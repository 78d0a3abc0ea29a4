//! TOML run configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Top-level run configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sources: Sources,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Sources {
    pub root_folder: PathBuf,
    pub snapshot_file: PathBuf,
    pub osm: OsmSource,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OsmSource {
    pub local_pbf_file: PathBuf,
    pub remote_pbf_url: Url,
}

/// Retry policy for fetching the PBF extract.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 2,
            max_delay_secs: 60,
            user_agent: concat!("osm-streets/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Config {
    /// Load and parse a TOML config file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    /// Parse TOML config text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Local PBF file under the root folder
    pub fn pbf_path(&self) -> PathBuf {
        self.sources.root_folder.join(&self.sources.osm.local_pbf_file)
    }

    /// Snapshot cache file under the root folder
    pub fn snapshot_path(&self) -> PathBuf {
        self.sources.root_folder.join(&self.sources.snapshot_file)
    }
}
