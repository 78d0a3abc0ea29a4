//! Error types shared by the extraction pipeline.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read OSM PBF data")]
    Pbf(#[from] osmpbfreader::Error),

    #[error("invalid snapshot file")]
    Snapshot(#[from] serde_json::Error),

    #[error("failed to write CSV output")]
    Csv(#[from] csv::Error),

    #[error("download of {url} failed after {attempts} attempt(s): {reason}")]
    Download {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("failed to create HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why an entity was left out of the working set. Data-quality problems are
/// expected in regional extracts and never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("referenced way {0} was not found in the extract")]
    MissingWay(i64),

    #[error("referenced node {0} was not found in the extract")]
    MissingNode(i64),

    #[error("way {0} has no nodes")]
    EmptyWay(i64),

    #[error("geometry assembly failed: {0}")]
    Assembly(#[from] crate::pip::AssemblyError),

    #[error("geometry is invalid after repair")]
    InvalidGeometry,

    #[error("street has no centroid")]
    NoCentroid,
}
