//! osm-streets - Street geocoding from OpenStreetMap extracts
//!
//! This library extracts named streets and administrative/postal boundaries
//! from an OSM PBF file and annotates every street with its postal code,
//! municipality, borough and suburb.

pub mod cancel;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod models;
pub mod pip;
pub mod pipeline;
pub mod progress;
pub mod snapshot;

pub use cancel::Cancellation;
pub use error::{Error, Result, SkipReason};
pub use models::{StreetRecord, StreetSet};
pub use snapshot::EntityStore;
