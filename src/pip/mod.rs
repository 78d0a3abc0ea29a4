//! Area geometry and point-in-polygon street annotation.
//!
//! Boundary relations are assembled into polygons, and every street centroid
//! is matched against the nested municipality, postal code, borough and
//! suburb levels.

mod boundary;
pub mod geometry;
mod service;

pub use boundary::{extract_areas, extract_streets, repair, GeoArea, GeoStreet};
pub use geometry::{build_area_geometry, AssemblyError};
pub use service::AreaResolver;
