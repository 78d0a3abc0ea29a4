//! Typed areas and streets with resolved geometry.

use geo::orient::Direction;
use geo::{
    BooleanOps, Centroid, Contains, Geometry, MultiPolygon, Orient, Point, RemoveRepeatedPoints,
    Validation,
};
use tracing::debug;

use super::geometry::build_area_geometry;
use crate::error::SkipReason;
use crate::models::{AreaKey, AreaLevel, CompleteArea, CompleteStreet};
use crate::progress::Phase;
use crate::snapshot::tags::{normalize_area_name, normalize_street_name};
use crate::snapshot::EntityStore;
use crate::{Cancellation, Result};

/// An area with valid polygonal geometry.
#[derive(Debug, Clone)]
pub struct GeoArea {
    pub name: String,
    pub key: AreaKey,
    pub geometry: Geometry<f64>,
}

impl GeoArea {
    /// Assemble, validate and if needed repair the geometry of `area`.
    pub fn from_complete(area: &CompleteArea) -> std::result::Result<Self, SkipReason> {
        let geometry = build_area_geometry(area)?;
        let geometry = repair(geometry).ok_or(SkipReason::InvalidGeometry)?;

        Ok(Self {
            name: normalize_area_name(&area.name),
            key: area.key.clone(),
            geometry,
        })
    }

    /// Strict containment: points on the boundary are outside.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.geometry.contains(point)
    }
}

/// Return `geometry` if it is a valid, non-empty polygonal geometry,
/// otherwise a repaired copy, or `None` when repair fails.
pub fn repair(geometry: Geometry<f64>) -> Option<Geometry<f64>> {
    let valid = geometry.is_valid();
    let multi = match geometry {
        Geometry::Polygon(polygon) if valid => return Some(Geometry::Polygon(polygon)),
        Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
        Geometry::MultiPolygon(multi) => multi,
        _ => return None,
    };
    if valid {
        return collapse(multi);
    }

    // Duplicate vertices and winding order first, then a full overlay
    let cleaned = multi.remove_repeated_points().orient(Direction::Default);
    if cleaned.is_valid() {
        return collapse(cleaned);
    }

    // Members are merged one by one so overlapping parts stay covered
    let merged = cleaned
        .0
        .into_iter()
        .fold(MultiPolygon::<f64>::new(vec![]), |acc, polygon| {
            acc.union(&MultiPolygon::new(vec![polygon]))
        });
    if merged.is_valid() {
        return collapse(merged);
    }

    None
}

fn collapse(mut multi: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match multi.0.len() {
        0 => None,
        1 => multi.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(multi)),
    }
}

/// A street reduced to its normalized name and centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoStreet {
    pub name: String,
    pub centroid: Point<f64>,
}

impl GeoStreet {
    /// Fails with [`SkipReason::NoCentroid`] for a street without nodes.
    pub fn from_complete(street: &CompleteStreet) -> std::result::Result<Self, SkipReason> {
        let centroid = street
            .line_string()
            .centroid()
            .ok_or(SkipReason::NoCentroid)?;

        Ok(Self {
            name: normalize_street_name(&street.name),
            centroid,
        })
    }
}

/// Build every area of `level` that survives resolution and repair, in
/// snapshot order.
pub fn extract_areas(
    store: &EntityStore,
    level: AreaLevel,
    cancel: &Cancellation,
) -> Result<Vec<GeoArea>> {
    let phase = Phase::start(format!("Building {}", level.label()));
    let mut areas = Vec::new();
    let mut skipped = 0u64;

    for area in store.complete_areas(level) {
        cancel.check()?;

        let complete = match area {
            Ok(complete) => complete,
            Err(reason) => {
                debug!("Skipped {}: {}", level.label(), reason);
                skipped += 1;
                continue;
            }
        };
        match GeoArea::from_complete(&complete) {
            Ok(area) => areas.push(area),
            Err(reason) => {
                debug!("Skipped {} {:?}: {}", level.label(), complete.name, reason);
                skipped += 1;
            }
        }
        phase.count(areas.len() as u64);
    }

    phase.finish(format!("done: {} built, {} skipped", areas.len(), skipped));
    Ok(areas)
}

/// Centroids of every resolvable street, in snapshot order.
pub fn extract_streets(store: &EntityStore, cancel: &Cancellation) -> Result<Vec<GeoStreet>> {
    let phase = Phase::start("Building streets");
    let mut streets = Vec::with_capacity(store.streets.len());
    let mut skipped = 0u64;

    for (seen, street) in store.complete_streets().enumerate() {
        cancel.check()?;

        match street.and_then(|street| GeoStreet::from_complete(&street)) {
            Ok(street) => streets.push(street),
            Err(reason) => {
                debug!("Skipped street: {}", reason);
                skipped += 1;
            }
        }
        if seen % 10_000 == 0 {
            phase.update(streets.len() as u64, seen as u64);
        }
    }

    phase.finish(format!("done: {} built, {} skipped", streets.len(), skipped));
    Ok(streets)
}
