//! Nested area lookup for street centroids.

use tracing::{debug, info};

use super::boundary::{extract_areas, GeoArea, GeoStreet};
use crate::models::{AreaLevel, StreetRecord, StreetSet};
use crate::progress::Phase;
use crate::snapshot::EntityStore;
use crate::{Cancellation, Result};

/// Annotates streets with municipality, postal code, borough and suburb.
///
/// Each level is searched in collection order and the first area containing
/// the centroid is used, so overlapping areas resolve by enumeration order.
#[derive(Debug, Default)]
pub struct AreaResolver {
    municipalities: Vec<GeoArea>,
    postal_code_areas: Vec<GeoArea>,
    boroughs: Vec<GeoArea>,
    suburbs: Vec<GeoArea>,
}

impl AreaResolver {
    /// Create a resolver from already built areas, each level in lookup order.
    pub fn new(
        municipalities: Vec<GeoArea>,
        postal_code_areas: Vec<GeoArea>,
        boroughs: Vec<GeoArea>,
        suburbs: Vec<GeoArea>,
    ) -> Self {
        Self {
            municipalities,
            postal_code_areas,
            boroughs,
            suburbs,
        }
    }

    /// Build the geometry of every area level in `store`.
    pub fn from_store(store: &EntityStore, cancel: &Cancellation) -> Result<Self> {
        let resolver = Self::new(
            extract_areas(store, AreaLevel::Municipality, cancel)?,
            extract_areas(store, AreaLevel::PostalCode, cancel)?,
            extract_areas(store, AreaLevel::Borough, cancel)?,
            extract_areas(store, AreaLevel::Suburb, cancel)?,
        );
        info!(
            "Resolver ready: {} municipalities, {} postal code areas, {} boroughs, {} suburbs",
            resolver.municipalities.len(),
            resolver.postal_code_areas.len(),
            resolver.boroughs.len(),
            resolver.suburbs.len()
        );
        Ok(resolver)
    }

    /// The most specific record for `street`, or `None` when no municipality
    /// with a containing postal code area is found.
    pub fn resolve(&self, street: &GeoStreet) -> Option<StreetRecord> {
        let point = &street.centroid;

        for municipality in self.municipalities.iter().filter(|m| m.contains(point)) {
            let Some(postal) = self.postal_code_areas.iter().find(|p| p.contains(point)) else {
                debug!(
                    "{:?} lies in {:?} but in no postal code area",
                    street.name, municipality.name
                );
                continue;
            };

            let borough = self.boroughs.iter().find(|b| b.contains(point));
            let suburb = borough.and_then(|_| self.suburbs.iter().find(|s| s.contains(point)));

            return Some(StreetRecord {
                name: street.name.clone(),
                postal_code: postal.key.postal_code().unwrap_or_default().to_string(),
                locality: municipality.name.clone(),
                regional_key: municipality.key.regional_key().unwrap_or_default().to_string(),
                borough: borough.map(|b| b.name.clone()),
                suburb: suburb.map(|s| s.name.clone()),
            });
        }

        None
    }

    /// Resolve every street and collect the distinct records in order.
    pub fn build_streets(&self, streets: &[GeoStreet], cancel: &Cancellation) -> Result<StreetSet> {
        let phase = Phase::start("Resolving streets");
        let mut records = StreetSet::new();
        let mut unresolved = 0u64;

        for (seen, street) in streets.iter().enumerate() {
            cancel.check()?;

            match self.resolve(street) {
                Some(record) => {
                    records.insert(record);
                }
                None => unresolved += 1,
            }
            if seen % 10_000 == 0 {
                phase.update(records.len() as u64, seen as u64);
            }
        }

        phase.finish(format!(
            "done: {} records from {} streets, {} unresolved",
            records.len(),
            streets.len(),
            unresolved
        ));
        Ok(records)
    }
}
