//! Snapshot of every OSM entity needed for street geocoding.
//!
//! The snapshot is filled by the three extraction passes and can be cached as
//! JSON, so that the expensive PBF decoding only happens once per extract.

pub mod extract;
pub mod tags;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SkipReason;
use crate::models::{Area, AreaLevel, CompleteArea, CompleteStreet, CompleteWay, Node, Street, Way};
use crate::{Error, Result};

pub use extract::{create_snapshot, EntitySource, MemorySource, OsmEntity, PbfFileSource};

/// Raw entities for one run. `None` values mark ids that were referenced but
/// not (yet) found in the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    #[serde(default)]
    pub boroughs: Vec<Area>,
    #[serde(default)]
    pub municipalities: Vec<Area>,
    #[serde(default)]
    pub nodes: BTreeMap<i64, Option<Node>>,
    #[serde(default)]
    pub postal_code_areas: Vec<Area>,
    #[serde(default)]
    pub streets: Vec<Street>,
    #[serde(default)]
    pub suburbs: Vec<Area>,
    #[serde(default)]
    pub ways: BTreeMap<i64, Option<Way>>,
}

impl EntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw areas of one level, in extraction order.
    pub fn areas(&self, level: AreaLevel) -> &[Area] {
        match level {
            AreaLevel::PostalCode => &self.postal_code_areas,
            AreaLevel::Municipality => &self.municipalities,
            AreaLevel::Borough => &self.boroughs,
            AreaLevel::Suburb => &self.suburbs,
        }
    }

    /// Append an area to the collection of its level.
    pub fn push_area(&mut self, level: AreaLevel, area: Area) {
        match level {
            AreaLevel::PostalCode => self.postal_code_areas.push(area),
            AreaLevel::Municipality => self.municipalities.push(area),
            AreaLevel::Borough => self.boroughs.push(area),
            AreaLevel::Suburb => self.suburbs.push(area),
        }
    }

    /// Register a way id as needed without overwriting a resolved value.
    pub fn want_way(&mut self, id: i64) {
        self.ways.entry(id).or_insert(None);
    }

    pub fn want_node(&mut self, id: i64) {
        self.nodes.entry(id).or_insert(None);
    }

    /// True when the way id was registered, resolved or not.
    pub fn wants_way(&self, id: i64) -> bool {
        self.ways.contains_key(&id)
    }

    pub fn wants_node(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Load a snapshot previously written by [`EntityStore::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let store: EntityStore = serde_json::from_reader(BufReader::new(file))?;
        info!(
            "Loaded snapshot with {} streets, {} ways, {} nodes",
            store.streets.len(),
            store.ways.len(),
            store.nodes.len()
        );
        Ok(store)
    }

    /// Write the snapshot as pretty JSON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    fn complete_nodes(&self, ids: &[i64]) -> std::result::Result<Vec<Node>, SkipReason> {
        ids.iter()
            .map(|id| {
                self.nodes
                    .get(id)
                    .copied()
                    .flatten()
                    .ok_or(SkipReason::MissingNode(*id))
            })
            .collect()
    }

    /// Resolve a way and all of its nodes.
    pub fn complete_way(&self, id: i64) -> std::result::Result<CompleteWay, SkipReason> {
        let way = self
            .ways
            .get(&id)
            .and_then(Option::as_ref)
            .ok_or(SkipReason::MissingWay(id))?;
        if way.nodes.is_empty() {
            return Err(SkipReason::EmptyWay(id));
        }
        Ok(CompleteWay::new(self.complete_nodes(&way.nodes)?))
    }

    /// Resolve every way of `area`. Any unresolved way or node drops the area.
    pub fn complete_area(&self, area: &Area) -> std::result::Result<CompleteArea, SkipReason> {
        let mut outer_ways = Vec::with_capacity(area.outer_ways.len());
        for &way_id in &area.outer_ways {
            let mut way = self.complete_way(way_id)?;
            patch_known_defects(&area.name, way_id, &mut way);
            outer_ways.push(way);
        }

        let inner_ways = area
            .inner_ways
            .iter()
            .map(|&way_id| self.complete_way(way_id))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CompleteArea {
            name: area.name.clone(),
            key: area.key.clone(),
            outer_ways,
            inner_ways,
        })
    }

    /// Resolve the nodes of a street.
    pub fn complete_street(&self, street: &Street) -> std::result::Result<CompleteStreet, SkipReason> {
        Ok(CompleteStreet {
            name: street.name.clone(),
            nodes: self.complete_nodes(&street.nodes)?,
        })
    }

    /// Complete areas of one level, in snapshot order.
    pub fn complete_areas(
        &self,
        level: AreaLevel,
    ) -> impl Iterator<Item = std::result::Result<CompleteArea, SkipReason>> + '_ {
        self.areas(level).iter().map(|area| self.complete_area(area))
    }

    pub fn complete_streets(
        &self,
    ) -> impl Iterator<Item = std::result::Result<CompleteStreet, SkipReason>> + '_ {
        self.streets.iter().map(|street| self.complete_street(street))
    }
}

/// Crossing boundary ways around Pfullingen share a node that keeps the outer
/// ring from closing. The node is nudged until the upstream data is fixed.
fn patch_known_defects(area_name: &str, way_id: i64, way: &mut CompleteWay) {
    const PFULLINGEN_WAYS: [i64; 2] = [328070220, 206313961];

    if area_name != "Pfullingen" || !PFULLINGEN_WAYS.contains(&way_id) {
        return;
    }

    // Compare at the PBF's 1e-7 degree resolution
    if let Some(node) = way
        .nodes
        .iter_mut()
        .find(|node| (node.lat * 1e7).round() as i64 == 484_556_334)
    {
        *node = Node::new(48.4556335, 9.2800752);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AreaKey;

    fn sample_store() -> EntityStore {
        let mut store = EntityStore::new();
        store.nodes.insert(1, Some(Node::new(48.0, 9.0)));
        store.nodes.insert(2, Some(Node::new(48.0, 9.1)));
        store.nodes.insert(3, Some(Node::new(48.1, 9.1)));
        store.nodes.insert(4, None);
        store.ways.insert(10, Some(Way::new(vec![1, 2, 3, 1])));
        store.ways.insert(11, None);
        store.ways.insert(12, Some(Way::new(vec![1, 4])));

        let mut area = Area::new("Pfullingen", AreaKey::RegionalKey("08415059".to_string()));
        area.outer_ways.push(10);
        store.push_area(AreaLevel::Municipality, area);

        let mut postal = Area::new("Pfullingen", AreaKey::PostalCode("72793".to_string()));
        postal.outer_ways.push(10);
        postal.inner_ways.push(11);
        store.push_area(AreaLevel::PostalCode, postal);

        store.push_area(AreaLevel::Borough, Area::new("Nord", AreaKey::None));
        store.streets.push(Street {
            name: "Hauptstraße".to_string(),
            nodes: vec![1, 2],
        });
        store
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let store = sample_store();
        store.save(&path).unwrap();
        let loaded = EntityStore::load(&path).unwrap();

        assert_eq!(loaded, store);
        assert_eq!(loaded.nodes.get(&4), Some(&None));
        assert_eq!(loaded.ways.get(&11), Some(&None));
    }

    #[test]
    fn test_snapshot_round_trip_preserves_float_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut store = EntityStore::new();
        store.nodes.insert(7, Some(Node::new(48.4556334, 9.280_075_199_999_999)));
        store.nodes.insert(8, Some(Node::new(-0.1 + 0.2, 1.0 / 3.0)));
        store.save(&path).unwrap();

        assert_eq!(EntityStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = EntityStore::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_want_does_not_overwrite() {
        let mut store = sample_store();
        store.want_node(1);
        store.want_way(10);
        assert!(store.nodes[&1].is_some());
        assert!(store.ways[&10].is_some());

        store.want_node(99);
        assert!(store.wants_node(99));
        assert_eq!(store.nodes[&99], None);
    }

    #[test]
    fn test_complete_area_resolves_ways() {
        let store = sample_store();
        let area = store.complete_areas(AreaLevel::Municipality).next().unwrap().unwrap();
        assert_eq!(area.outer_ways.len(), 1);
        assert!(area.outer_ways[0].is_closed());
        assert!(area.inner_ways.is_empty());
    }

    #[test]
    fn test_complete_area_skip_reasons() {
        let store = sample_store();
        let postal = store.complete_areas(AreaLevel::PostalCode).next().unwrap();
        assert_eq!(postal, Err(SkipReason::MissingWay(11)));

        let mut area = Area::new("X", AreaKey::None);
        area.outer_ways.push(12);
        assert_eq!(store.complete_area(&area), Err(SkipReason::MissingNode(4)));

        area.outer_ways = vec![404];
        assert_eq!(store.complete_area(&area), Err(SkipReason::MissingWay(404)));

        let mut store = store;
        store.ways.insert(13, Some(Way::new(vec![])));
        area.outer_ways = vec![13];
        assert_eq!(store.complete_area(&area), Err(SkipReason::EmptyWay(13)));
    }

    #[test]
    fn test_complete_street_missing_node() {
        let mut store = sample_store();
        store.streets.push(Street {
            name: "Lindenweg".to_string(),
            nodes: vec![2, 4],
        });

        let results: Vec<_> = store.complete_streets().collect();
        assert_eq!(results[0].as_ref().unwrap().nodes.len(), 2);
        assert_eq!(results[1], Err(SkipReason::MissingNode(4)));
    }

    #[test]
    fn test_pfullingen_patch() {
        let mut way = CompleteWay::new(vec![Node::new(48.0, 9.0), Node::new(48.4556334, 9.2800751)]);
        patch_known_defects("Pfullingen", 328070220, &mut way);
        assert_eq!(way.nodes[1], Node::new(48.4556335, 9.2800752));

        let mut other = CompleteWay::new(vec![Node::new(48.4556334, 9.2800751)]);
        patch_known_defects("Reutlingen", 328070220, &mut other);
        assert_eq!(other.nodes[0], Node::new(48.4556334, 9.2800751));

        patch_known_defects("Pfullingen", 1, &mut other);
        assert_eq!(other.nodes[0], Node::new(48.4556334, 9.2800751));
    }
}
