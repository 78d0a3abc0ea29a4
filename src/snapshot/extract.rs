//! Three pass extraction of streets and boundary relations from an OSM source.
//!
//! Entities in a PBF are ordered by type and id, not by reference, so the
//! relations are read first, then the ways they (and the streets) need, then
//! the nodes those ways need.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use osmpbfreader::{OsmId, OsmObj, OsmPbfReader};

use super::{tags, EntityStore};
use crate::models::{Node, Street, Way};
use crate::progress::Phase;
use crate::{Cancellation, Error, Result};

const PROGRESS_INTERVAL: u64 = 10_000;

/// An entity and its visibility flag. PBF extracts carry no flag (`None`);
/// history data may mark deleted entities with `Some(false)`.
#[derive(Debug, Clone)]
pub struct OsmEntity {
    pub obj: OsmObj,
    pub visible: Option<bool>,
}

impl OsmEntity {
    pub fn new(obj: OsmObj) -> Self {
        Self { obj, visible: None }
    }

    pub fn deleted(obj: OsmObj) -> Self {
        Self {
            obj,
            visible: Some(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }
}

/// A source that can be streamed from the start any number of times.
pub trait EntitySource {
    /// Name used in progress output
    fn name(&self) -> String;

    /// Stream every entity in source order to `f`, stopping at the first error.
    fn for_each_entity(&self, f: &mut dyn FnMut(OsmEntity) -> Result<()>) -> Result<()>;
}

/// A PBF file, re-opened for every pass.
pub struct PbfFileSource {
    path: PathBuf,
}

impl PbfFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntitySource for PbfFileSource {
    fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.osm.pbf")
            .to_string()
    }

    fn for_each_entity(&self, f: &mut dyn FnMut(OsmEntity) -> Result<()>) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut reader = OsmPbfReader::new(BufReader::new(file));
        for obj in reader.iter() {
            f(OsmEntity::new(obj?))?;
        }
        Ok(())
    }
}

/// Entities held in memory, e.g. a pre-filtered extract or test fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entities: Vec<OsmEntity>,
}

impl MemorySource {
    pub fn new(objects: Vec<OsmObj>) -> Self {
        Self {
            entities: objects.into_iter().map(OsmEntity::new).collect(),
        }
    }

    pub fn from_entities(entities: Vec<OsmEntity>) -> Self {
        Self { entities }
    }
}

impl EntitySource for MemorySource {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn for_each_entity(&self, f: &mut dyn FnMut(OsmEntity) -> Result<()>) -> Result<()> {
        for entity in &self.entities {
            f(entity.clone())?;
        }
        Ok(())
    }
}

/// Run all three passes and return the filled store.
pub fn create_snapshot(source: &dyn EntitySource, cancel: &Cancellation) -> Result<EntityStore> {
    let mut store = EntityStore::new();
    load_relations(source, &mut store, cancel)?;
    load_ways(source, &mut store, cancel)?;
    load_nodes(source, &mut store, cancel)?;
    Ok(store)
}

/// Pass 1: boundary relations. Their member ways are registered as wanted.
pub fn load_relations(
    source: &dyn EntitySource,
    store: &mut EntityStore,
    cancel: &Cancellation,
) -> Result<()> {
    let phase = Phase::start(format!("Load osm relations from {}...", source.name()));
    let mut seen = 0u64;
    let mut matched = 0u64;

    source.for_each_entity(&mut |entity| {
        if !entity.is_visible() {
            return Ok(());
        }
        cancel.check()?;

        if let OsmObj::Relation(relation) = &entity.obj {
            if let Some((level, mut area)) = tags::classify_relation(&relation.tags) {
                for member in &relation.refs {
                    if let OsmId::Way(way_id) = member.member {
                        if member.role.as_str() == "inner" {
                            area.inner_ways.push(way_id.0);
                        } else {
                            area.outer_ways.push(way_id.0);
                        }
                        store.want_way(way_id.0);
                    }
                }
                store.push_area(level, area);
                matched += 1;
            }
        }

        seen += 1;
        if seen % PROGRESS_INTERVAL == 0 {
            phase.update(matched, seen);
        }
        Ok(())
    })?;

    phase.finish(format!("{}/{}", matched, seen));
    Ok(())
}

/// Pass 2: streets, and the ways wanted by pass 1. Their nodes become wanted.
pub fn load_ways(
    source: &dyn EntitySource,
    store: &mut EntityStore,
    cancel: &Cancellation,
) -> Result<()> {
    let phase = Phase::start(format!("Load osm ways from {}...", source.name()));
    let mut seen = 0u64;
    let mut matched = 0u64;

    source.for_each_entity(&mut |entity| {
        if !entity.is_visible() {
            return Ok(());
        }
        cancel.check()?;

        if let OsmObj::Way(way) = &entity.obj {
            let node_ids: Vec<i64> = way.nodes.iter().map(|id| id.0).collect();

            if tags::is_street(&way.tags) {
                if let Some(name) = tags::preferred_name(&way.tags) {
                    for &id in &node_ids {
                        store.want_node(id);
                    }
                    store.streets.push(Street {
                        name,
                        nodes: node_ids.clone(),
                    });
                }
            }

            if store.wants_way(way.id.0) {
                for &id in &node_ids {
                    store.want_node(id);
                }
                store.ways.insert(way.id.0, Some(Way::new(node_ids)));
                matched += 1;
            }
        }

        seen += 1;
        if seen % PROGRESS_INTERVAL == 0 {
            phase.update(matched, seen);
        }
        Ok(())
    })?;

    phase.finish(format!("{}/{} ({} streets)", matched, seen, store.streets.len()));
    Ok(())
}

/// Pass 3: coordinates of every wanted node.
pub fn load_nodes(
    source: &dyn EntitySource,
    store: &mut EntityStore,
    cancel: &Cancellation,
) -> Result<()> {
    let phase = Phase::start(format!("Load osm nodes from {}...", source.name()));
    let mut seen = 0u64;
    let mut matched = 0u64;

    source.for_each_entity(&mut |entity| {
        if !entity.is_visible() {
            return Ok(());
        }
        cancel.check()?;

        if let OsmObj::Node(node) = &entity.obj {
            if store.wants_node(node.id.0) {
                store
                    .nodes
                    .insert(node.id.0, Some(Node::new(node.lat(), node.lon())));
                matched += 1;
            }
        }

        seen += 1;
        if seen % PROGRESS_INTERVAL == 0 {
            phase.update(matched, seen);
        }
        Ok(())
    })?;

    phase.finish(format!("{}/{}", matched, seen));
    Ok(())
}
