//! OSM primitives as kept in the snapshot, plus their resolved ("complete") forms.

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

/// A node position. Nodes are keyed by id in the snapshot; two nodes with the
/// same coordinates are interchangeable when stitching rings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub lat: f64,
    pub lon: f64,
}

impl Node {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar coordinate with `x = lon`, `y = lat`.
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Raw way: ordered node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Way {
    pub nodes: Vec<i64>,
}

impl Way {
    pub fn new(nodes: Vec<i64>) -> Self {
        Self { nodes }
    }
}

/// Identifying key carried by an area, depending on its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKey {
    /// Plain named area
    #[default]
    None,
    /// Five digit postal code
    PostalCode(String),
    /// Eight digit official municipality key (de:amtlicher_gemeindeschluessel)
    RegionalKey(String),
}

impl AreaKey {
    pub fn postal_code(&self) -> Option<&str> {
        match self {
            AreaKey::PostalCode(code) => Some(code),
            _ => None,
        }
    }

    pub fn regional_key(&self) -> Option<&str> {
        match self {
            AreaKey::RegionalKey(key) => Some(key),
            _ => None,
        }
    }
}

/// The four area collections kept by the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaLevel {
    PostalCode,
    Municipality,
    Borough,
    Suburb,
}

impl AreaLevel {
    pub fn all() -> &'static [AreaLevel] {
        &[
            AreaLevel::PostalCode,
            AreaLevel::Municipality,
            AreaLevel::Borough,
            AreaLevel::Suburb,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AreaLevel::PostalCode => "postal code areas",
            AreaLevel::Municipality => "municipalities",
            AreaLevel::Borough => "boroughs",
            AreaLevel::Suburb => "suburbs",
        }
    }
}

/// Raw area as extracted from a relation. Ways are referenced by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    #[serde(default)]
    pub key: AreaKey,
    #[serde(default)]
    pub outer_ways: Vec<i64>,
    #[serde(default)]
    pub inner_ways: Vec<i64>,
}

impl Area {
    pub fn new(name: impl Into<String>, key: AreaKey) -> Self {
        Self {
            name: name.into(),
            key,
            outer_ways: Vec::new(),
            inner_ways: Vec::new(),
        }
    }
}

/// Raw street: a single named way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub name: String,
    pub nodes: Vec<i64>,
}

/// A way with every node resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteWay {
    pub nodes: Vec<Node>,
}

impl CompleteWay {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// A way is closed when it has more than one node and its ends coincide.
    pub fn is_closed(&self) -> bool {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) if self.nodes.len() > 1 => first == last,
            _ => false,
        }
    }

    pub fn coords(&self) -> Vec<Coord<f64>> {
        self.nodes.iter().map(Node::coord).collect()
    }
}

/// An area with outer and inner ways resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteArea {
    pub name: String,
    pub key: AreaKey,
    pub outer_ways: Vec<CompleteWay>,
    pub inner_ways: Vec<CompleteWay>,
}

/// A street with its nodes resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteStreet {
    pub name: String,
    pub nodes: Vec<Node>,
}

impl CompleteStreet {
    pub fn line_string(&self) -> LineString<f64> {
        LineString::new(self.nodes.iter().map(Node::coord).collect())
    }
}
