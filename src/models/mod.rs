//! Core data models for street extraction.

pub mod osm;
pub mod street;

pub use osm::{
    Area, AreaKey, AreaLevel, CompleteArea, CompleteStreet, CompleteWay, Node, Street, Way,
};
pub use street::{StreetKey, StreetRecord, StreetSet};
