//! Street records produced by the hierarchy join and consumed by the exporter.

use hashbrown::HashSet;
use serde::Serialize;

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreetRecord {
    pub name: String,
    pub postal_code: String,
    /// Municipality name
    pub locality: String,
    pub regional_key: String,
    pub borough: Option<String>,
    pub suburb: Option<String>,
}

/// Identity of a record; the regional key is not part of it.
pub type StreetKey = (String, String, String, Option<String>, Option<String>);

impl StreetRecord {
    pub fn key(&self) -> StreetKey {
        (
            self.name.clone(),
            self.postal_code.clone(),
            self.locality.clone(),
            self.borough.clone(),
            self.suburb.clone(),
        )
    }
}

/// Deduplicating record set that iterates in insertion order.
#[derive(Debug, Default)]
pub struct StreetSet {
    seen: HashSet<StreetKey>,
    records: Vec<StreetRecord>,
}

impl StreetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` unless an equal key is present. Returns whether it was added;
    /// the first record seen for a key is kept.
    pub fn insert(&mut self, record: StreetRecord) -> bool {
        if self.seen.insert(record.key()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreetRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a StreetSet {
    type Item = &'a StreetRecord;
    type IntoIter = std::slice::Iter<'a, StreetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
