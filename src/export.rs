//! CSV output of the resolved street records.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use tracing::info;

use crate::models::StreetSet;
use crate::progress::Phase;
use crate::{Cancellation, Error, Result};

/// Column names of the output table, in order.
pub const HEADER: [&str; 6] = [
    "Name",
    "PostalCode",
    "Locality",
    "RegionalKey",
    "Borough",
    "Suburb",
];

/// Write `records` to `writer`, header first. Missing borough or suburb
/// become empty fields.
pub fn write_records<W: Write>(writer: W, records: &StreetSet, cancel: &Cancellation) -> Result<u64> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(HEADER)?;

    let phase = Phase::start("Exporting streets");
    let mut written = 0u64;
    for record in records {
        cancel.check()?;
        csv_writer.serialize(record)?;
        written += 1;
        if written % 10_000 == 0 {
            phase.count(written);
        }
    }

    csv_writer.flush().map_err(|e| Error::Csv(e.into()))?;
    phase.finish(format!("done: {} rows", written));
    Ok(written)
}

/// Create (or truncate) `path` and export `records` into it.
pub fn write_streets(path: &Path, records: &StreetSet, cancel: &Cancellation) -> Result<u64> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let written = write_records(file, records, cancel)?;
    info!("Wrote {} streets to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreetRecord;

    fn record(name: &str, borough: Option<&str>, suburb: Option<&str>) -> StreetRecord {
        StreetRecord {
            name: name.to_string(),
            postal_code: "72793".to_string(),
            locality: "Pfullingen".to_string(),
            regional_key: "08415059".to_string(),
            borough: borough.map(str::to_string),
            suburb: suburb.map(str::to_string),
        }
    }

    #[test]
    fn test_write_streets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streets.osm.csv");

        let mut records = StreetSet::new();
        records.insert(record("Hauptstr.", None, None));
        records.insert(record("Am Markt, Ost", Some("Nord"), None));
        records.insert(record("\"Alte\" Gasse", Some("Nord"), Some("Mitte")));

        let written = write_streets(&path, &records, &Cancellation::new()).unwrap();
        assert_eq!(written, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "Name,PostalCode,Locality,RegionalKey,Borough,Suburb");
        assert_eq!(lines[1], "Hauptstr.,72793,Pfullingen,08415059,,");
        assert_eq!(lines[2], "\"Am Markt, Ost\",72793,Pfullingen,08415059,Nord,");
        assert_eq!(lines[3], "\"\"\"Alte\"\" Gasse\",72793,Pfullingen,08415059,Nord,Mitte");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_empty_set_writes_header() {
        let mut out = Vec::new();
        write_records(&mut out, &StreetSet::new(), &Cancellation::new()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name,PostalCode,Locality,RegionalKey,Borough,Suburb\n"
        );
    }

    #[test]
    fn test_cancelled_export() {
        let mut records = StreetSet::new();
        records.insert(record("Hauptstr.", None, None));
        let cancel = Cancellation::new();
        cancel.cancel();

        let mut out = Vec::new();
        let result = write_records(&mut out, &records, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
