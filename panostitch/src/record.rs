//! Panorama input records.
//!
//! The discovery step (external to this crate) emits a JSON array of
//! `{"panoid": string, "lat": float, "lon": float}` objects. This module
//! loads that file and removes duplicate panorama ids, keeping the first
//! occurrence of each.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// A panorama to be downloaded and stitched.
///
/// Produced by the external discovery collaborator; immutable input to the
/// pipeline. Identity is the `id` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PanoramaRecord {
    /// Provider panorama identifier.
    #[serde(rename = "panoid")]
    pub id: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl PanoramaRecord {
    /// Filename of the stitched artifact for this panorama.
    ///
    /// Encodes location and identity so the orchestrator can test artifact
    /// existence without consulting any index.
    pub fn artifact_filename(&self) -> String {
        format!("{}_{}_{}.jpg", self.lat, self.lon, self.id)
    }
}

/// Loads panorama records from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of
/// panorama records.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<PanoramaRecord>, io::Error> {
    let data = fs::read(path.as_ref())?;
    serde_json::from_slice(&data).map_err(io::Error::from)
}

/// Removes records with duplicate ids, keeping the first occurrence.
///
/// Input order is otherwise preserved.
pub fn dedup_records(records: Vec<PanoramaRecord>) -> Vec<PanoramaRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PanoramaRecord {
        PanoramaRecord {
            id: id.to_string(),
            lat: 50.7734,
            lon: 14.2080,
        }
    }

    #[test]
    fn test_deserialize_record() {
        let json = r#"{"panoid": "abc123", "lat": 50.5, "lon": -14.25}"#;
        let rec: PanoramaRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.id, "abc123");
        assert_eq!(rec.lat, 50.5);
        assert_eq!(rec.lon, -14.25);
    }

    #[test]
    fn test_artifact_filename_encodes_identity_and_location() {
        let rec = PanoramaRecord {
            id: "XyZ".to_string(),
            lat: 50.5,
            lon: -14.25,
        };
        assert_eq!(rec.artifact_filename(), "50.5_-14.25_XyZ.jpg");
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panoids.json");
        fs::write(
            &path,
            r#"[{"panoid": "a", "lat": 1.0, "lon": 2.0}, {"panoid": "b", "lat": 3.0, "lon": 4.0}]"#,
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[1].id, "b");
    }

    #[test]
    fn test_load_records_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "not json").unwrap();

        assert!(load_records(&path).is_err());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let records = vec![record("a"), record("b"), record("a"), record("c"), record("b")];
        let deduped = dedup_records(records);
        let ids: Vec<_> = deduped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedup_empty() {
        assert!(dedup_records(Vec::new()).is_empty());
    }
}
