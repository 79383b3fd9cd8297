//! Restricted-zone definitions loaded from JSON
//!
//! ```json
//! {"zones": [{"id": "pit", "polygon": [[0, 0], [100, 0], [100, 80]]}]}
//! ```

use crate::error::{MonitorError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use violationtrack::Polygon;

#[derive(Debug, Deserialize)]
struct ZoneFile {
    zones: Vec<ZoneEntry>,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    id: String,
    polygon: Vec<[f32; 2]>,
}

/// Parse and validate a zone document
///
/// Any invalid polygon or duplicate id fails the whole document.
pub fn parse_zones(json: &str) -> Result<BTreeMap<String, Polygon>> {
    let file: ZoneFile = serde_json::from_str(json)
        .map_err(|e| MonitorError::zone_config(format!("malformed zone document: {}", e)))?;

    let mut zones = BTreeMap::new();
    for entry in file.zones {
        if entry.id.trim().is_empty() {
            return Err(MonitorError::zone_config("zone id must not be empty"));
        }
        if zones.contains_key(&entry.id) {
            return Err(MonitorError::zone_config(format!(
                "duplicate zone id '{}'",
                entry.id
            )));
        }
        let polygon = Polygon::try_from(entry.polygon)
            .map_err(|e| MonitorError::zone_config(format!("zone '{}': {}", entry.id, e)))?;
        zones.insert(entry.id, polygon);
    }
    Ok(zones)
}

/// Load zones from a JSON file
pub fn load_zones<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, Polygon>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let zones = parse_zones(&text)?;
    log::info!("Loaded {} zones from {}", zones.len(), path.display());
    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_zones() {
        let zones = parse_zones(
            r#"{"zones": [
                {"id": "pit", "polygon": [[0, 0], [100, 0], [100, 80], [0, 80]]},
                {"id": "crane_swing", "polygon": [[200, 200], [300, 200], [250, 300]]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones["pit"].vertices().len(), 4);
    }

    #[test]
    fn test_too_few_vertices_is_fatal() {
        let err = parse_zones(r#"{"zones": [{"id": "a", "polygon": [[0, 0], [1, 1]]}]}"#)
            .unwrap_err();
        assert!(matches!(err, MonitorError::ZoneConfig(_)));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let doc = r#"{"zones": [
            {"id": "a", "polygon": [[0, 0], [10, 0], [10, 10]]},
            {"id": "a", "polygon": [[0, 0], [20, 0], [20, 20]]}
        ]}"#;
        assert!(matches!(parse_zones(doc), Err(MonitorError::ZoneConfig(_))));
    }

    #[test]
    fn test_missing_polygon_is_fatal() {
        assert!(matches!(
            parse_zones(r#"{"zones": [{"id": "a"}]}"#),
            Err(MonitorError::ZoneConfig(_))
        ));
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_zones(r#"{"zones": []}"#).unwrap().is_empty());
    }
}
