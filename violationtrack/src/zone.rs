//! Restricted-zone intrusion with dwell-time debouncing
//!
//! State is kept per (object, zone) pair and only while the pair overlaps:
//! an object that is not inside a zone on the current frame, for whatever
//! reason, loses its dwell timer for that zone immediately.

use crate::bbox::Bbox;
use crate::polygon::Polygon;
use crate::{Timestamp, TrackId};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Configuration for the zone monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Seconds an object must dwell inside a zone before it is a violation
    pub min_dwell: f64,
    /// Seconds after which a dwell timer nobody refreshed is dropped
    pub stale_after: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            min_dwell: 1.0,
            stale_after: 30.0,
        }
    }
}

/// Any tracked object on the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub track_id: Option<TrackId>,
    pub label: String,
    pub bbox: Bbox,
}

/// An object that has dwelt inside a restricted zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneViolation {
    pub object_id: TrackId,
    pub object_type: String,
    pub zone_id: String,
    pub timestamp: Timestamp,
    /// Seconds since the object entered the zone
    pub dwell: f64,
}

/// Zone polygons and dwell timers for one session
#[derive(Debug, Clone, Default)]
pub struct ZoneMonitor {
    config: ZoneConfig,
    zones: BTreeMap<String, Polygon>,
    entries: BTreeMap<(TrackId, String), ZoneDwell>,
}

#[derive(Debug, Clone, Copy)]
struct ZoneDwell {
    entered: Timestamp,
    last_seen: Timestamp,
}

impl ZoneMonitor {
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            zones: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Replace the configured zones
    ///
    /// Dwell timers are reset since they refer to the previous zones.
    pub fn set_zones(&mut self, zones: BTreeMap<String, Polygon>) -> Result<()> {
        if zones.keys().any(|id| id.trim().is_empty()) {
            bail!("zone id must not be empty");
        }
        log::debug!("zone monitor configured with {} zones", zones.len());
        self.zones = zones;
        self.entries.clear();
        Ok(())
    }

    pub fn zones(&self) -> &BTreeMap<String, Polygon> {
        &self.zones
    }

    /// Entry time of an object into a zone, if it is currently inside
    pub fn entry_time(&self, object_id: TrackId, zone_id: &str) -> Option<Timestamp> {
        self.entries
            .get(&(object_id, zone_id.to_string()))
            .map(|dwell| dwell.entered)
    }

    /// Check one frame's detections against every zone
    ///
    /// `detections` must hold every object visible on the frame; objects
    /// missing from it are treated as having left all zones.
    pub fn check(&mut self, detections: &[TrackedObject], now: Timestamp) -> Vec<ZoneViolation> {
        let mut violations = Vec::new();
        let mut inside = BTreeSet::new();

        for det in detections {
            let Some(object_id) = det.track_id else {
                continue;
            };
            let centroid = det.bbox.centroid();

            for (zone_id, polygon) in &self.zones {
                if !polygon.covers(&centroid) {
                    continue;
                }
                let key = (object_id, zone_id.clone());
                if !inside.insert(key.clone()) {
                    continue;
                }

                match self.entries.get_mut(&key) {
                    None => {
                        log::debug!("object {} entered zone {}", object_id, zone_id);
                        self.entries.insert(
                            key,
                            ZoneDwell {
                                entered: now,
                                last_seen: now,
                            },
                        );
                    }
                    Some(state) => {
                        state.last_seen = now;
                        let dwell = now - state.entered;
                        if dwell >= self.config.min_dwell {
                            violations.push(ZoneViolation {
                                object_id,
                                object_type: det.label.clone(),
                                zone_id: zone_id.clone(),
                                timestamp: now,
                                dwell,
                            });
                        }
                    }
                }
            }
        }

        self.entries.retain(|key, _| {
            let keep = inside.contains(key);
            if !keep {
                log::debug!("object {} left zone {}", key.0, key.1);
            }
            keep
        });

        violations
    }

    pub(crate) fn sweep(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        let stale_after = self.config.stale_after;
        self.entries
            .retain(|_, dwell| now - dwell.last_seen <= stale_after);
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .keys()
            .map(|(object_id, _)| *object_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub(crate) fn remove(&mut self, track_id: TrackId) {
        self.entries.retain(|(object_id, _), _| *object_id != track_id);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
