//! Worker-to-machine proximity with debounced distance thresholds
//!
//! For every tracked person the nearest monitored machine is found by
//! centroid distance, normalised by the frame diagonal so the thresholds do
//! not depend on resolution. A severity must persist for its own minimum
//! duration before events are emitted, and once it has, an event is emitted
//! on every qualifying frame.

use crate::bbox::{frame_diagonal, Bbox};
use crate::{Timestamp, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Risk level of a person relative to the nearest machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProximitySeverity {
    Warning,
    Critical,
}

impl fmt::Display for ProximitySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Configuration for the proximity detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Normalised distance below which a person is at WARNING risk
    pub warning_distance: f32,
    /// Normalised distance below which a person is at CRITICAL risk
    pub critical_distance: f32,
    /// Seconds WARNING must persist before events are emitted
    pub warning_time: f64,
    /// Seconds CRITICAL must persist before events are emitted
    pub critical_time: f64,
    /// Seconds a person must stay safe before their state is dropped
    pub safe_grace: f64,
    /// Machine labels that count as hazards
    pub monitored_machines: Vec<String>,
    /// Seconds without seeing a person before their state is swept
    pub stale_after: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            warning_distance: 0.15,
            critical_distance: 0.08,
            warning_time: 0.5,
            critical_time: 1.0,
            safe_grace: 1.0,
            monitored_machines: vec!["excavator".to_string(), "dump_truck".to_string()],
            stale_after: 30.0,
        }
    }
}

impl ProximityConfig {
    pub fn is_monitored(&self, label: &str) -> bool {
        self.monitored_machines.iter().any(|m| m == label)
    }

    fn classify(&self, distance_norm: f32) -> Option<(ProximitySeverity, f64)> {
        if distance_norm < self.critical_distance {
            Some((ProximitySeverity::Critical, self.critical_time))
        } else if distance_norm < self.warning_distance {
            Some((ProximitySeverity::Warning, self.warning_time))
        } else {
            None
        }
    }
}

/// A person on the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct PersonObservation {
    pub track_id: Option<TrackId>,
    pub bbox: Bbox,
}

/// A machine on the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct MachineObservation {
    pub label: String,
    pub bbox: Bbox,
}

/// Debounce state of one person currently at risk
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityTrackState {
    pub severity: ProximitySeverity,
    /// When the current severity was first seen
    pub start_time: Timestamp,
    /// Last frame on which the person was at this severity
    pub last_seen: Timestamp,
    pub machine_type: String,
    last_observed: Timestamp,
}

/// Sustained proximity between a person and a machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEvent {
    pub person_id: TrackId,
    pub machine_type: String,
    pub severity: ProximitySeverity,
    /// Centroid distance divided by the frame diagonal
    pub distance_norm: f32,
    /// Centroid distance in pixels
    pub distance_px: f32,
    pub timestamp: Timestamp,
}

/// Proximity state for every person in one session
#[derive(Debug, Clone)]
pub struct ProximityDetector {
    config: ProximityConfig,
    states: BTreeMap<TrackId, ProximityTrackState>,
}

impl ProximityDetector {
    pub fn new(config: ProximityConfig) -> Self {
        Self {
            config,
            states: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    pub fn state(&self, track_id: TrackId) -> Option<&ProximityTrackState> {
        self.states.get(&track_id)
    }

    /// Process one frame and return the proximity events it produces
    pub fn process(
        &mut self,
        persons: &[PersonObservation],
        machines: &[MachineObservation],
        frame_width: u32,
        frame_height: u32,
        now: Timestamp,
    ) -> Vec<ProximityEvent> {
        let hazards: Vec<&MachineObservation> = machines
            .iter()
            .filter(|m| self.config.is_monitored(&m.label))
            .collect();
        if hazards.is_empty() {
            if !self.states.is_empty() {
                log::debug!(
                    "no machine in frame, proximity state cleared for {} persons",
                    self.states.len()
                );
                self.states.clear();
            }
            return Vec::new();
        }

        let diagonal = frame_diagonal(frame_width, frame_height);
        let mut events = Vec::new();
        let mut seen = BTreeSet::new();

        for person in persons {
            let Some(pid) = person.track_id else {
                continue;
            };
            // one evaluation per track per frame
            if !seen.insert(pid) {
                continue;
            }

            let closest = hazards
                .iter()
                .map(|m| (*m, person.bbox.centroid_distance(&m.bbox)))
                .fold(None::<(&MachineObservation, f32)>, |best, (m, d)| match best {
                    Some((_, best_d)) if best_d <= d => best,
                    _ => Some((m, d)),
                });
            let Some((machine, distance_px)) = closest else {
                continue;
            };

            let distance_norm = if diagonal > 0.0 {
                distance_px / diagonal
            } else {
                f32::INFINITY
            };

            let Some((severity, required)) = self.config.classify(distance_norm) else {
                if let Some(state) = self.states.get_mut(&pid) {
                    state.last_observed = now;
                    if now - state.last_seen >= self.config.safe_grace {
                        self.states.remove(&pid);
                        log::debug!("person {}: safe for {:.1}s, state cleared", pid, self.config.safe_grace);
                    }
                }
                continue;
            };

            match self.states.get_mut(&pid) {
                Some(state) if state.severity == severity => {
                    state.last_seen = now;
                    state.last_observed = now;
                    if now - state.start_time >= required {
                        events.push(ProximityEvent {
                            person_id: pid,
                            machine_type: state.machine_type.clone(),
                            severity,
                            distance_norm,
                            distance_px,
                            timestamp: now,
                        });
                    }
                }
                _ => {
                    log::debug!(
                        "person {}: {} near {} (d={:.3}), debounce started",
                        pid,
                        severity,
                        machine.label,
                        distance_norm
                    );
                    self.states.insert(
                        pid,
                        ProximityTrackState {
                            severity,
                            start_time: now,
                            last_seen: now,
                            machine_type: machine.label.clone(),
                            last_observed: now,
                        },
                    );
                }
            }
        }

        events
    }

    pub(crate) fn sweep(&mut self, now: Timestamp) -> usize {
        let before = self.states.len();
        let stale_after = self.config.stale_after;
        self.states
            .retain(|_, state| now - state.last_observed <= stale_after);
        before - self.states.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn remove(&mut self, track_id: TrackId) {
        self.states.remove(&track_id);
    }

    pub(crate) fn clear(&mut self) {
        self.states.clear();
    }
}

impl Default for ProximityDetector {
    fn default() -> Self {
        Self::new(ProximityConfig::default())
    }
}
