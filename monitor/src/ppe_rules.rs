//! PPE rule engine: turns per-frame detections into compliance signals
//!
//! Item detections share the `track_id` of the person wearing them. For each
//! tracked person and each monitored item the frame yields exactly one
//! tri-state signal:
//! - any `no_<item>` detection ⇒ `Missing` (confidence = max of those)
//! - else any `<item>` detection ⇒ `Present`
//! - else `Unknown`

use crate::smoothing::ConfidenceSmoother;
use crate::types::{Frame, ObjectClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use violationtrack::{
    Bbox, ComplianceConfig, ComplianceTracker, EquipmentItem, ItemSignal, PpeSeverity, Timestamp,
    TrackId, TrackStateMachine,
};

/// Confidence recorded for an item that was not seen on the frame
const UNKNOWN_CONFIDENCE: f32 = 0.5;

/// A tracked person with at least one active PPE violation on this frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpeViolation {
    pub track_id: TrackId,
    pub missing_items: Vec<EquipmentItem>,
    pub severity: PpeSeverity,
    pub confidence: f32,
    /// Person box on this frame, absent when the person was not detected
    pub bbox: Option<Bbox>,
    pub timestamp: Timestamp,
}

impl PpeViolation {
    pub fn is_missing(&self, item: EquipmentItem) -> bool {
        self.missing_items.contains(&item)
    }
}

#[derive(Debug, Default)]
struct TrackObservation {
    person_bbox: Option<Bbox>,
    items: Vec<(ObjectClass, f32)>,
}

impl TrackObservation {
    fn signal(&self, item: EquipmentItem) -> (ItemSignal, f32) {
        let (present_class, missing_class) = match item {
            EquipmentItem::Helmet => (ObjectClass::Helmet, ObjectClass::NoHelmet),
            EquipmentItem::Vest => (ObjectClass::Vest, ObjectClass::NoVest),
        };
        let best = |class: ObjectClass| {
            self.items
                .iter()
                .filter(|(c, _)| *c == class)
                .map(|(_, conf)| *conf)
                .reduce(f32::max)
        };

        if let Some(conf) = best(missing_class) {
            (ItemSignal::Missing, conf)
        } else if let Some(conf) = best(present_class) {
            (ItemSignal::Present, conf)
        } else {
            (ItemSignal::Unknown, UNKNOWN_CONFIDENCE)
        }
    }
}

/// Drives the compliance state machine from whole frames
#[derive(Debug, Clone)]
pub struct PpeRuleEngine {
    tracker: ComplianceTracker,
    smoother: ConfidenceSmoother,
    min_confidence: f32,
}

impl PpeRuleEngine {
    pub fn new(config: ComplianceConfig, min_confidence: f32, smoothing_window: usize) -> Self {
        Self {
            tracker: ComplianceTracker::new(config),
            smoother: ConfidenceSmoother::new(smoothing_window),
            min_confidence,
        }
    }

    pub fn tracker(&self) -> &ComplianceTracker {
        &self.tracker
    }

    /// Update compliance state from one frame and report active violations
    ///
    /// Every non-stale track is evaluated, including tracks not seen on this
    /// frame, so a violation keeps reporting while its person is briefly
    /// occluded.
    pub fn check_compliance(&mut self, frame: &Frame) -> Vec<PpeViolation> {
        let now = frame.timestamp;
        let mut observed: BTreeMap<TrackId, TrackObservation> = BTreeMap::new();

        for det in &frame.detections {
            if det.confidence < self.min_confidence || !det.is_well_formed() {
                continue;
            }
            let Some(track_id) = det.track_id else {
                continue;
            };
            let class = det.class();
            match class {
                ObjectClass::Person => {
                    observed.entry(track_id).or_default().person_bbox = Some(det.bbox);
                }
                c if c.is_ppe() => {
                    let conf = self.smoother.smooth(track_id, c, det.confidence, now);
                    observed.entry(track_id).or_default().items.push((c, conf));
                }
                _ => {}
            }
        }

        for (&track_id, observation) in &observed {
            for item in EquipmentItem::ALL {
                let (signal, confidence) = observation.signal(item);
                self.tracker.update(track_id, item, signal, confidence, now);
            }
        }

        let mut violations = Vec::new();
        let track_ids: Vec<TrackId> = self.tracker.track_ids().collect();
        for track_id in track_ids {
            if self.tracker.is_stale(track_id, now) {
                continue;
            }
            let evaluation = self.tracker.evaluate(track_id, now);
            let Some(severity) = evaluation.severity else {
                continue;
            };
            violations.push(PpeViolation {
                track_id,
                confidence: evaluation.max_confidence().unwrap_or(UNKNOWN_CONFIDENCE),
                missing_items: evaluation.active_items,
                severity,
                bbox: observed.get(&track_id).and_then(|o| o.person_bbox),
                timestamp: now,
            });
        }
        violations
    }

    /// Drop stale compliance state and smoothing buffers
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let removed = self.tracker.sweep_stale(now);
        self.smoother
            .sweep(now, self.tracker.config().stale_after);
        removed
    }

    pub fn reset(&mut self) {
        self.tracker.clear();
        self.smoother.clear();
    }
}

impl Default for PpeRuleEngine {
    fn default() -> Self {
        Self::new(ComplianceConfig::default(), 0.5, 5)
    }
}
