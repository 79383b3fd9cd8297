//! One monitoring session: all detector state for a single camera run
//!
//! A session owns its PPE engine, proximity detector, zone monitor and event
//! store. Nothing is shared between sessions, and frames must be fed in
//! timestamp order; frames that go back in time are dropped.

use crate::aggregator::{UnifiedViolation, ViolationAggregator};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::metrics::{RiskMetricsEngine, SiteMetrics};
use crate::ppe_rules::{PpeRuleEngine, PpeViolation};
use crate::severity::{merge_safety_severity, SafetySeverity};
use crate::store::{InMemoryEventStore, SessionEvents};
use crate::types::{Frame, ObjectClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use violationtrack::{
    MachineObservation, PersonObservation, Polygon, ProximityDetector, ProximityEvent, Timestamp,
    TrackStateMachine, TrackedObject, ZoneMonitor, ZoneViolation,
};

/// Everything one frame produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_id: u64,
    pub timestamp: Timestamp,
    pub ppe: Vec<PpeViolation>,
    pub proximity: Vec<ProximityEvent>,
    pub zone: Vec<ZoneViolation>,
    pub severity: SafetySeverity,
}

impl FrameReport {
    pub fn violation_count(&self) -> usize {
        self.ppe.len() + self.proximity.len() + self.zone.len()
    }
}

/// Final output of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub frames: u64,
    pub stream: Vec<UnifiedViolation>,
    pub metrics: SiteMetrics,
}

pub struct MonitorSession {
    session_id: String,
    config: MonitorConfig,
    ppe: PpeRuleEngine,
    proximity: ProximityDetector,
    zones: ZoneMonitor,
    store: InMemoryEventStore,
    frames_processed: u64,
    last_timestamp: Option<Timestamp>,
    last_sweep: Option<Timestamp>,
}

impl MonitorSession {
    /// Create a session with no zones configured
    pub fn new(session_id: &str, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        log::info!("Session {} started", session_id);
        Ok(Self {
            session_id: session_id.to_string(),
            ppe: PpeRuleEngine::new(
                config.compliance.clone(),
                config.min_confidence,
                config.smoothing_window,
            ),
            proximity: ProximityDetector::new(config.proximity.clone()),
            zones: ZoneMonitor::new(config.zone.clone()),
            store: InMemoryEventStore::new(),
            frames_processed: 0,
            last_timestamp: None,
            last_sweep: None,
            config,
        })
    }

    /// Replace the restricted zones of this session
    pub fn set_zones(&mut self, zones: BTreeMap<String, Polygon>) -> Result<()> {
        self.zones
            .set_zones(zones)
            .map_err(|e| MonitorError::zone_config(e.to_string()))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Raw per-detector events recorded so far
    pub fn events(&self) -> Option<&SessionEvents> {
        self.store.session(&self.session_id)
    }

    /// Run every detector on one frame
    ///
    /// Returns `None` when the frame is out of order or has no usable
    /// timestamp; detector state is left untouched in that case.
    pub fn process_frame(&mut self, frame: &Frame) -> Option<FrameReport> {
        let now = frame.timestamp;
        if !now.is_finite() {
            log::warn!(
                "Session {}: frame {} has no valid timestamp, skipped",
                self.session_id,
                frame.frame_id
            );
            return None;
        }
        if let Some(prev) = self.last_timestamp {
            if now < prev {
                log::warn!(
                    "Session {}: frame {} at {:.3}s arrived after {:.3}s, skipped",
                    self.session_id,
                    frame.frame_id,
                    now,
                    prev
                );
                return None;
            }
        }
        self.last_timestamp = Some(now);

        let (default_w, default_h) = self.config.default_frame_size;
        let width = frame.width.unwrap_or(default_w);
        let height = frame.height.unwrap_or(default_h);

        let mut persons = Vec::new();
        let mut machines = Vec::new();
        let mut objects = Vec::new();
        for det in &frame.detections {
            if !det.is_well_formed() {
                log::debug!(
                    "Session {}: malformed {} detection skipped",
                    self.session_id,
                    det.class_name
                );
                continue;
            }
            match det.class() {
                ObjectClass::Person => persons.push(PersonObservation {
                    track_id: det.track_id,
                    bbox: det.bbox,
                }),
                _ if self.proximity.config().is_monitored(&det.class_name) => {
                    machines.push(MachineObservation {
                        label: det.class_name.clone(),
                        bbox: det.bbox,
                    })
                }
                _ => {}
            }
            objects.push(TrackedObject {
                track_id: det.track_id,
                label: det.class_name.clone(),
                bbox: det.bbox,
            });
        }

        let ppe = self.ppe.check_compliance(frame);
        let proximity = self
            .proximity
            .process(&persons, &machines, width, height, now);
        let zone = self.zones.check(&objects, now);

        self.store.record_frame(
            &self.session_id,
            &ppe,
            &proximity,
            &zone,
            frame.image_path.as_deref(),
        );
        self.frames_processed += 1;

        match self.last_sweep {
            None => self.last_sweep = Some(now),
            Some(last) if now - last >= self.config.sweep_interval => {
                self.sweep(now);
            }
            _ => {}
        }

        let severity = merge_safety_severity(&ppe, &proximity);
        Some(FrameReport {
            frame_id: frame.frame_id,
            timestamp: now,
            ppe,
            proximity,
            zone,
            severity,
        })
    }

    /// Drop per-track state that has not been refreshed recently
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let removed = self.ppe.sweep(now)
            + self.proximity.sweep_stale(now)
            + self.zones.sweep_stale(now);
        self.last_sweep = Some(now);
        if removed > 0 {
            log::debug!(
                "Session {}: swept {} stale entries at {:.1}s",
                self.session_id,
                removed,
                now
            );
        }
        removed
    }

    pub fn unified_stream(&self) -> Vec<UnifiedViolation> {
        ViolationAggregator::new(&self.store).get_unified_stream(&self.session_id)
    }

    pub fn metrics(&self) -> SiteMetrics {
        RiskMetricsEngine::new().compute(&self.unified_stream(), self.frames_processed)
    }

    /// Close the session and produce its report
    pub fn finish(self) -> SessionReport {
        let stream = self.unified_stream();
        let metrics = RiskMetricsEngine::new().compute(&stream, self.frames_processed);
        log::info!(
            "Session {} finished: {} frames, {} violations, risk {:.2}",
            self.session_id,
            self.frames_processed,
            metrics.total_violations,
            metrics.risk_score
        );
        SessionReport {
            session_id: self.session_id,
            frames: self.frames_processed,
            stream,
            metrics,
        }
    }

    /// Drop all detector state and recorded events, keeping the zones
    pub fn reset(&mut self) {
        self.ppe.reset();
        self.proximity.clear();
        self.zones.clear();
        self.store.clear();
        self.frames_processed = 0;
        self.last_timestamp = None;
        self.last_sweep = None;
        log::info!("Session {} reset", self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Severity, ViolationType};
    use crate::metrics::PipelineStatus;
    use crate::types::Detection;
    use violationtrack::{Bbox, EquipmentItem};

    fn square_zone() -> BTreeMap<String, Polygon> {
        BTreeMap::from([(
            "pit".to_string(),
            Polygon::from_points(&[[0.0, 0.0], [400.0, 0.0], [400.0, 400.0], [0.0, 400.0]])
                .unwrap(),
        )])
    }

    fn worker(id: u32, x: f32, missing: &[&str]) -> Vec<Detection> {
        let mut dets = vec![Detection::new(
            "person",
            Bbox::new(x, 100.0, x + 50.0, 200.0),
            Some(id),
            0.9,
        )];
        for label in missing {
            dets.push(Detection::new(
                label,
                Bbox::new(x, 100.0, x + 50.0, 130.0),
                Some(id),
                0.85,
            ));
        }
        dets
    }

    #[test]
    fn test_empty_session_is_compliant() {
        let session = MonitorSession::new("empty", MonitorConfig::default()).unwrap();
        let report = session.finish();
        assert_eq!(report.frames, 0);
        assert!(report.stream.is_empty());
        assert_eq!(report.metrics.compliance_rate, 100.0);
        assert_eq!(report.metrics.risk_score, 0.0);
        assert_eq!(report.metrics.pipeline_status, PipelineStatus::Pass);
    }

    #[test]
    fn test_helmet_in_zone_escalates_to_critical() {
        let mut session = MonitorSession::new("cam-1", MonitorConfig::default()).unwrap();
        session.set_zones(square_zone()).unwrap();

        for i in 0..20 {
            let t = 100.0 + i as f64 * 0.1;
            let mut dets = worker(1, 100.0, &["no_helmet"]);
            dets.push(Detection::new("vest", Bbox::new(100.0, 130.0, 150.0, 180.0), Some(1), 0.9));
            session.process_frame(&Frame::new(i, t, dets));
        }

        let stream = session.unified_stream();
        assert!(stream.iter().any(|v| v.violation_type == ViolationType::Zone));
        let escalated: Vec<_> = stream
            .iter()
            .filter(|v| v.violation_type == ViolationType::Ppe && v.details.escalated)
            .collect();
        assert!(!escalated.is_empty());
        assert!(escalated.iter().all(|v| v.severity == Severity::Critical));
        assert!(escalated
            .iter()
            .all(|v| v.details.missing_items == vec![EquipmentItem::Helmet]));
    }

    #[test]
    fn test_isolated_vest_is_suppressed() {
        let mut session = MonitorSession::new("cam-2", MonitorConfig::default()).unwrap();
        for i in 0..10 {
            let mut dets = worker(2, 1000.0, &["no_vest"]);
            dets.push(Detection::new("helmet", Bbox::new(1000.0, 100.0, 1050.0, 120.0), Some(2), 0.9));
            session.process_frame(&Frame::new(i, i as f64 * 0.1, dets));
        }
        let report = session.finish();
        assert!(!report.stream.is_empty());
        assert!(report
            .stream
            .iter()
            .all(|v| v.severity == Severity::Safe && v.details.ignored));
        assert_eq!(report.metrics.risk_score, 0.0);
        assert_eq!(report.metrics.pipeline_status, PipelineStatus::Fail);
    }

    #[test]
    fn test_proximity_events_reach_stream() {
        let mut session = MonitorSession::new("cam-3", MonitorConfig::default()).unwrap();
        // 1920x1080 diagonal ~2203px, 100px apart is ~0.045 (critical)
        for i in 0..15 {
            let t = i as f64 * 0.1;
            let mut dets = worker(5, 500.0, &[]);
            dets.push(Detection::new("helmet", Bbox::new(500.0, 100.0, 550.0, 120.0), Some(5), 0.9));
            dets.push(Detection::new("vest", Bbox::new(500.0, 130.0, 550.0, 180.0), Some(5), 0.9));
            dets.push(Detection::new("excavator", Bbox::new(600.0, 100.0, 650.0, 200.0), Some(40), 0.9));
            let report = session.process_frame(&Frame::new(i, t, dets)).unwrap();
            if t >= 1.05 {
                assert_eq!(report.severity, SafetySeverity::Critical);
            }
        }
        let metrics = session.metrics();
        assert!(metrics.counts_by_type.proximity > 0);
        assert_eq!(metrics.counts_by_type.ppe, 0);
        assert_eq!(metrics.most_frequent_violation, Some(ViolationType::Proximity));
    }

    #[test]
    fn test_out_of_order_frame_is_skipped() {
        let mut session = MonitorSession::new("cam-4", MonitorConfig::default()).unwrap();
        assert!(session.process_frame(&Frame::new(1, 10.0, vec![])).is_some());
        assert!(session.process_frame(&Frame::new(0, 9.5, vec![])).is_none());
        assert!(session.process_frame(&Frame::new(2, f64::NAN, vec![])).is_none());
        assert_eq!(session.frames_processed(), 1);
    }

    #[test]
    fn test_inline_sweep_drops_stale_state() {
        let config = MonitorConfig {
            sweep_interval: 10.0,
            ..Default::default()
        };
        let mut session = MonitorSession::new("cam-5", config).unwrap();
        session.process_frame(&Frame::new(0, 0.0, worker(1, 100.0, &["no_helmet"])));
        assert_eq!(session.ppe.tracker().track_ids().count(), 1);

        session.process_frame(&Frame::new(1, 20.0, vec![]));
        assert_eq!(session.ppe.tracker().track_ids().count(), 1);

        session.process_frame(&Frame::new(2, 40.0, vec![]));
        assert_eq!(session.ppe.tracker().track_ids().count(), 0);
    }

    #[test]
    fn test_reset_keeps_zones() {
        let mut session = MonitorSession::new("cam-6", MonitorConfig::default()).unwrap();
        session.set_zones(square_zone()).unwrap();
        session.process_frame(&Frame::new(0, 0.0, worker(1, 100.0, &[])));
        session.process_frame(&Frame::new(1, 2.0, worker(1, 100.0, &[])));
        assert!(session.events().is_some_and(|e| !e.zone.is_empty()));

        session.reset();
        assert!(session.events().is_none());
        assert_eq!(session.frames_processed(), 0);
        session.process_frame(&Frame::new(0, 0.0, worker(1, 100.0, &[])));
        let report = session.process_frame(&Frame::new(1, 2.0, worker(1, 100.0, &[]))).unwrap();
        assert_eq!(report.zone.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MonitorConfig::default();
        config.proximity.critical_distance = 0.5;
        assert!(MonitorSession::new("bad", config).is_err());
    }
}
