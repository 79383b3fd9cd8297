//! Unified violation stream with co-occurrence escalation
//!
//! PPE, proximity and zone events are normalised into one severity
//! vocabulary, then correlated per track inside 1-second buckets (the
//! integer part of the timestamp). Within a bucket a missing helmet next to
//! any risk event becomes critical, a missing vest next to a risk event is
//! raised to warning, and an isolated missing vest is suppressed.

use crate::store::EventStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use violationtrack::{EquipmentItem, PpeSeverity, ProximitySeverity, Timestamp, TrackId};

/// Kind of violation in the unified stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    Ppe,
    Proximity,
    Zone,
}

impl ViolationType {
    pub const ALL: [ViolationType; 3] = [Self::Ppe, Self::Proximity, Self::Zone];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ppe => "ppe",
            Self::Proximity => "proximity",
            Self::Zone => "zone",
        }
    }

    fn is_risk(&self) -> bool {
        matches!(self, Self::Proximity | Self::Zone)
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalised severity of a unified violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Safe,
    Low,
    Warning,
    Critical,
}

impl Severity {
    /// Contribution of one event to the risk score
    pub fn weight(&self) -> u32 {
        match self {
            Self::Safe => 0,
            Self::Low => 1,
            Self::Warning => 5,
            Self::Critical => 10,
        }
    }
}

impl From<PpeSeverity> for Severity {
    fn from(severity: PpeSeverity) -> Self {
        match severity {
            PpeSeverity::Low => Self::Low,
            PpeSeverity::Medium => Self::Warning,
            PpeSeverity::High => Self::Critical,
        }
    }
}

impl From<ProximitySeverity> for Severity {
    fn from(severity: ProximitySeverity) -> Self {
        match severity {
            ProximitySeverity::Warning => Self::Warning,
            ProximitySeverity::Critical => Self::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Low => write!(f, "low"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Why a PPE event's severity was changed by correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationReason {
    #[serde(rename = "Helmet + Risk Zone")]
    HelmetRiskZone,
    #[serde(rename = "Vest + Risk Zone")]
    VestRiskZone,
    #[serde(rename = "Vest Ignored (Safe Zone)")]
    VestIgnored,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HelmetRiskZone => write!(f, "Helmet + Risk Zone"),
            Self::VestRiskZone => write!(f, "Vest + Risk Zone"),
            Self::VestIgnored => write!(f, "Vest Ignored (Safe Zone)"),
        }
    }
}

/// Type-specific payload of a unified violation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationDetails {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_items: Vec<EquipmentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    /// Normalised person-to-machine distance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    pub escalated: bool,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
}

/// One entry of the unified violation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedViolation {
    pub timestamp: Timestamp,
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub track_id: Option<TrackId>,
    pub details: ViolationDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl UnifiedViolation {
    fn is_missing(&self, item: EquipmentItem) -> bool {
        self.details.missing_items.contains(&item)
    }
}

/// Correlation bucket of a timestamp: its whole-second part
pub fn second_bucket(timestamp: Timestamp) -> i64 {
    timestamp.trunc() as i64
}

/// Builds the unified stream of a session from an event store
pub struct ViolationAggregator<'a, S: EventStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: EventStore + ?Sized> ViolationAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Normalise, correlate and time-order every event of a session
    ///
    /// The store is only read, so calling this twice on an unchanged store
    /// yields the same sequence.
    pub fn get_unified_stream(&self, session_id: &str) -> Vec<UnifiedViolation> {
        let mut stream = self.normalize(session_id);
        apply_correlation(&mut stream);
        stream.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        log::debug!(
            "session {}: unified stream of {} violations",
            session_id,
            stream.len()
        );
        stream
    }

    fn normalize(&self, session_id: &str) -> Vec<UnifiedViolation> {
        let mut stream = Vec::new();

        for stored in self.store.ppe_events(session_id) {
            let e = &stored.event;
            stream.push(UnifiedViolation {
                timestamp: e.timestamp,
                violation_type: ViolationType::Ppe,
                severity: e.severity.into(),
                track_id: Some(e.track_id),
                details: ViolationDetails {
                    missing_items: e.missing_items.clone(),
                    ..Default::default()
                },
                image_path: stored.image_path.clone(),
            });
        }

        for stored in self.store.proximity_events(session_id) {
            let e = &stored.event;
            stream.push(UnifiedViolation {
                timestamp: e.timestamp,
                violation_type: ViolationType::Proximity,
                severity: e.severity.into(),
                track_id: Some(e.person_id),
                details: ViolationDetails {
                    machine_type: Some(e.machine_type.clone()),
                    distance: Some(e.distance_norm),
                    ..Default::default()
                },
                image_path: stored.image_path.clone(),
            });
        }

        // zones have no graded severity upstream
        for stored in self.store.zone_events(session_id) {
            let e = &stored.event;
            stream.push(UnifiedViolation {
                timestamp: e.timestamp,
                violation_type: ViolationType::Zone,
                severity: Severity::Critical,
                track_id: Some(e.object_id),
                details: ViolationDetails {
                    zone_id: Some(e.zone_id.clone()),
                    ..Default::default()
                },
                image_path: stored.image_path.clone(),
            });
        }

        stream
    }
}

/// Apply the co-occurrence rules in place
///
/// Events without a track id are left untouched.
pub fn apply_correlation(stream: &mut [UnifiedViolation]) {
    let mut groups: BTreeMap<(TrackId, i64), Vec<usize>> = BTreeMap::new();
    for (idx, event) in stream.iter().enumerate() {
        if let Some(track_id) = event.track_id {
            groups
                .entry((track_id, second_bucket(event.timestamp)))
                .or_default()
                .push(idx);
        }
    }

    for ((track_id, bucket), members) in groups {
        let has_risk = members
            .iter()
            .any(|&idx| stream[idx].violation_type.is_risk());

        for &idx in &members {
            let event = &mut stream[idx];
            if event.violation_type != ViolationType::Ppe {
                continue;
            }
            let helmet = event.is_missing(EquipmentItem::Helmet);
            let vest = event.is_missing(EquipmentItem::Vest);

            if helmet && has_risk {
                event.severity = Severity::Critical;
                event.details.escalated = true;
                event.details.escalation_reason = Some(EscalationReason::HelmetRiskZone);
                log::debug!(
                    "track {} @{}s: missing helmet next to risk, escalated to critical",
                    track_id,
                    bucket
                );
            } else if vest && has_risk {
                if event.severity <= Severity::Low {
                    event.severity = Severity::Warning;
                    event.details.escalated = true;
                    event.details.escalation_reason = Some(EscalationReason::VestRiskZone);
                }
            } else if vest && !helmet {
                event.severity = Severity::Safe;
                event.details.ignored = true;
                event.details.escalation_reason = Some(EscalationReason::VestIgnored);
            }
        }
    }
}
