//! Frame-level safety severity from PPE and proximity signals

use crate::ppe_rules::PpeViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use violationtrack::{PpeSeverity, ProximityEvent, ProximitySeverity};

/// Overall severity of one processed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for SafetySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Merge one frame's PPE violations and proximity events
///
/// Rules, first match wins:
/// - any proximity CRITICAL ⇒ CRITICAL
/// - two or more proximity WARNING ⇒ HIGH
/// - any PPE HIGH ⇒ HIGH
/// - two or more PPE MEDIUM ⇒ MEDIUM
/// - otherwise LOW
pub fn merge_safety_severity(ppe: &[PpeViolation], proximity: &[ProximityEvent]) -> SafetySeverity {
    if proximity
        .iter()
        .any(|e| e.severity == ProximitySeverity::Critical)
    {
        return SafetySeverity::Critical;
    }

    let proximity_warning = proximity
        .iter()
        .filter(|e| e.severity == ProximitySeverity::Warning)
        .count();
    let ppe_high = ppe.iter().filter(|v| v.severity == PpeSeverity::High).count();
    let ppe_medium = ppe
        .iter()
        .filter(|v| v.severity == PpeSeverity::Medium)
        .count();

    if proximity_warning >= 2 || ppe_high >= 1 {
        SafetySeverity::High
    } else if ppe_medium >= 2 {
        SafetySeverity::Medium
    } else {
        SafetySeverity::Low
    }
}
