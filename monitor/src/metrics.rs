//! Risk and compliance metrics over a unified violation stream

use crate::aggregator::{UnifiedViolation, ViolationType};
use serde::{Deserialize, Serialize};

/// Highest per-event severity weight
const MAX_WEIGHT: f64 = 10.0;

/// Number of violations of each type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub ppe: usize,
    pub proximity: usize,
    pub zone: usize,
}

impl ViolationCounts {
    pub fn get(&self, violation_type: ViolationType) -> usize {
        match violation_type {
            ViolationType::Ppe => self.ppe,
            ViolationType::Proximity => self.proximity,
            ViolationType::Zone => self.zone,
        }
    }

    fn increment(&mut self, violation_type: ViolationType) {
        match violation_type {
            ViolationType::Ppe => self.ppe += 1,
            ViolationType::Proximity => self.proximity += 1,
            ViolationType::Zone => self.zone += 1,
        }
    }
}

/// Overall outcome of a processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Pass,
    Fail,
}

/// Summary numbers for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub total_violations: usize,
    pub counts_by_type: ViolationCounts,
    /// Severity density in [0, 100]
    pub risk_score: f64,
    /// `100 - risk_score`, floored at 0
    pub compliance_rate: f64,
    pub most_frequent_violation: Option<ViolationType>,
    pub total_frames: u64,
    pub pipeline_status: PipelineStatus,
}

/// Reduces unified streams to [`SiteMetrics`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskMetricsEngine;

impl RiskMetricsEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, stream: &[UnifiedViolation], total_frames: u64) -> SiteMetrics {
        let mut counts = ViolationCounts::default();
        let mut raw_score = 0u64;
        for violation in stream {
            counts.increment(violation.violation_type);
            raw_score += violation.severity.weight() as u64;
        }

        let total = stream.len();
        let risk_score = if total == 0 {
            0.0
        } else {
            raw_score as f64 / (total as f64 * MAX_WEIGHT) * 100.0
        };
        let compliance_rate = (100.0 - risk_score).max(0.0);

        // ties resolve in declaration order: ppe, proximity, zone
        let most_frequent_violation = ViolationType::ALL
            .into_iter()
            .filter(|t| counts.get(*t) > 0)
            .fold(None::<ViolationType>, |best, t| match best {
                Some(b) if counts.get(b) >= counts.get(t) => Some(b),
                _ => Some(t),
            });

        SiteMetrics {
            total_violations: total,
            counts_by_type: counts,
            risk_score: round2(risk_score),
            compliance_rate: round2(compliance_rate),
            most_frequent_violation,
            total_frames,
            pipeline_status: if total == 0 {
                PipelineStatus::Pass
            } else {
                PipelineStatus::Fail
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
