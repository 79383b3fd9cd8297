//! Site Safety Monitor Library
//!
//! Turns per-frame object detections from a construction-site camera into
//! debounced safety violations, merges PPE, proximity and zone violations
//! into one severity-escalated stream, and reduces that stream to risk and
//! compliance metrics.
//!
//! Each camera run is a [`MonitorSession`]. Sessions are independent: run
//! them inline, on their own thread with [`SessionWorker`], or in parallel
//! with [`run_sessions`].

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ppe_rules;
pub mod session;
pub mod severity;
pub mod smoothing;
pub mod store;
pub mod types;
pub mod worker;
pub mod zones;

pub use aggregator::{
    EscalationReason, Severity, UnifiedViolation, ViolationAggregator, ViolationDetails,
    ViolationType,
};
pub use batch::{run_session, run_sessions, SessionJob};
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use metrics::{PipelineStatus, RiskMetricsEngine, SiteMetrics, ViolationCounts};
pub use ppe_rules::{PpeRuleEngine, PpeViolation};
pub use session::{FrameReport, MonitorSession, SessionReport};
pub use severity::{merge_safety_severity, SafetySeverity};
pub use store::{EventStore, InMemoryEventStore, SessionEvents, StoredEvent};
pub use types::{Detection, Frame, ObjectClass};
pub use worker::{SessionCommand, SessionWorker};
pub use zones::{load_zones, parse_zones};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
