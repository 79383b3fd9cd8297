//! Per-track safety state machines for construction-site monitoring
//!
//! This crate holds the time-dependent detectors that turn noisy per-frame
//! observations into debounced safety violations:
//! - ComplianceTracker: PPE hysteresis with escalation by repetition and duration
//! - ProximityDetector: person-to-machine distance with per-severity debouncing
//! - ZoneMonitor: restricted-zone dwell with boundary-inclusive polygons
//!
//! # Unified Interface
//!
//! All detectors implement the `TrackStateMachine` trait for housekeeping:
//!
//! ```rust
//! use violationtrack::{ComplianceTracker, ProximityDetector, TrackStateMachine, ZoneMonitor};
//!
//! let mut machines: Vec<Box<dyn TrackStateMachine>> = vec![
//!     Box::new(ComplianceTracker::default()),
//!     Box::new(ProximityDetector::default()),
//!     Box::new(ZoneMonitor::default()),
//! ];
//! for machine in machines.iter_mut() {
//!     machine.sweep_stale(60.0);
//! }
//! ```
//!
//! Timestamps are seconds as `f64`; nothing here reads the wall clock.

pub mod bbox;
pub mod compliance;
pub mod polygon;
pub mod proximity;
pub mod state;
pub mod zone;

/// Identifier assigned by the upstream object tracker
pub type TrackId = u32;

/// Seconds since an arbitrary session epoch
pub type Timestamp = f64;

pub use bbox::{frame_diagonal, Bbox, Point};
pub use compliance::{
    ComplianceConfig, ComplianceEvaluation, ComplianceTracker, EquipmentItem, ItemSignal,
    PpeSeverity,
};
pub use polygon::Polygon;
pub use proximity::{
    MachineObservation, PersonObservation, ProximityConfig, ProximityDetector, ProximityEvent,
    ProximitySeverity,
};
pub use state::TrackStateMachine;
pub use zone::{TrackedObject, ZoneConfig, ZoneMonitor, ZoneViolation};
