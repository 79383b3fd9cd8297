//! Common lifecycle interface for the per-track state machines
//!
//! Each detector keeps its own per-track state; this trait exposes the
//! housekeeping operations the session layer needs without caring which
//! detector it is talking to.

use crate::compliance::ComplianceTracker;
use crate::proximity::ProximityDetector;
use crate::zone::ZoneMonitor;
use crate::{Timestamp, TrackId};

/// Housekeeping for a detector holding per-track state
pub trait TrackStateMachine: Send {
    /// Number of tracks with live state
    fn num_tracks(&self) -> usize;

    /// Forget everything about one track
    fn remove_track(&mut self, track_id: TrackId);

    /// Drop all per-track state
    fn clear(&mut self);

    /// Drop state not refreshed within the detector's stale window
    ///
    /// Returns the number of entries removed.
    fn sweep_stale(&mut self, now: Timestamp) -> usize;
}

impl TrackStateMachine for ComplianceTracker {
    fn num_tracks(&self) -> usize {
        self.len()
    }

    fn remove_track(&mut self, track_id: TrackId) {
        self.remove(track_id)
    }

    fn clear(&mut self) {
        ComplianceTracker::clear(self)
    }

    fn sweep_stale(&mut self, now: Timestamp) -> usize {
        self.sweep(now)
    }
}

impl TrackStateMachine for ProximityDetector {
    fn num_tracks(&self) -> usize {
        self.len()
    }

    fn remove_track(&mut self, track_id: TrackId) {
        self.remove(track_id)
    }

    fn clear(&mut self) {
        ProximityDetector::clear(self)
    }

    fn sweep_stale(&mut self, now: Timestamp) -> usize {
        self.sweep(now)
    }
}

impl TrackStateMachine for ZoneMonitor {
    fn num_tracks(&self) -> usize {
        self.len()
    }

    fn remove_track(&mut self, track_id: TrackId) {
        self.remove(track_id)
    }

    fn clear(&mut self) {
        ZoneMonitor::clear(self)
    }

    fn sweep_stale(&mut self, now: Timestamp) -> usize {
        self.sweep(now)
    }
}
