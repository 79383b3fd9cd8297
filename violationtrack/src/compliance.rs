//! Per-(track, equipment item) hysteresis for PPE compliance
//!
//! Each tracked person carries one [`ItemState`] per monitored item. Noisy
//! per-frame signals are turned into a stable "violation active" flag:
//!
//! - `Missing` must be seen `start_threshold` times in a row before a
//!   violation starts; a single run of `end_threshold` `Present` signals
//!   clears it again.
//! - `Unknown` holds the counters steady until it has lasted longer than
//!   `unknown_timeout`, after which every further `Unknown` counts as
//!   `Missing`.
//!
//! Severity comes from the age of the current violation and from how many
//! other violations the same track started in the trailing history window.

use crate::{Timestamp, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Closed set of protective equipment the state machine monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentItem {
    Helmet,
    Vest,
}

impl EquipmentItem {
    pub const ALL: [EquipmentItem; 2] = [EquipmentItem::Helmet, EquipmentItem::Vest];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Helmet => "helmet",
            Self::Vest => "vest",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Helmet => 0,
            Self::Vest => 1,
        }
    }
}

impl fmt::Display for EquipmentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observation of one item on one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemSignal {
    /// Item positively detected on the person
    Present,
    /// Item positively detected as absent (`no_helmet`, `no_vest`)
    Missing,
    /// Neither seen this frame
    Unknown,
}

/// Severity of a PPE violation as reported by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PpeSeverity {
    Low,
    Medium,
    High,
}

impl fmt::Display for PpeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Configuration for the compliance state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Consecutive effective `Missing` signals needed to start a violation
    pub start_threshold: u32,
    /// Consecutive `Present` signals needed to clear a violation
    pub end_threshold: u32,
    /// Seconds of continuous `Unknown` before it escalates to `Missing`
    pub unknown_timeout: f64,
    /// Violation age (seconds) at which severity becomes MEDIUM
    pub medium_after: f64,
    /// Trailing window (seconds) of violation starts kept per track
    pub history_window: f64,
    /// Number of other violation starts inside the window that forces HIGH
    pub repeat_threshold: usize,
    /// Seconds without an update before a track is considered stale
    pub stale_after: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            start_threshold: 3,
            end_threshold: 1,
            unknown_timeout: 5.0,
            medium_after: 5.0,
            history_window: 600.0,
            repeat_threshold: 2,
            stale_after: 30.0,
        }
    }
}

/// Hysteresis state for one item on one track
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    pub missing_count: u32,
    pub present_count: u32,
    pub active_violation: bool,
    pub violation_start: Option<Timestamp>,
    pub unknown_start: Option<Timestamp>,
    pub last_confidence: f32,
    pub last_update: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Unchanged,
    Started,
    Cleared,
}

impl ItemState {
    fn new(now: Timestamp) -> Self {
        Self {
            missing_count: 0,
            present_count: 0,
            active_violation: false,
            violation_start: None,
            unknown_start: None,
            last_confidence: 0.0,
            last_update: now,
        }
    }

    fn apply(
        &mut self,
        signal: ItemSignal,
        confidence: f32,
        now: Timestamp,
        config: &ComplianceConfig,
    ) -> Transition {
        self.last_confidence = confidence;
        self.last_update = now;

        match signal {
            ItemSignal::Missing => self.count_missing(),
            ItemSignal::Present => {
                self.present_count += 1;
                self.missing_count = 0;
                self.unknown_start = None;
            }
            ItemSignal::Unknown => {
                let since = *self.unknown_start.get_or_insert(now);
                if now - since > config.unknown_timeout {
                    self.missing_count += 1;
                    self.present_count = 0;
                }
            }
        }

        if !self.active_violation {
            if self.missing_count >= config.start_threshold {
                self.active_violation = true;
                self.violation_start = Some(now);
                return Transition::Started;
            }
        } else if self.present_count >= config.end_threshold {
            self.active_violation = false;
            self.violation_start = None;
            return Transition::Cleared;
        }
        Transition::Unchanged
    }

    fn count_missing(&mut self) {
        self.missing_count += 1;
        self.present_count = 0;
        self.unknown_start = None;
    }
}

/// Violation start times of one track, pruned to a trailing window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViolationHistory {
    starts: VecDeque<Timestamp>,
}

impl ViolationHistory {
    pub fn record(&mut self, start: Timestamp, now: Timestamp, window: f64) {
        self.starts.push_back(start);
        self.prune(now, window);
    }

    pub fn prune(&mut self, now: Timestamp, window: f64) {
        let cutoff = now - window;
        while self.starts.front().is_some_and(|t| *t <= cutoff) {
            self.starts.pop_front();
        }
    }

    /// Starts inside the window that are not in `exclude`
    pub fn count_other(&self, now: Timestamp, window: f64, exclude: &[Timestamp]) -> usize {
        let cutoff = now - window;
        self.starts
            .iter()
            .filter(|t| **t > cutoff && !exclude.contains(t))
            .count()
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

#[derive(Debug, Clone)]
struct TrackCompliance {
    items: [ItemState; 2],
    history: ViolationHistory,
    last_update: Timestamp,
}

impl TrackCompliance {
    fn new(now: Timestamp) -> Self {
        Self {
            items: [ItemState::new(now), ItemState::new(now)],
            history: ViolationHistory::default(),
            last_update: now,
        }
    }
}

/// Result of evaluating one track
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceEvaluation {
    pub track_id: TrackId,
    /// Items with an active violation, in [`EquipmentItem::ALL`] order
    pub active_items: Vec<EquipmentItem>,
    /// Last confidence of each active item, parallel to `active_items`
    pub confidences: Vec<f32>,
    /// `None` when no item is active
    pub severity: Option<PpeSeverity>,
    /// Age in seconds of the oldest active violation
    pub duration: f64,
}

impl ComplianceEvaluation {
    pub fn is_violation(&self) -> bool {
        !self.active_items.is_empty()
    }

    /// Highest confidence among the active items
    pub fn max_confidence(&self) -> Option<f32> {
        self.confidences.iter().copied().reduce(f32::max)
    }
}

/// Compliance state for every tracked person in one session
#[derive(Debug, Clone)]
pub struct ComplianceTracker {
    config: ComplianceConfig,
    tracks: BTreeMap<TrackId, TrackCompliance>,
}

impl ComplianceTracker {
    pub fn new(config: ComplianceConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    /// Feed one signal for one item of one track
    ///
    /// Unseen tracks are created on first use.
    pub fn update(
        &mut self,
        track_id: TrackId,
        item: EquipmentItem,
        signal: ItemSignal,
        confidence: f32,
        now: Timestamp,
    ) {
        let track = self
            .tracks
            .entry(track_id)
            .or_insert_with(|| TrackCompliance::new(now));
        track.last_update = now;

        let state = &mut track.items[item.index()];
        match state.apply(signal, confidence, now, &self.config) {
            Transition::Started => {
                track.history.record(now, now, self.config.history_window);
                log::debug!(
                    "track {}: {} violation started (missing x{})",
                    track_id,
                    item,
                    state.missing_count
                );
            }
            Transition::Cleared => {
                log::debug!("track {}: {} violation cleared", track_id, item);
            }
            Transition::Unchanged => {}
        }
    }

    /// Active violations of a track and their severity at `now`
    pub fn evaluate(&self, track_id: TrackId, now: Timestamp) -> ComplianceEvaluation {
        let mut evaluation = ComplianceEvaluation {
            track_id,
            active_items: Vec::new(),
            confidences: Vec::new(),
            severity: None,
            duration: 0.0,
        };
        let Some(track) = self.tracks.get(&track_id) else {
            return evaluation;
        };

        let mut current_starts = Vec::new();
        for item in EquipmentItem::ALL {
            let state = &track.items[item.index()];
            if !state.active_violation {
                continue;
            }
            evaluation.active_items.push(item);
            evaluation.confidences.push(state.last_confidence);
            if let Some(start) = state.violation_start {
                evaluation.duration = evaluation.duration.max(now - start);
                current_starts.push(start);
            }
        }

        if evaluation.is_violation() {
            let repeats =
                track
                    .history
                    .count_other(now, self.config.history_window, &current_starts);
            evaluation.severity = Some(if repeats >= self.config.repeat_threshold {
                PpeSeverity::High
            } else if evaluation.duration >= self.config.medium_after {
                PpeSeverity::Medium
            } else {
                PpeSeverity::Low
            });
        }
        evaluation
    }

    pub fn item_state(&self, track_id: TrackId, item: EquipmentItem) -> Option<&ItemState> {
        self.tracks
            .get(&track_id)
            .map(|track| &track.items[item.index()])
    }

    pub fn history(&self, track_id: TrackId) -> Option<&ViolationHistory> {
        self.tracks.get(&track_id).map(|track| &track.history)
    }

    /// Tracks with state, in ascending id order
    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    /// True when the track exists and has not been updated within `stale_after`
    pub fn is_stale(&self, track_id: TrackId, now: Timestamp) -> bool {
        self.tracks
            .get(&track_id)
            .is_some_and(|track| now - track.last_update > self.config.stale_after)
    }

    pub(crate) fn sweep(&mut self, now: Timestamp) -> usize {
        let before = self.tracks.len();
        let stale_after = self.config.stale_after;
        let window = self.config.history_window;
        self.tracks.retain(|_, track| now - track.last_update <= stale_after);
        for track in self.tracks.values_mut() {
            track.history.prune(now, window);
        }
        before - self.tracks.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn remove(&mut self, track_id: TrackId) {
        self.tracks.remove(&track_id);
    }

    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
    }
}

impl Default for ComplianceTracker {
    fn default() -> Self {
        Self::new(ComplianceConfig::default())
    }
}
