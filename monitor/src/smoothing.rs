//! Rolling-mean confidence smoothing per (track, class)

use crate::types::ObjectClass;
use std::collections::{BTreeMap, VecDeque};
use violationtrack::{Timestamp, TrackId};

#[derive(Debug, Clone)]
struct SmoothingBuffer {
    values: VecDeque<f32>,
    last_update: Timestamp,
}

/// Averages the last `window` confidences reported for each (track, class)
#[derive(Debug, Clone)]
pub struct ConfidenceSmoother {
    window: usize,
    buffers: BTreeMap<(TrackId, ObjectClass), SmoothingBuffer>,
}

impl ConfidenceSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buffers: BTreeMap::new(),
        }
    }

    /// Push a raw confidence and return the smoothed value
    pub fn smooth(
        &mut self,
        track_id: TrackId,
        class: ObjectClass,
        confidence: f32,
        now: Timestamp,
    ) -> f32 {
        let buffer = self
            .buffers
            .entry((track_id, class))
            .or_insert_with(|| SmoothingBuffer {
                values: VecDeque::with_capacity(self.window),
                last_update: now,
            });
        if buffer.values.len() == self.window {
            buffer.values.pop_front();
        }
        buffer.values.push_back(confidence);
        buffer.last_update = now;
        buffer.values.iter().sum::<f32>() / buffer.values.len() as f32
    }

    /// Drop buffers not updated within `stale_after` seconds
    pub fn sweep(&mut self, now: Timestamp, stale_after: f64) -> usize {
        let before = self.buffers.len();
        self.buffers
            .retain(|_, buffer| now - buffer.last_update <= stale_after);
        before - self.buffers.len()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rolling_mean_over_window() {
        let mut smoother = ConfidenceSmoother::new(3);
        assert_abs_diff_eq!(smoother.smooth(1, ObjectClass::Helmet, 0.9, 0.0), 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(smoother.smooth(1, ObjectClass::Helmet, 0.6, 0.1), 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(smoother.smooth(1, ObjectClass::Helmet, 0.3, 0.2), 0.6, epsilon = 1e-6);
        // oldest value (0.9) drops out
        assert_abs_diff_eq!(smoother.smooth(1, ObjectClass::Helmet, 0.3, 0.3), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_buffers_are_per_track_and_class() {
        let mut smoother = ConfidenceSmoother::new(5);
        smoother.smooth(1, ObjectClass::Helmet, 0.2, 0.0);
        assert_abs_diff_eq!(smoother.smooth(1, ObjectClass::NoHelmet, 0.8, 0.0), 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(smoother.smooth(2, ObjectClass::Helmet, 0.7, 0.0), 0.7, epsilon = 1e-6);
        assert_eq!(smoother.len(), 3);
    }

    #[test]
    fn test_sweep_drops_stale_buffers() {
        let mut smoother = ConfidenceSmoother::new(5);
        smoother.smooth(1, ObjectClass::Vest, 0.9, 0.0);
        smoother.smooth(2, ObjectClass::Vest, 0.9, 20.0);
        assert_eq!(smoother.sweep(40.0, 30.0), 1);
        assert_eq!(smoother.len(), 1);
    }
}
