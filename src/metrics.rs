//! Per-finger origin timestamps, rolling history, and the handful of
//! derived statistics higher stages (trend classification, palm rescue,
//! tap timing) read back out.

use crate::types::{FingerState, Stime};
use std::collections::{HashMap, VecDeque};

/// Passed at `initialize` alongside [`crate::types::HardwareProperties`];
/// currently empty but kept as a distinct type so stages that take it keep
/// the same call shape as the source's `MetricsProperties*` parameter.
#[derive(Debug, Clone, Default)]
pub struct MetricsProperties;

/// One sample in a finger's rolling history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub timestamp: Stime,
    pub state: FingerState,
}

/// Bounded FIFO of recent samples for one tracking id, used by the
/// Kendall-τ trend test and by rolling-average consumers.
#[derive(Debug, Clone, Default)]
pub struct FingerHistory {
    samples: VecDeque<HistorySample>,
    capacity: usize,
}

impl FingerHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, timestamp: Stime, state: FingerState) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(HistorySample { timestamp, state });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    pub fn oldest(&self) -> Option<&HistorySample> {
        self.samples.front()
    }

    pub fn newest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Per-finger first-seen time and rolling history, keyed by tracking id.
/// `MetricsFilterInterpreter` maintains one of these per chain; later
/// stages (trend classification, the tap-to-click machine) consult it
/// through [`Metrics::origin_timestamp`] and [`Metrics::history`].
#[derive(Debug, Default)]
pub struct Metrics {
    origin: HashMap<i16, Stime>,
    history: HashMap<i16, FingerHistory>,
    history_depth: usize,
}

impl Metrics {
    pub fn new(history_depth: usize) -> Self {
        Self {
            origin: HashMap::new(),
            history: HashMap::new(),
            history_depth,
        }
    }

    /// Call once per frame with the currently-present tracking ids so stale
    /// entries for fingers that have left the pad are forgotten.
    pub fn update(&mut self, timestamp: Stime, fingers: &[FingerState]) {
        let present: std::collections::HashSet<i16> =
            fingers.iter().map(|f| f.tracking_id).collect();
        self.origin.retain(|id, _| present.contains(id));
        self.history.retain(|id, _| present.contains(id));

        for finger in fingers {
            self.origin.entry(finger.tracking_id).or_insert(timestamp);
            self.history
                .entry(finger.tracking_id)
                .or_insert_with(|| FingerHistory::new(self.history_depth))
                .push(timestamp, *finger);
        }
    }

    pub fn origin_timestamp(&self, tracking_id: i16) -> Option<Stime> {
        self.origin.get(&tracking_id).copied()
    }

    pub fn age(&self, tracking_id: i16, now: Stime) -> Option<Stime> {
        self.origin_timestamp(tracking_id).map(|t0| now - t0)
    }

    pub fn history(&self, tracking_id: i16) -> Option<&FingerHistory> {
        self.history.get(&tracking_id)
    }

    pub fn clear(&mut self) {
        self.origin.clear();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_timestamp_is_first_seen_time() {
        let mut m = Metrics::new(10);
        let f = FingerState::new(1, 0.0, 0.0, 50.0);
        m.update(1.0, &[f]);
        m.update(1.1, &[f]);
        assert_eq!(m.origin_timestamp(1), Some(1.0));
        assert_eq!(m.age(1, 1.1), Some(0.1_f64.max(0.1) - 0.0));
    }

    #[test]
    fn departed_finger_is_forgotten() {
        let mut m = Metrics::new(10);
        let f = FingerState::new(7, 0.0, 0.0, 50.0);
        m.update(1.0, &[f]);
        m.update(1.1, &[]);
        assert_eq!(m.origin_timestamp(7), None);
        assert!(m.history(7).is_none());
    }

    #[test]
    fn history_respects_capacity() {
        let mut hist = FingerHistory::new(3);
        for i in 0..5 {
            hist.push(i as f64, FingerState::new(1, i as f64, 0.0, 50.0));
        }
        assert_eq!(hist.len(), 3);
        assert_eq!(hist.oldest().unwrap().timestamp, 2.0);
        assert_eq!(hist.newest().unwrap().timestamp, 4.0);
    }
}
