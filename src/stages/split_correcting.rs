//! Legacy (v1 stack) filter that undoes a semi-MT sensor's tendency to
//! briefly "split" one physical finger into two very close tracking ids for
//! a frame or two before they either merge back or diverge into a real
//! two-finger gesture.
//!
//! Grounded on `split_correcting_filter_interpreter.h` (header only). Where
//! `FingerMergeFilter` (the v2-stack stage, §4.6) flags a *merge* candidate
//! for downstream consumers to treat specially, this legacy stage actively
//! rewrites the hardware state: when exactly two fingers are closer than
//! `Split Correct Max Distance` for at least `Split Correct Min Frames`
//! consecutive frames, the newer tracking id is suppressed and its
//! coordinates are averaged into the older one, so downstream sees a single
//! contact — matching the v1 stack's simpler, non-MERGE-flag-based
//! behavior.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

pub struct SplitCorrectingFilterInterpreter {
    base: FilterBase,
    max_distance: BoundCell<f64>,
    min_frames: BoundCell<i32>,
    close_since: HashMap<(i16, i16), u32>,
}

impl SplitCorrectingFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            max_distance: prop_reg.bind_double("Split Correct Max Distance", 5.0),
            min_frames: prop_reg.bind_int("Split Correct Min Frames", 2),
            close_since: HashMap::new(),
        }
    }

    fn correct(&mut self, hwstate: &mut HardwareState) {
        if hwstate.fingers.len() != 2 {
            self.close_since.clear();
            return;
        }
        let max_distance = *self.max_distance.borrow();
        let min_frames = (*self.min_frames.borrow()).max(0) as u32;
        let a = hwstate.fingers[0];
        let b = hwstate.fingers[1];
        let key = (a.tracking_id.min(b.tracking_id), a.tracking_id.max(b.tracking_id));
        let dist = a.dist_sq(&b).sqrt();

        if dist > max_distance {
            self.close_since.remove(&key);
            return;
        }

        let count = self.close_since.entry(key).or_insert(0);
        *count += 1;
        if *count < min_frames {
            return;
        }

        let (keep_idx, drop_idx) = if a.tracking_id < b.tracking_id { (0, 1) } else { (1, 0) };
        let avg_x = (hwstate.fingers[0].x + hwstate.fingers[1].x) / 2.0;
        let avg_y = (hwstate.fingers[0].y + hwstate.fingers[1].y) / 2.0;
        hwstate.fingers[keep_idx].x = avg_x;
        hwstate.fingers[keep_idx].y = avg_y;
        hwstate.fingers.remove(drop_idx);
    }
}

impl Interpreter for SplitCorrectingFilterInterpreter {
    fn name(&self) -> &'static str {
        "SplitCorrectingFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.correct(hwstate);
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        *timeout = self.base.combine_timeout(now, None);
        gestures
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let (gestures, _) = self.base.handle_timer_next(now);
        *timeout = self.base.combine_timeout(now, None);
        gestures
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.close_since.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FingerState;

    struct Sink;
    impl Interpreter for Sink {
        fn name(&self) -> &'static str {
            "Sink"
        }
        fn initialize(&mut self, _: &HardwareProperties, _: &mut Metrics, _: &MetricsProperties) {}
        fn sync_interpret(&mut self, _: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
        fn handle_timer(&mut self, _: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
    }

    #[test]
    fn widely_separated_fingers_are_untouched() {
        let mut reg = PropRegistry::new();
        let mut filt = SplitCorrectingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut hs = HardwareState::new(
            0.0,
            vec![FingerState::new(1, 0.0, 0.0, 50.0), FingerState::new(2, 500.0, 500.0, 50.0)],
        );
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert_eq!(hs.fingers.len(), 2);
    }

    #[test]
    fn persistently_close_pair_merges_after_min_frames() {
        let mut reg = PropRegistry::new();
        let mut filt = SplitCorrectingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..3 {
            let mut hs = HardwareState::new(
                i as f64 * 0.01,
                vec![FingerState::new(1, 10.0, 10.0, 50.0), FingerState::new(2, 11.0, 10.0, 50.0)],
            );
            filt.sync_interpret(&mut hs, &mut timeout);
            if i == 2 {
                assert_eq!(hs.fingers.len(), 1);
            }
        }
    }
}
