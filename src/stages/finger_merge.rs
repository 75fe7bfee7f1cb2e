//! Flags contacts whose histories indicate they are the same physical
//! finger that the sensor split into two tracking ids, without rewriting
//! the hardware state (unlike the legacy `SplitCorrectingFilter`).
//!
//! Grounded on `finger_merge_filter_interpreter.h` (header only). Two
//! concurrent fingers closer than `Merge Max Distance` for at least
//! `Merge Min Frames` consecutive frames both get `MERGE` set; downstream
//! stages (the tap-to-click machine, the motion classifier) treat a
//! `MERGE`-flagged pair as one contact for counting purposes without the
//! v2 stack needing to actually drop a tracking id.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerFlags, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

pub struct FingerMergeFilterInterpreter {
    base: FilterBase,
    max_distance: BoundCell<f64>,
    min_frames: BoundCell<i32>,
    close_since: HashMap<(i16, i16), u32>,
}

impl FingerMergeFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            max_distance: prop_reg.bind_double("Merge Max Distance", 4.0),
            min_frames: prop_reg.bind_int("Merge Min Frames", 3),
            close_since: HashMap::new(),
        }
    }

    fn update(&mut self, hwstate: &mut HardwareState) {
        let n = hwstate.fingers.len();
        let mut seen_pairs = std::collections::HashSet::new();
        let mut merge_ids = std::collections::HashSet::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let a = hwstate.fingers[i];
                let b = hwstate.fingers[j];
                let key = (a.tracking_id.min(b.tracking_id), a.tracking_id.max(b.tracking_id));
                seen_pairs.insert(key);

                let dist = a.dist_sq(&b).sqrt();
                if dist > *self.max_distance.borrow() {
                    self.close_since.remove(&key);
                    continue;
                }
                let count = self.close_since.entry(key).or_insert(0);
                *count += 1;
                if *count >= (*self.min_frames.borrow()).max(0) as u32 {
                    merge_ids.insert(a.tracking_id);
                    merge_ids.insert(b.tracking_id);
                }
            }
        }
        self.close_since.retain(|k, _| seen_pairs.contains(k));

        for finger in &mut hwstate.fingers {
            if merge_ids.contains(&finger.tracking_id) {
                finger.flags |= FingerFlags::MERGE;
            }
        }
    }
}

impl Interpreter for FingerMergeFilterInterpreter {
    fn name(&self) -> &'static str {
        "FingerMergeFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.update(hwstate);
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
    fn far_apart_fingers_never_merge() {
        let mut reg = PropRegistry::new();
        let mut filt = FingerMergeFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..5 {
            let mut hs = HardwareState::new(
                i as f64 * 0.01,
                vec![FingerState::new(1, 0.0, 0.0, 50.0), FingerState::new(2, 500.0, 500.0, 50.0)],
            );
            filt.sync_interpret(&mut hs, &mut timeout);
            assert!(hs.fingers.iter().all(|f| !f.flags.contains(FingerFlags::MERGE)));
        }
    }

    #[test]
    fn persistently_close_pair_gets_flagged() {
        let mut reg = PropRegistry::new();
        let mut filt = FingerMergeFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..4 {
            let mut hs = HardwareState::new(
                i as f64 * 0.01,
                vec![FingerState::new(1, 10.0, 10.0, 50.0), FingerState::new(2, 11.0, 10.0, 50.0)],
            );
            filt.sync_interpret(&mut hs, &mut timeout);
            if i == 3 {
                assert!(hs.fingers.iter().all(|f| f.flags.contains(FingerFlags::MERGE)));
            }
        }
    }
}
