//! On "track 5, report 2" sensors, zeroes `touch_cnt` when the sensor gets
//! stuck reporting an unchanged non-zero touch count with zero fingers.
//!
//! Grounded on `t5r2_correcting_filter_interpreter.cc`.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};

pub struct T5R2CorrectingFilterInterpreter {
    base: FilterBase,
    last_finger_cnt: usize,
    last_touch_cnt: usize,
    touch_cnt_correct_enabled: BoundCell<bool>,
}

impl T5R2CorrectingFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            last_finger_cnt: 0,
            last_touch_cnt: 0,
            touch_cnt_correct_enabled: prop_reg.bind_bool("T5R2 Touch Count Correct Enabled", true),
        }
    }
}

impl Interpreter for T5R2CorrectingFilterInterpreter {
    fn name(&self) -> &'static str {
        "T5R2CorrectingFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        if *self.touch_cnt_correct_enabled.borrow()
            && hwstate.finger_cnt() == 0
            && self.last_finger_cnt == 0
            && hwstate.touch_cnt != 0
            && hwstate.touch_cnt == self.last_touch_cnt
        {
            hwstate.touch_cnt = 0;
        }
        self.last_touch_cnt = hwstate.touch_cnt;
        self.last_finger_cnt = hwstate.finger_cnt();

        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        *timeout = self.base.combine_timeout(now, None);
        gestures.into_iter().filter_map(|g| self.consume_gesture(g)).collect()
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let (gestures, _) = self.base.handle_timer_next(now);
        *timeout = self.base.combine_timeout(now, None);
        gestures.into_iter().filter_map(|g| self.consume_gesture(g)).collect()
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.last_finger_cnt = 0;
        self.last_touch_cnt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn zeroes_stuck_touch_count() {
        let mut reg = PropRegistry::new();
        let mut filt = T5R2CorrectingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;

        let mut hs1 = HardwareState::new(0.0, vec![]);
        hs1.touch_cnt = 3;
        filt.sync_interpret(&mut hs1, &mut timeout);
        assert_eq!(hs1.touch_cnt, 3); // first occurrence, not yet "stuck"

        let mut hs2 = HardwareState::new(0.01, vec![]);
        hs2.touch_cnt = 3;
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert_eq!(hs2.touch_cnt, 0); // same count twice with 0 fingers -> corrected
    }

    #[test]
    fn does_not_zero_when_fingers_present() {
        use crate::types::FingerState;
        let mut reg = PropRegistry::new();
        let mut filt = T5R2CorrectingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 10.0)]);
        hs.touch_cnt = 3;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert_eq!(hs.touch_cnt, 3);
    }
}
