//! Rebases host timestamps onto the device's `msc_timestamp` clock, or onto
//! a synthetic uniform timeline, and tracks clock skew so emitted gestures
//! can be translated back to the host clock.
//!
//! Grounded on `timestamp_filter_interpreter.cc`.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};

pub struct TimestampFilterInterpreter {
    base: FilterBase,
    prev_msc_timestamp: Stime,
    msc_timestamp_offset: Stime,
    fake_timestamp: Stime,
    fake_timestamp_max_divergence: Stime,
    skew: Stime,
    max_skew: Stime,
    fake_timestamp_delta: BoundCell<f64>,
}

impl TimestampFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            prev_msc_timestamp: -1.0,
            msc_timestamp_offset: -1.0,
            fake_timestamp: -1.0,
            fake_timestamp_max_divergence: 0.1,
            skew: 0.0,
            max_skew: 0.0,
            fake_timestamp_delta: prop_reg.bind_double("Fake Timestamp Delta", 0.0),
        }
    }

    fn change_timestamp_default(&mut self, hwstate: &mut HardwareState) {
        if self.prev_msc_timestamp < 0.0
            || hwstate.msc_timestamp == 0.0
            || hwstate.msc_timestamp < self.prev_msc_timestamp
        {
            self.msc_timestamp_offset = hwstate.timestamp - hwstate.msc_timestamp;
            self.max_skew = 0.0;
        }
        self.prev_msc_timestamp = hwstate.msc_timestamp;

        let new_timestamp = hwstate.msc_timestamp + self.msc_timestamp_offset;
        self.skew = new_timestamp - hwstate.timestamp;
        self.max_skew = self.max_skew.max(self.skew);
        hwstate.timestamp = new_timestamp;
        hwstate.msc_timestamp = 0.0;
    }

    fn change_timestamp_using_fake(&mut self, hwstate: &mut HardwareState) {
        self.fake_timestamp += *self.fake_timestamp_delta.borrow();
        if (self.fake_timestamp - hwstate.timestamp).abs() > self.fake_timestamp_max_divergence {
            self.fake_timestamp = hwstate.timestamp;
            self.max_skew = 0.0;
        }
        self.skew = self.fake_timestamp - hwstate.timestamp;
        self.max_skew = self.max_skew.max(self.skew);
        hwstate.timestamp = self.fake_timestamp;
    }
}

impl Interpreter for TimestampFilterInterpreter {
    fn name(&self) -> &'static str {
        "TimestampFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        if *self.fake_timestamp_delta.borrow() == 0.0 {
            self.change_timestamp_default(hwstate);
        } else {
            self.change_timestamp_using_fake(hwstate);
        }
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        *timeout = self.base.combine_timeout(now, None);
        gestures
            .into_iter()
            .filter_map(|g| self.consume_gesture(g))
            .collect()
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        // Adjust by the largest skew since reset, so the callback isn't
        // ignored for arriving "too early" relative to the rebased clock.
        let (gestures, _) = self.base.handle_timer_next(now + self.max_skew);
        *timeout = self.base.combine_timeout(now, None);
        gestures
            .into_iter()
            .filter_map(|g| self.consume_gesture(g))
            .collect()
    }

    fn consume_gesture(&mut self, mut gesture: Gesture) -> Option<Gesture> {
        gesture.shift_time(self.skew);
        Some(gesture)
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.prev_msc_timestamp = -1.0;
        self.msc_timestamp_offset = -1.0;
        self.fake_timestamp = -1.0;
        self.skew = 0.0;
        self.max_skew = 0.0;
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
    fn rebases_on_msc_timestamp_offset() {
        let mut reg = PropRegistry::new();
        let mut filt = TimestampFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut hs = HardwareState::new(100.0, vec![FingerState::new(1, 0.0, 0.0, 10.0)]);
        hs.msc_timestamp = 5.0;
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        // offset = 100 - 5 = 95; next frame at msc=5.5 -> rebased = 100.5
        let mut hs2 = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 10.0)]);
        hs2.msc_timestamp = 5.5;
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert!((hs2.timestamp - 100.5).abs() < 1e-9);
    }

    #[test]
    fn backward_msc_jump_resets_offset() {
        let mut reg = PropRegistry::new();
        let mut filt = TimestampFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut hs = HardwareState::new(10.0, vec![]);
        hs.msc_timestamp = 5.0;
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);

        let mut hs2 = HardwareState::new(10.1, vec![]);
        hs2.msc_timestamp = 1.0; // went backwards -> rebase
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert!((hs2.timestamp - 10.1).abs() < 1e-9);
    }

    #[test]
    fn fake_timestamp_delta_property_drives_a_synthetic_uniform_timeline() {
        let mut reg = PropRegistry::new();
        let mut filt = TimestampFilterInterpreter::new(&mut reg, Box::new(Sink));
        reg.set("Fake Timestamp Delta", crate::property::PropValue::Double(0.01)).unwrap();
        let mut timeout = None;

        // first frame: -1.0 + 0.01 diverges from hwstate.timestamp(0.0) by more
        // than fake_timestamp_max_divergence, so the fake clock resets to it.
        let mut hs = HardwareState::new(0.0, vec![]);
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!((hs.timestamp - 0.0).abs() < 1e-9);

        let mut hs2 = HardwareState::new(0.0, vec![]);
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert!((hs2.timestamp - 0.01).abs() < 1e-9);
    }
}
