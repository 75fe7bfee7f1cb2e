//! Accumulates the fractional pixel remainder `Accel`/`Scaling` leave behind
//! on `Move`/`Scroll` gestures, so a host that only understands integer
//! relative deltas doesn't lose slow, sub-pixel-per-frame motion entirely.
//!
//! Grounded on `integral_gesture_filter_interpreter.h` (header only; no
//! `.cc` in the retrieval pack). Used only in the MOUSE/POINTING_STICK and
//! MULTITOUCH_MOUSE chains (§6) — touchpad gestures are left in floating
//! point since their consumer (`ImmediateInterpreter`'s own callers) is
//! expected to accumulate remainders itself if it needs to.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::PropRegistry;
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};

pub struct IntegralGestureFilterInterpreter {
    base: FilterBase,
    remainder_x: f64,
    remainder_y: f64,
}

impl IntegralGestureFilterInterpreter {
    pub fn new(_prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self { base: FilterBase::new(next), remainder_x: 0.0, remainder_y: 0.0 }
    }

    fn quantize(&mut self, dx: f64, dy: f64) -> (f64, f64) {
        let total_x = dx + self.remainder_x;
        let total_y = dy + self.remainder_y;
        let out_x = total_x.trunc();
        let out_y = total_y.trunc();
        self.remainder_x = total_x - out_x;
        self.remainder_y = total_y - out_y;
        (out_x, out_y)
    }

    fn consume_gesture_impl(&mut self, gesture: Gesture) -> Gesture {
        match gesture {
            Gesture::Move { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy } => {
                let (qx, qy) = self.quantize(dx, dy);
                Gesture::Move { start_time, end_time, dx: qx, dy: qy, ordinal_dx, ordinal_dy }
            }
            Gesture::Scroll { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy } => {
                let (qx, qy) = self.quantize(dx, dy);
                Gesture::Scroll { start_time, end_time, dx: qx, dy: qy, ordinal_dx, ordinal_dy }
            }
            other => other,
        }
    }
}

impl Interpreter for IntegralGestureFilterInterpreter {
    fn name(&self) -> &'static str {
        "IntegralGestureFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        let out = gestures.into_iter().map(|g| self.consume_gesture_impl(g)).collect();
        *timeout = self.base.combine_timeout(now, None);
        out
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let (gestures, _) = self.base.handle_timer_next(now);
        let out = gestures.into_iter().map(|g| self.consume_gesture_impl(g)).collect();
        *timeout = self.base.combine_timeout(now, None);
        out
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.remainder_x = 0.0;
        self.remainder_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FingerState;

    struct Source {
        dx: f64,
        dy: f64,
    }
    impl Interpreter for Source {
        fn name(&self) -> &'static str {
            "Source"
        }
        fn initialize(&mut self, _: &HardwareProperties, _: &mut Metrics, _: &MetricsProperties) {}
        fn sync_interpret(&mut self, _: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            vec![Gesture::Move { start_time: 0.0, end_time: 0.01, dx: self.dx, dy: self.dy, ordinal_dx: self.dx, ordinal_dy: self.dy }]
        }
        fn handle_timer(&mut self, _: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
    }

    #[test]
    fn sub_pixel_motion_accumulates_into_a_later_integer_step() {
        let mut reg = PropRegistry::new();
        let mut filt =
            IntegralGestureFilterInterpreter::new(&mut reg, Box::new(Source { dx: 0.4, dy: 0.0 }));
        let mut timeout = None;
        let mut total = 0.0;
        for i in 0..5 {
            let mut hs = HardwareState::new(i as f64 * 0.01, Vec::new());
            let gestures = filt.sync_interpret(&mut hs, &mut timeout);
            if let Gesture::Move { dx, .. } = gestures[0] {
                total += dx;
                assert_eq!(dx.fract(), 0.0);
            }
        }
        assert!((total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_gestures_pass_through_untouched() {
        let mut reg = PropRegistry::new();
        struct PassThrough;
        impl Interpreter for PassThrough {
            fn name(&self) -> &'static str {
                "PassThrough"
            }
            fn initialize(&mut self, _: &HardwareProperties, _: &mut Metrics, _: &MetricsProperties) {}
            fn sync_interpret(&mut self, _: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
                *timeout = None;
                vec![Gesture::ContactInitiated { start_time: 0.0, end_time: 0.0 }]
            }
            fn handle_timer(&mut self, _: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
                *timeout = None;
                Vec::new()
            }
        }
        let mut filt = IntegralGestureFilterInterpreter::new(&mut reg, Box::new(PassThrough));
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        let gestures = filt.sync_interpret(&mut hs, &mut timeout);
        assert!(matches!(gestures[0], Gesture::ContactInitiated { .. }));
    }
}
