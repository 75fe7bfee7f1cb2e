//! Speed-dependent gain on `Move`/`Scroll`/`Fling` deltas: slow motion is
//! passed through close to 1:1, fast motion is multiplied up so a quick
//! flick covers more screen than a slow drag of the same physical distance.
//!
//! Not grounded in `original_source/` — no `accel_filter_interpreter.*` is
//! present in the retrieval pack (only the one-line contract in the design
//! doc: "speed-dependent gain on Move/Scroll/Fling deltas"). The curve below
//! (linear ramp between a low-speed and high-speed gain, clamped at both
//! ends) is a plausible reconstruction of that contract, not a transcription
//! of upstream code; see DESIGN.md.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};

pub struct AccelFilterInterpreter {
    base: FilterBase,
    enabled: BoundCell<bool>,
    min_speed: BoundCell<f64>,
    max_speed: BoundCell<f64>,
    min_gain: BoundCell<f64>,
    max_gain: BoundCell<f64>,
}

impl AccelFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            enabled: prop_reg.bind_bool("Pointer Acceleration Enable", true),
            min_speed: prop_reg.bind_double("Pointer Accel Min Speed", 10.0),
            max_speed: prop_reg.bind_double("Pointer Accel Max Speed", 1000.0),
            min_gain: prop_reg.bind_double("Pointer Accel Min Gain", 1.0),
            max_gain: prop_reg.bind_double("Pointer Accel Max Gain", 3.0),
        }
    }

    fn gain_for_speed(&self, speed_mm_s: f64) -> f64 {
        let (min_speed, max_speed) = (*self.min_speed.borrow(), *self.max_speed.borrow());
        let (min_gain, max_gain) = (*self.min_gain.borrow(), *self.max_gain.borrow());
        if !*self.enabled.borrow() || speed_mm_s <= min_speed {
            return min_gain;
        }
        if speed_mm_s >= max_speed {
            return max_gain;
        }
        let t = (speed_mm_s - min_speed) / (max_speed - min_speed);
        min_gain + t * (max_gain - min_gain)
    }

    fn scale(&self, dx: f64, dy: f64, dt: Stime) -> (f64, f64) {
        if dt <= 0.0 {
            return (dx, dy);
        }
        let speed = (dx * dx + dy * dy).sqrt() / dt;
        let gain = self.gain_for_speed(speed);
        (dx * gain, dy * gain)
    }

    fn apply(&self, gesture: Gesture) -> Gesture {
        match gesture {
            Gesture::Move { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy } => {
                let (sdx, sdy) = self.scale(dx, dy, end_time - start_time);
                Gesture::Move { start_time, end_time, dx: sdx, dy: sdy, ordinal_dx, ordinal_dy }
            }
            Gesture::Scroll { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy } => {
                let (sdx, sdy) = self.scale(dx, dy, end_time - start_time);
                Gesture::Scroll { start_time, end_time, dx: sdx, dy: sdy, ordinal_dx, ordinal_dy }
            }
            Gesture::Fling { start_time, end_time, vx, vy, fling_state } => {
                let gain = self.gain_for_speed((vx * vx + vy * vy).sqrt());
                Gesture::Fling { start_time, end_time, vx: vx * gain, vy: vy * gain, fling_state }
            }
            other => other,
        }
    }
}

impl Interpreter for AccelFilterInterpreter {
    fn name(&self) -> &'static str {
        "AccelFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        *timeout = self.base.combine_timeout(now, None);
        gestures.into_iter().map(|g| self.apply(g)).collect()
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let (gestures, _) = self.base.handle_timer_next(now);
        *timeout = self.base.combine_timeout(now, None);
        gestures.into_iter().map(|g| self.apply(g)).collect()
    }

    fn clear(&mut self) {
        self.base.clear_next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink {
        gesture: Option<Gesture>,
    }
    impl Interpreter for Sink {
        fn name(&self) -> &'static str {
            "Sink"
        }
        fn initialize(&mut self, _: &HardwareProperties, _: &mut Metrics, _: &MetricsProperties) {}
        fn sync_interpret(&mut self, _: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            self.gesture.take().into_iter().collect()
        }
        fn handle_timer(&mut self, _: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
    }

    #[test]
    fn slow_move_is_passed_through_near_unity_gain() {
        let mut reg = PropRegistry::new();
        let mut filt = AccelFilterInterpreter::new(
            &mut reg,
            Box::new(Sink {
                gesture: Some(Gesture::Move { start_time: 0.0, end_time: 0.1, dx: 0.1, dy: 0.0, ordinal_dx: 0.1, ordinal_dy: 0.0 }),
            }),
        );
        let mut hs = HardwareState::new(0.0, vec![]);
        let mut timeout = None;
        let gestures = filt.sync_interpret(&mut hs, &mut timeout);
        match gestures[0] {
            Gesture::Move { dx, .. } => assert!((dx - 0.1).abs() < 1e-6),
            _ => panic!("expected Move"),
        }
    }

    #[test]
    fn fast_move_gets_amplified() {
        let mut reg = PropRegistry::new();
        let mut filt = AccelFilterInterpreter::new(
            &mut reg,
            Box::new(Sink {
                gesture: Some(Gesture::Move { start_time: 0.0, end_time: 0.01, dx: 20.0, dy: 0.0, ordinal_dx: 20.0, ordinal_dy: 0.0 }),
            }),
        );
        let mut hs = HardwareState::new(0.0, vec![]);
        let mut timeout = None;
        let gestures = filt.sync_interpret(&mut hs, &mut timeout);
        match gestures[0] {
            Gesture::Move { dx, .. } => assert!(dx > 20.0),
            _ => panic!("expected Move"),
        }
    }
}
