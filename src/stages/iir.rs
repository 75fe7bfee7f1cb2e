//! First-order IIR low-pass on finger position to reduce jitter; disengages
//! for one frame following a large jump so fast moves remain responsive.
//!
//! Grounded on `iir_filter_interpreter.h`/`.cc`: `y[n] = alpha * x[n] + (1 -
//! alpha) * y[n-1]`, applied independently to x and y, with the filter
//! state reset (rather than blended) whenever the raw jump between
//! consecutive samples exceeds `Iir Jump Threshold` — legacy v1 stack only.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct IirState {
    raw_x: f64,
    raw_y: f64,
    filtered_x: f64,
    filtered_y: f64,
}

pub struct IirFilterInterpreter {
    base: FilterBase,
    states: HashMap<i16, IirState>,
    alpha: BoundCell<f64>,
    jump_threshold: BoundCell<f64>,
}

impl IirFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            states: HashMap::new(),
            alpha: prop_reg.bind_double("Iir Alpha", 0.35),
            jump_threshold: prop_reg.bind_double("Iir Jump Threshold", 15.0),
        }
    }

    fn update(&mut self, hwstate: &mut HardwareState) {
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.states.retain(|id, _| present.contains(id));
        let alpha = *self.alpha.borrow();
        let jump_threshold = *self.jump_threshold.borrow();

        for finger in &mut hwstate.fingers {
            match self.states.get_mut(&finger.tracking_id) {
                None => {
                    self.states.insert(
                        finger.tracking_id,
                        IirState {
                            raw_x: finger.x,
                            raw_y: finger.y,
                            filtered_x: finger.x,
                            filtered_y: finger.y,
                        },
                    );
                }
                Some(state) => {
                    let dx = finger.x - state.raw_x;
                    let dy = finger.y - state.raw_y;
                    let jumped = (dx * dx + dy * dy).sqrt() > jump_threshold;
                    state.raw_x = finger.x;
                    state.raw_y = finger.y;
                    if jumped {
                        state.filtered_x = finger.x;
                        state.filtered_y = finger.y;
                    } else {
                        state.filtered_x = alpha * finger.x + (1.0 - alpha) * state.filtered_x;
                        state.filtered_y = alpha * finger.y + (1.0 - alpha) * state.filtered_y;
                        finger.x = state.filtered_x;
                        finger.y = state.filtered_y;
                    }
                }
            }
        }
    }
}

impl Interpreter for IirFilterInterpreter {
    fn name(&self) -> &'static str {
        "IirFilterInterpreter"
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
        self.states.clear();
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
    fn smooths_a_small_wobble() {
        let mut reg = PropRegistry::new();
        let mut filt = IirFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        let mut hs0 = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs0, &mut timeout);
        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 1.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs1, &mut timeout);
        assert!(hs1.fingers[0].x < 1.0 && hs1.fingers[0].x > 0.0);
    }

    #[test]
    fn large_jump_bypasses_smoothing() {
        let mut reg = PropRegistry::new();
        let mut filt = IirFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        let mut hs0 = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs0, &mut timeout);
        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 100.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs1, &mut timeout);
        assert_eq!(hs1.fingers[0].x, 100.0);
    }
}
