//! Legacy (v1 stack) filter that detects a firmware glitch where a finger's
//! reported position jumps an implausible distance in a single frame, and
//! marks the frame so downstream motion stages don't derive a gesture delta
//! from it.
//!
//! Grounded on `sensor_jump_filter_interpreter.h` (header only). The header
//! names a per-finger "recent max speed" baseline against which a new
//! frame's implied speed is compared; this port keeps a rolling max speed
//! per tracking id and flags `WARP_X|WARP_Y` (rather than dropping the
//! frame, since the invariant design never drops frames outright) whenever
//! the new speed exceeds that baseline by `Sensor Jump Speed Ratio`.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerFlags, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct JumpState {
    x: f64,
    y: f64,
    timestamp: Stime,
    max_speed: f64,
}

pub struct SensorJumpFilterInterpreter {
    base: FilterBase,
    states: HashMap<i16, JumpState>,
    speed_ratio: BoundCell<f64>,
    min_speed: BoundCell<f64>,
}

impl SensorJumpFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            states: HashMap::new(),
            speed_ratio: prop_reg.bind_double("Sensor Jump Speed Ratio", 4.0),
            min_speed: prop_reg.bind_double("Sensor Jump Minimum Speed", 200.0),
        }
    }

    fn update(&mut self, hwstate: &mut HardwareState) {
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.states.retain(|id, _| present.contains(id));
        let speed_ratio = *self.speed_ratio.borrow();
        let min_speed = *self.min_speed.borrow();

        for finger in &mut hwstate.fingers {
            match self.states.get_mut(&finger.tracking_id) {
                None => {
                    self.states.insert(
                        finger.tracking_id,
                        JumpState {
                            x: finger.x,
                            y: finger.y,
                            timestamp: hwstate.timestamp,
                            max_speed: 0.0,
                        },
                    );
                }
                Some(state) => {
                    let dt = (hwstate.timestamp - state.timestamp).max(1e-6);
                    let dx = finger.x - state.x;
                    let dy = finger.y - state.y;
                    let speed = (dx * dx + dy * dy).sqrt() / dt;

                    if speed > min_speed && state.max_speed > 0.0 && speed > state.max_speed * speed_ratio {
                        finger.flags |= FingerFlags::WARP_X | FingerFlags::WARP_Y;
                    } else {
                        state.max_speed = state.max_speed.max(speed);
                    }
                    state.x = finger.x;
                    state.y = finger.y;
                    state.timestamp = hwstate.timestamp;
                }
            }
        }
    }
}

impl Interpreter for SensorJumpFilterInterpreter {
    fn name(&self) -> &'static str {
        "SensorJumpFilterInterpreter"
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
    fn steady_motion_is_not_flagged() {
        let mut reg = PropRegistry::new();
        let mut filt = SensorJumpFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..5 {
            let mut hs =
                HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, i as f64, 0.0, 50.0)]);
            filt.sync_interpret(&mut hs, &mut timeout);
            assert!(!hs.fingers[0].flags.contains(FingerFlags::WARP_X));
        }
    }

    #[test]
    fn sudden_huge_jump_is_flagged() {
        let mut reg = PropRegistry::new();
        let mut filt = SensorJumpFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..5 {
            let mut hs =
                HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, i as f64, 0.0, 50.0)]);
            filt.sync_interpret(&mut hs, &mut timeout);
        }
        let mut jump = HardwareState::new(0.06, vec![FingerState::new(1, 900.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut jump, &mut timeout);
        assert!(jump.fingers[0].flags.contains(FingerFlags::WARP_X));
        assert!(jump.fingers[0].flags.contains(FingerFlags::WARP_Y));
    }
}
