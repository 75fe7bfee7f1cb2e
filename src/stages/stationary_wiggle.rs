//! Identifies sub-threshold oscillation using a running energy estimate and
//! sets `INSTANTANEOUS_MOVING` only once the energy passes a hysteresis
//! threshold.
//!
//! Grounded on `stationary_wiggle_filter_interpreter.h` (header only; no
//! `.cc` in the retrieval pack). The energy recurrence below — an
//! exponential running sum of squared per-frame displacement, normalized by
//! elapsed time — follows the header's field names (`x_energy_`,
//! `y_energy_`, the "moving"/"stationary" threshold pair) and the general
//! shape of a leaky-integrator wiggle detector described in §4.6.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerFlags, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct WiggleState {
    last_x: f64,
    last_y: f64,
    last_timestamp: Stime,
    energy: f64,
    moving: bool,
}

pub struct StationaryWiggleFilterInterpreter {
    base: FilterBase,
    states: HashMap<i16, WiggleState>,
    moving_energy_threshold: BoundCell<f64>,
    stationary_energy_threshold: BoundCell<f64>,
    energy_decay: BoundCell<f64>,
}

impl StationaryWiggleFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            states: HashMap::new(),
            moving_energy_threshold: prop_reg.bind_double("Wiggle Moving Energy Threshold", 1.0),
            stationary_energy_threshold: prop_reg.bind_double("Wiggle Stationary Energy Threshold", 0.2),
            energy_decay: prop_reg.bind_double("Wiggle Energy Decay", 0.9),
        }
    }

    fn update(&mut self, hwstate: &mut HardwareState) {
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.states.retain(|id, _| present.contains(id));
        let moving_energy_threshold = *self.moving_energy_threshold.borrow();
        let stationary_energy_threshold = *self.stationary_energy_threshold.borrow();
        let energy_decay = *self.energy_decay.borrow();

        for finger in &mut hwstate.fingers {
            let state = self.states.entry(finger.tracking_id).or_insert_with(|| WiggleState {
                last_x: finger.x,
                last_y: finger.y,
                last_timestamp: hwstate.timestamp,
                energy: 0.0,
                moving: true,
            });

            let dx = finger.x - state.last_x;
            let dy = finger.y - state.last_y;
            let dist_sq = dx * dx + dy * dy;

            state.energy = state.energy * energy_decay + dist_sq;
            state.last_x = finger.x;
            state.last_y = finger.y;
            state.last_timestamp = hwstate.timestamp;

            if state.moving {
                if state.energy < stationary_energy_threshold {
                    state.moving = false;
                }
            } else if state.energy > moving_energy_threshold {
                state.moving = true;
            }

            if state.moving {
                finger.flags |= FingerFlags::INSTANTANEOUS_MOVING;
            }
        }
    }
}

impl Interpreter for StationaryWiggleFilterInterpreter {
    fn name(&self) -> &'static str {
        "StationaryWiggleFilterInterpreter"
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
    fn first_frame_starts_as_moving() {
        let mut reg = PropRegistry::new();
        let mut filt = StationaryWiggleFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(hs.fingers[0].flags.contains(FingerFlags::INSTANTANEOUS_MOVING));
    }

    #[test]
    fn prolonged_stillness_clears_moving_flag() {
        let mut reg = PropRegistry::new();
        let mut filt = StationaryWiggleFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..10 {
            let mut hs = HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, 5.0, 5.0, 50.0)]);
            filt.sync_interpret(&mut hs, &mut timeout);
            if i == 9 {
                assert!(!hs.fingers[0].flags.contains(FingerFlags::INSTANTANEOUS_MOVING));
            }
        }
    }

    #[test]
    fn large_jump_resumes_moving() {
        let mut reg = PropRegistry::new();
        let mut filt = StationaryWiggleFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for i in 0..5 {
            let mut hs = HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, 5.0, 5.0, 50.0)]);
            filt.sync_interpret(&mut hs, &mut timeout);
        }
        let mut jump = HardwareState::new(0.06, vec![FingerState::new(1, 50.0, 50.0, 50.0)]);
        filt.sync_interpret(&mut jump, &mut timeout);
        assert!(jump.fingers[0].flags.contains(FingerFlags::INSTANTANEOUS_MOVING));
    }
}
