//! The terminal stage for plain relative-motion devices: mice and pointing
//! sticks. No tap-to-click machine and no finger classification — a mouse
//! frame carries at most a relative delta, a wheel count, and a button mask.
//!
//! Grounded on `mouse_interpreter.h`/`.cc`. Runs below [`crate::stages::scaling`]
//! in the MOUSE/POINTING_STICK chain (§6), so `hwstate.rel_x`/`rel_y` have
//! already been converted from CPI counts to millimetres by the time they
//! reach here.

use crate::gesture_interpreter::DeviceClass;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Buttons, Gesture, HardwareProperties, HardwareState, Stime, Timeout};

pub struct MouseInterpreter {
    device_class: DeviceClass,
    prev_buttons: Buttons,
    wheel_tick_120ths: BoundCell<i32>,
}

impl MouseInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, device_class: DeviceClass) -> Self {
        Self {
            device_class,
            prev_buttons: Buttons::empty(),
            wheel_tick_120ths: prop_reg.bind_int("Wheel Tick 120ths", 120),
        }
    }

    fn wheel_gesture(&self, hwstate: &HardwareState, now: Stime) -> Option<Gesture> {
        if hwstate.rel_wheel_hi_res != 0.0 {
            return Some(Gesture::MouseWheel {
                start_time: now,
                end_time: now,
                tick_120ths_dx: hwstate.rel_hwheel.round() as i32,
                tick_120ths_dy: hwstate.rel_wheel_hi_res.round() as i32,
            });
        }
        if hwstate.rel_wheel != 0.0 {
            let wheel_tick_120ths = *self.wheel_tick_120ths.borrow();
            let dy = (hwstate.rel_wheel.signum() * wheel_tick_120ths as f64) as i32;
            let dx = (hwstate.rel_hwheel.signum() * wheel_tick_120ths as f64) as i32;
            return Some(Gesture::MouseWheel { start_time: now, end_time: now, tick_120ths_dx: dx, tick_120ths_dy: dy });
        }
        None
    }
}

impl Interpreter for MouseInterpreter {
    fn name(&self) -> &'static str {
        "MouseInterpreter"
    }

    fn initialize(&mut self, _hwprops: &HardwareProperties, _metrics: &mut Metrics, _mprops: &MetricsProperties) {}

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let now = hwstate.timestamp;
        let mut out = Vec::new();

        let down = hwstate.buttons_down & !self.prev_buttons;
        let up = self.prev_buttons & !hwstate.buttons_down;
        if !down.is_empty() || !up.is_empty() {
            out.push(Gesture::ButtonsChange { start_time: now, end_time: now, down, up, is_tap: false });
        }
        self.prev_buttons = hwstate.buttons_down;

        if let Some(g) = self.wheel_gesture(hwstate, now) {
            out.push(g);
        }

        if hwstate.rel_x != 0.0 || hwstate.rel_y != 0.0 {
            out.push(Gesture::Move {
                start_time: now,
                end_time: now,
                dx: hwstate.rel_x,
                dy: hwstate.rel_y,
                ordinal_dx: hwstate.rel_x,
                ordinal_dy: hwstate.rel_y,
            });
        }

        *timeout = None;
        out
    }

    fn handle_timer(&mut self, _now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        *timeout = None;
        Vec::new()
    }

    fn clear(&mut self) {
        self.prev_buttons = Buttons::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> MouseInterpreter {
        let mut reg = PropRegistry::new();
        MouseInterpreter::new(&mut reg, DeviceClass::Mouse)
    }

    #[test]
    fn relative_motion_emits_move() {
        let mut m = interp();
        let mut hs = HardwareState::new(0.0, Vec::new());
        hs.rel_x = 2.0;
        hs.rel_y = -1.0;
        let mut timeout = None;
        let gestures = m.sync_interpret(&mut hs, &mut timeout);
        assert_eq!(gestures.len(), 1);
        assert!(matches!(gestures[0], Gesture::Move { dx, dy, .. } if dx == 2.0 && dy == -1.0));
    }

    #[test]
    fn low_res_wheel_tick_maps_to_120ths_with_natural_sign() {
        let mut m = interp();
        let mut hs = HardwareState::new(0.0, Vec::new());
        hs.rel_wheel = -1.0;
        let mut timeout = None;
        let gestures = m.sync_interpret(&mut hs, &mut timeout);
        assert_eq!(gestures.len(), 1);
        assert!(matches!(gestures[0], Gesture::MouseWheel { tick_120ths_dy: -120, .. }));
    }

    #[test]
    fn button_press_and_release_are_reported_as_transitions() {
        let mut m = interp();
        let mut timeout = None;
        let mut hs0 = HardwareState::new(0.0, Vec::new());
        hs0.buttons_down = Buttons::LEFT;
        let g0 = m.sync_interpret(&mut hs0, &mut timeout);
        assert!(matches!(g0[0], Gesture::ButtonsChange { down: Buttons::LEFT, .. }));

        let mut hs1 = HardwareState::new(0.01, Vec::new());
        let g1 = m.sync_interpret(&mut hs1, &mut timeout);
        assert!(matches!(g1[0], Gesture::ButtonsChange { up: Buttons::LEFT, .. }));
    }
}
