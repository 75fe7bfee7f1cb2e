//! The terminal stage for hybrid mice: a relative-motion pointing device
//! whose top shell also reports multitouch contacts (e.g. a touch-surface
//! mouse), used by the `MULTITOUCH_MOUSE` chain (§6).
//!
//! Grounded on `multitouch_mouse_interpreter.h`/`.cc` and, for the
//! finger-pair scroll/swipe arithmetic it shares with the touchpad
//! classifier, on [`crate::immediate::ImmediateInterpreter`]. Pointer
//! motion comes from `rel_x`/`rel_y` exactly like [`crate::mouse::MouseInterpreter`]
//! (the device's optical sensor, not the fingers); the fingers resting on
//! the shell additionally drive two-finger scroll and three-finger swipe,
//! since they never move the cursor themselves.

use crate::gesture_interpreter::DeviceClass;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Buttons, FingerState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Track {
    x: f64,
    y: f64,
}

pub struct MultitouchMouseInterpreter {
    prev_buttons: Buttons,
    wheel_tick_120ths: BoundCell<i32>,
    prev_track: HashMap<i16, Track>,
    move_min_dist: BoundCell<f64>,
    two_finger_scroll_enable: BoundCell<bool>,
    prev_gesturing_cnt: usize,
}

impl MultitouchMouseInterpreter {
    pub fn new(prop_reg: &mut PropRegistry) -> Self {
        Self {
            prev_buttons: Buttons::empty(),
            wheel_tick_120ths: prop_reg.bind_int("Wheel Tick 120ths", 120),
            prev_track: HashMap::new(),
            move_min_dist: prop_reg.bind_double("Move Min Distance", 0.2),
            two_finger_scroll_enable: prop_reg.bind_bool("Two Finger Scroll Enable", true),
            prev_gesturing_cnt: 0,
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

    /// Two fingers moving together scroll; three fingers swipe. Single
    /// contacts resting on the shell (e.g. to hold the mouse) never move
    /// the cursor — that's `rel_x`/`rel_y`'s job.
    fn classify_fingers(&mut self, hwstate: &HardwareState, now: Stime) -> Vec<Gesture> {
        let fingers: Vec<&FingerState> = hwstate.fingers.iter().filter(|f| !f.is_palm()).collect();
        let n = fingers.len();
        let mut out = Vec::new();
        let move_min_dist = *self.move_min_dist.borrow();
        let two_finger_scroll_enable = *self.two_finger_scroll_enable.borrow();

        let deltas: Vec<(f64, f64)> = fingers
            .iter()
            .map(|f| {
                self.prev_track
                    .get(&f.tracking_id)
                    .map(|t| (f.x - t.x, f.y - t.y))
                    .unwrap_or((0.0, 0.0))
            })
            .collect();

        match n {
            2 if two_finger_scroll_enable => {
                let (d0x, d0y) = deltas[0];
                let (d1x, d1y) = deltas[1];
                let dot = d0x * d1x + d0y * d1y;
                if dot > 0.0 {
                    let dx = (d0x + d1x) / 2.0;
                    let dy = (d0y + d1y) / 2.0;
                    if (dx * dx + dy * dy).sqrt() >= move_min_dist {
                        out.push(Gesture::Scroll { start_time: now, end_time: now, dx, dy, ordinal_dx: dx, ordinal_dy: dy });
                    }
                }
            }
            3 => {
                let dx = deltas.iter().map(|(x, _)| x).sum::<f64>() / 3.0;
                let dy = deltas.iter().map(|(_, y)| y).sum::<f64>() / 3.0;
                if (dx * dx + dy * dy).sqrt() >= move_min_dist {
                    out.push(Gesture::Swipe { start_time: now, end_time: now, dx, dy, ordinal_dx: dx, ordinal_dy: dy });
                }
            }
            _ => {}
        }

        if self.prev_gesturing_cnt == 3 && n < 3 {
            out.push(Gesture::SwipeLift { start_time: now, end_time: now });
        }
        self.prev_gesturing_cnt = n;

        let present: std::collections::HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.prev_track.retain(|id, _| present.contains(id));
        for f in &hwstate.fingers {
            self.prev_track.insert(f.tracking_id, Track { x: f.x, y: f.y });
        }

        out
    }
}

impl Interpreter for MultitouchMouseInterpreter {
    fn name(&self) -> &'static str {
        "MultitouchMouseInterpreter"
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

        out.extend(self.classify_fingers(hwstate, now));

        *timeout = None;
        out
    }

    fn handle_timer(&mut self, _now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        *timeout = None;
        Vec::new()
    }

    fn clear(&mut self) {
        self.prev_buttons = Buttons::empty();
        self.prev_track.clear();
        self.prev_gesturing_cnt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> MultitouchMouseInterpreter {
        let mut reg = PropRegistry::new();
        MultitouchMouseInterpreter::new(&mut reg)
    }

    #[test]
    fn relative_motion_emits_move_independent_of_fingers() {
        let mut m = interp();
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        hs.rel_x = 3.0;
        let mut timeout = None;
        let gestures = m.sync_interpret(&mut hs, &mut timeout);
        assert!(gestures.iter().any(|g| matches!(g, Gesture::Move { dx, .. } if *dx == 3.0)));
    }

    #[test]
    fn two_fingers_moving_together_scroll() {
        let mut m = interp();
        let mut timeout = None;
        let mut hs0 = HardwareState::new(
            0.0,
            vec![FingerState::new(1, 10.0, 10.0, 50.0), FingerState::new(2, 20.0, 10.0, 50.0)],
        );
        m.sync_interpret(&mut hs0, &mut timeout);
        let mut hs1 = HardwareState::new(
            0.01,
            vec![FingerState::new(1, 10.0, 15.0, 50.0), FingerState::new(2, 20.0, 15.0, 50.0)],
        );
        let gestures = m.sync_interpret(&mut hs1, &mut timeout);
        assert!(gestures.iter().any(|g| matches!(g, Gesture::Scroll { .. })));
    }

    #[test]
    fn wheel_tick_maps_to_120ths() {
        let mut m = interp();
        let mut hs = HardwareState::new(0.0, Vec::new());
        hs.rel_wheel = 1.0;
        let mut timeout = None;
        let gestures = m.sync_interpret(&mut hs, &mut timeout);
        assert!(gestures.iter().any(|g| matches!(g, Gesture::MouseWheel { tick_120ths_dy: 120, .. })));
    }

    #[test]
    fn button_transitions_are_reported() {
        let mut m = interp();
        let mut timeout = None;
        let mut hs = HardwareState::new(0.0, Vec::new());
        hs.buttons_down = Buttons::LEFT;
        let gestures = m.sync_interpret(&mut hs, &mut timeout);
        assert!(matches!(gestures[0], Gesture::ButtonsChange { down: Buttons::LEFT, .. }));
    }
}
