//! If the downstream chain has ever emitted button-down but no finger is on
//! the pad, schedules a 1s fallback timer that synthesizes the matching
//! button-up, so a disconnected device never leaves a button stuck down.
//!
//! Grounded on `stuck_button_inhibitor_filter_interpreter.cc`.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::types::{Buttons, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use log::error;

const TIMEOUT_LENGTH: Stime = 1.0;

pub struct StuckButtonInhibitorFilterInterpreter {
    base: FilterBase,
    incoming_button_must_be_up: bool,
    sent_buttons_down: Buttons,
    next_expects_timer: bool,
}

impl StuckButtonInhibitorFilterInterpreter {
    pub fn new(next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            incoming_button_must_be_up: true,
            sent_buttons_down: Buttons::empty(),
            next_expects_timer: false,
        }
    }

}

impl Interpreter for StuckButtonInhibitorFilterInterpreter {
    fn name(&self) -> &'static str {
        "StuckButtonInhibitorFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.incoming_button_must_be_up = hwstate.touch_cnt == 0 && hwstate.buttons_down.is_empty();

        let now = hwstate.timestamp;
        let (gestures, next_timeout) = self.base.sync_interpret_next(now, hwstate);

        self.next_expects_timer = next_timeout.is_some();
        *timeout = match next_timeout {
            Some(dt) => Some(dt),
            None => {
                if self.incoming_button_must_be_up && !self.sent_buttons_down.is_empty() {
                    Some(TIMEOUT_LENGTH)
                } else {
                    None
                }
            }
        };

        gestures.into_iter().filter_map(|g| self.consume_gesture(g)).collect()
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let mut out = Vec::new();
        let next_timeout;
        if self.next_expects_timer {
            let (gestures, nt) = self.base.handle_timer_next(now);
            out.extend(gestures.into_iter().filter_map(|g| self.consume_gesture(g)));
            next_timeout = nt;
        } else if self.sent_buttons_down.is_empty() {
            error!("Bug: got callback, but no gesture to send.");
            return out;
        } else {
            error!("Mouse button seems stuck down. Sending button-up.");
            let down = self.sent_buttons_down;
            self.sent_buttons_down = Buttons::empty();
            out.push(Gesture::ButtonsChange {
                start_time: now,
                end_time: now,
                down: Buttons::empty(),
                up: down,
                is_tap: false,
            });
            next_timeout = None;
        }

        self.next_expects_timer = next_timeout.is_some();
        *timeout = match next_timeout {
            Some(dt) => Some(dt),
            None => {
                if self.incoming_button_must_be_up && !self.sent_buttons_down.is_empty() {
                    Some(TIMEOUT_LENGTH)
                } else {
                    None
                }
            }
        };
        out
    }

    fn consume_gesture(&mut self, gesture: Gesture) -> Option<Gesture> {
        if let Gesture::ButtonsChange { down, up, .. } = &gesture {
            let mut down = *down;
            let mut up = *up;
            if self.sent_buttons_down.intersects(down) {
                error!("result is sending buttons down that are already down");
                down &= !self.sent_buttons_down;
            }
            self.sent_buttons_down |= down;
            if (!self.sent_buttons_down).intersects(up) {
                error!("result is sending buttons up for buttons we didn't send down");
                up &= self.sent_buttons_down;
            }
            self.sent_buttons_down &= !up;
            if down.is_empty() && up.is_empty() {
                return None;
            }
            if let Gesture::ButtonsChange { start_time, end_time, is_tap, .. } = gesture {
                return Some(Gesture::ButtonsChange { start_time, end_time, down, up, is_tap });
            }
        }
        Some(gesture)
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.incoming_button_must_be_up = true;
        self.sent_buttons_down = Buttons::empty();
        self.next_expects_timer = false;
    }
}
