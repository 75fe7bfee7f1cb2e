//! When new fingers touch down during an active fling, inject
//! `Fling(TapDown)` to halt it; extend the deadline if several fingers
//! arrive at once (looks like the start of a scroll).
//!
//! Grounded on `fling_stop_filter_interpreter.cc`.

use crate::filter_base::FilterBase;
use crate::gesture_interpreter::DeviceClass;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FlingState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashSet;

pub struct FlingStopFilterInterpreter {
    base: FilterBase,
    already_extended: bool,
    fingers_present_for_last_fling: HashSet<i16>,
    fingers_of_last_hwstate: HashSet<i16>,
    prev_touch_cnt: usize,
    prev_timestamp: Stime,
    prev_gesture_is_fling_or_lift: bool,
    fling_stop_already_sent: bool,
    fling_stop_deadline: Timeout,
    devclass: DeviceClass,
    fling_stop_timeout: BoundCell<f64>,
    fling_stop_extra_delay: BoundCell<f64>,
}

impl FlingStopFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>, devclass: DeviceClass) -> Self {
        Self {
            base: FilterBase::new(next),
            already_extended: false,
            fingers_present_for_last_fling: HashSet::new(),
            fingers_of_last_hwstate: HashSet::new(),
            prev_touch_cnt: 0,
            prev_timestamp: 0.0,
            prev_gesture_is_fling_or_lift: false,
            fling_stop_already_sent: false,
            fling_stop_deadline: None,
            devclass,
            fling_stop_timeout: prop_reg.bind_double("Fling Stop Timeout", 0.03),
            fling_stop_extra_delay: prop_reg.bind_double("Fling Stop Extra Delay", 0.055),
        }
    }

    fn needs_extra_time(&self, hwstate: &HardwareState) -> bool {
        let num_new = hwstate
            .fingers
            .iter()
            .filter(|f| !self.fingers_present_for_last_fling.contains(&f.tracking_id))
            .count();
        num_new >= 2
    }

    fn update_fling_stop_deadline(&mut self, hwstate: &HardwareState) {
        let fling_stop_timeout = *self.fling_stop_timeout.borrow();
        if fling_stop_timeout <= 0.0 {
            return;
        }
        let now = hwstate.timestamp;
        let finger_added = hwstate.touch_cnt > self.prev_touch_cnt;

        if finger_added && self.fling_stop_deadline.is_none() {
            self.fling_stop_deadline = Some(now + fling_stop_timeout);
            return;
        }
        self.prev_timestamp = now;
        self.prev_touch_cnt = hwstate.touch_cnt;
    }

    fn fling_stop_needed(&self, gesture: &Gesture, same_type_as_prev: bool) -> bool {
        if self.fling_stop_already_sent || same_type_as_prev {
            return false;
        }
        if self.devclass == DeviceClass::MultitouchMouse && matches!(gesture, Gesture::Move { .. }) {
            return false;
        }
        !matches!(
            gesture,
            Gesture::Fling { .. } | Gesture::SwipeLift { .. } | Gesture::FourFingerSwipeLift { .. }
        )
    }

    fn tap_down(time: Stime) -> Gesture {
        Gesture::Fling {
            start_time: time,
            end_time: time,
            vx: 0.0,
            vy: 0.0,
            fling_state: FlingState::TapDown,
        }
    }
}

impl Interpreter for FlingStopFilterInterpreter {
    fn name(&self) -> &'static str {
        "FlingStopFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.fingers_of_last_hwstate = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.update_fling_stop_deadline(hwstate);

        let mut out = Vec::new();
        if let Some(deadline) = self.fling_stop_deadline {
            if !self.already_extended && self.needs_extra_time(hwstate) {
                self.fling_stop_deadline = Some(deadline + *self.fling_stop_extra_delay.borrow());
                self.already_extended = true;
            }
            if let Some(deadline) = self.fling_stop_deadline {
                if hwstate.timestamp > deadline {
                    out.push(Self::tap_down(hwstate.timestamp));
                    self.fling_stop_already_sent = true;
                    self.fling_stop_deadline = None;
                }
            }
        }

        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        for g in gestures {
            out.extend(self.consume_gesture_impl(g));
        }
        *timeout = self.base.combine_timeout(now, self.fling_stop_deadline);
        out
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let mut out = Vec::new();
        if self.base.should_call_next_timer(now) {
            let (gestures, _) = self.base.handle_timer_next(now);
            for g in gestures {
                out.extend(self.consume_gesture_impl(g));
            }
        } else if let Some(deadline) = self.fling_stop_deadline {
            if deadline <= now {
                self.fling_stop_deadline = None;
                out.push(Self::tap_down(now));
                self.fling_stop_already_sent = true;
            }
        }
        *timeout = self.base.combine_timeout(now, self.fling_stop_deadline);
        out
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.already_extended = false;
        self.fingers_present_for_last_fling.clear();
        self.fingers_of_last_hwstate.clear();
        self.prev_touch_cnt = 0;
        self.fling_stop_deadline = None;
        self.fling_stop_already_sent = false;
    }
}

impl FlingStopFilterInterpreter {
    fn consume_gesture_impl(&mut self, gesture: Gesture) -> Vec<Gesture> {
        let mut out = Vec::new();
        if matches!(gesture, Gesture::Fling { .. }) {
            self.fingers_present_for_last_fling = self.fingers_of_last_hwstate.clone();
            self.already_extended = false;
        }

        let same_type_as_prev = self.prev_gesture_is_fling_or_lift == matches!(gesture, Gesture::Fling { .. });
        if self.fling_stop_needed(&gesture, same_type_as_prev) {
            out.push(Self::tap_down(gesture.start_time()));
        }
        self.prev_gesture_is_fling_or_lift = matches!(gesture, Gesture::Fling { .. });
        out.push(gesture);
        self.fling_stop_deadline = None;
        self.fling_stop_already_sent = false;
        out
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
    fn schedules_deadline_on_new_finger() {
        let mut reg = PropRegistry::new();
        let mut filt = FlingStopFilterInterpreter::new(&mut reg, Box::new(Sink), DeviceClass::Touchpad);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(timeout.is_some());
    }

    #[test]
    fn emits_tap_down_after_timeout_elapses() {
        let mut reg = PropRegistry::new();
        let mut filt = FlingStopFilterInterpreter::new(&mut reg, Box::new(Sink), DeviceClass::Touchpad);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);

        let mut hs2 = HardwareState::new(0.05, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let gestures = filt.sync_interpret(&mut hs2, &mut timeout);
        assert_eq!(gestures.len(), 1);
        assert!(matches!(gestures[0], Gesture::Fling { fling_state: FlingState::TapDown, .. }));
    }
}
