//! Suppresses the small positional "wiggle" fingers exhibit at the instant
//! of a physical button-pad click, so a click doesn't also register as a
//! tiny move or scroll.
//!
//! Grounded on `click_wiggle_filter_interpreter.h`/`.cc`. While any button
//! is down, or for `Click Wiggle Timeout` seconds after one was released,
//! each finger's reported position is pinned to where it was when the
//! button event started, and `WARP_X|WARP_Y` is set so downstream motion
//! stages treat the frame as non-motion. A finger that moves further than
//! `Click Wiggle Max Distance` during that window exits wiggle-suppression
//! early, since that's deliberate motion, not click recoil.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Buttons, FingerFlags, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

pub struct ClickWiggleFilterInterpreter {
    base: FilterBase,
    is_button_pad: bool,
    enabled: BoundCell<bool>,
    max_distance: BoundCell<f64>,
    timeout_after_release: BoundCell<f64>,

    anchors: HashMap<i16, (f64, f64)>,
    last_buttons_down: Buttons,
    release_deadline: Timeout,
}

impl ClickWiggleFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            is_button_pad: false,
            enabled: prop_reg.bind_bool("Click Wiggle Enable", true),
            max_distance: prop_reg.bind_double("Click Wiggle Max Distance", 10.0),
            timeout_after_release: prop_reg.bind_double("Click Wiggle Timeout", 0.05),
            anchors: HashMap::new(),
            last_buttons_down: Buttons::empty(),
            release_deadline: None,
        }
    }

    fn in_wiggle_window(&self, hwstate: &HardwareState) -> bool {
        if !hwstate.buttons_down.is_empty() {
            return true;
        }
        match self.release_deadline {
            Some(deadline) => hwstate.timestamp <= deadline,
            None => false,
        }
    }

    fn update(&mut self, hwstate: &mut HardwareState) {
        if !*self.enabled.borrow() || !self.is_button_pad {
            return;
        }

        let button_just_went_down = self.last_buttons_down.is_empty() && !hwstate.buttons_down.is_empty();
        let button_just_released = !self.last_buttons_down.is_empty() && hwstate.buttons_down.is_empty();
        if button_just_released {
            self.release_deadline = Some(hwstate.timestamp + *self.timeout_after_release.borrow());
        }
        self.last_buttons_down = hwstate.buttons_down;

        let active = self.in_wiggle_window(hwstate);
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.anchors.retain(|id, _| present.contains(id));

        if !active {
            return;
        }

        for finger in &mut hwstate.fingers {
            let anchor = *self
                .anchors
                .entry(finger.tracking_id)
                .or_insert((finger.x, finger.y));
            if button_just_went_down {
                self.anchors.insert(finger.tracking_id, (finger.x, finger.y));
                continue;
            }
            let dx = finger.x - anchor.0;
            let dy = finger.y - anchor.1;
            if (dx * dx + dy * dy).sqrt() <= *self.max_distance.borrow() {
                finger.x = anchor.0;
                finger.y = anchor.1;
                finger.flags |= FingerFlags::WARP_X | FingerFlags::WARP_Y;
            }
        }
    }
}

impl Interpreter for ClickWiggleFilterInterpreter {
    fn name(&self) -> &'static str {
        "ClickWiggleFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.is_button_pad = hwprops.is_button_pad;
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
        self.anchors.clear();
        self.last_buttons_down = Buttons::empty();
        self.release_deadline = None;
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

    fn button_pad_filter() -> ClickWiggleFilterInterpreter {
        let mut reg = PropRegistry::new();
        let mut filt = ClickWiggleFilterInterpreter::new(&mut reg, Box::new(Sink));
        filt.initialize(
            &HardwareProperties { is_button_pad: true, ..HardwareProperties::default() },
            &mut Metrics::new(10),
            &MetricsProperties,
        );
        filt
    }

    #[test]
    fn small_move_while_button_down_is_pinned() {
        let mut filt = button_pad_filter();
        let mut timeout = None;
        let mut hs0 = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        hs0.buttons_down = Buttons::LEFT;
        filt.sync_interpret(&mut hs0, &mut timeout);
        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 12.0, 10.0, 50.0)]);
        hs1.buttons_down = Buttons::LEFT;
        filt.sync_interpret(&mut hs1, &mut timeout);
        assert_eq!(hs1.fingers[0].x, 10.0);
        assert!(hs1.fingers[0].flags.contains(FingerFlags::WARP_X));
    }

    #[test]
    fn large_move_exits_wiggle_suppression() {
        let mut filt = button_pad_filter();
        let mut timeout = None;
        let mut hs0 = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        hs0.buttons_down = Buttons::LEFT;
        filt.sync_interpret(&mut hs0, &mut timeout);
        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 100.0, 10.0, 50.0)]);
        hs1.buttons_down = Buttons::LEFT;
        filt.sync_interpret(&mut hs1, &mut timeout);
        assert_eq!(hs1.fingers[0].x, 100.0);
    }

    #[test]
    fn no_suppression_without_button_activity() {
        let mut filt = button_pad_filter();
        let mut timeout = None;
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(!hs.fingers[0].flags.contains(FingerFlags::WARP_X));
    }
}
