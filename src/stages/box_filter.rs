//! Treats each reported position as the centre of a box of configurable
//! width/height; motion within the box is suppressed, and the box only
//! shifts once a point lands outside it.
//!
//! Grounded on `box_filter_interpreter.h` (no `.cc` in the retrieval pack;
//! the algorithm is fully specified in the header's doc comment, reproduced
//! in this module's doc comment above).

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::HashMap;

pub struct BoxFilterInterpreter {
    base: FilterBase,
    previous_output: HashMap<i16, FingerState>,
    box_width: BoundCell<f64>,
    box_height: BoundCell<f64>,
}

impl BoxFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            previous_output: HashMap::new(),
            box_width: prop_reg.bind_double("Box Width", 0.0),
            box_height: prop_reg.bind_double("Box Height", 0.0),
        }
    }

    fn apply_box(&mut self, finger: &mut FingerState) {
        let half_w = *self.box_width.borrow() / 2.0;
        let half_h = *self.box_height.borrow() / 2.0;
        match self.previous_output.get(&finger.tracking_id).copied() {
            None => {
                self.previous_output.insert(finger.tracking_id, *finger);
            }
            Some(prev) => {
                let mut out = *finger;
                let dx = finger.x - prev.x;
                if dx.abs() < half_w {
                    out.x = prev.x;
                } else {
                    out.x = finger.x - half_w * dx.signum();
                }
                let dy = finger.y - prev.y;
                if dy.abs() < half_h {
                    out.y = prev.y;
                } else {
                    out.y = finger.y - half_h * dy.signum();
                }
                self.previous_output.insert(finger.tracking_id, out);
                finger.x = out.x;
                finger.y = out.y;
            }
        }
    }
}

impl Interpreter for BoxFilterInterpreter {
    fn name(&self) -> &'static str {
        "BoxFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.previous_output.retain(|id, _| present.contains(id));

        if *self.box_width.borrow() > 0.0 || *self.box_height.borrow() > 0.0 {
            for finger in &mut hwstate.fingers {
                self.apply_box(finger);
            }
        }

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
        self.previous_output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn motion_within_box_is_suppressed() {
        let mut reg = PropRegistry::new();
        let mut filt = BoxFilterInterpreter::new(&mut reg, Box::new(Sink));
        *filt.box_width.borrow_mut() = 4.0;
        *filt.box_height.borrow_mut() = 4.0;
        let mut timeout = None;

        let mut hs1 = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs1, &mut timeout);

        let mut hs2 = HardwareState::new(0.01, vec![FingerState::new(1, 1.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert_eq!(hs2.fingers[0].x, 0.0); // within half-width 2.0, box holds
    }

    #[test]
    fn motion_outside_box_shifts_box_edge() {
        let mut reg = PropRegistry::new();
        let mut filt = BoxFilterInterpreter::new(&mut reg, Box::new(Sink));
        *filt.box_width.borrow_mut() = 2.0;
        *filt.box_height.borrow_mut() = 2.0;
        let mut timeout = None;

        let mut hs1 = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs1, &mut timeout);

        let mut hs2 = HardwareState::new(0.01, vec![FingerState::new(1, 5.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert_eq!(hs2.fingers[0].x, 4.0); // shifted by half_w toward prev
    }

    #[test]
    fn a_registry_write_reaches_the_filter_without_a_rust_setter() {
        use crate::property::PropValue;

        let mut reg = PropRegistry::new();
        let mut filt = BoxFilterInterpreter::new(&mut reg, Box::new(Sink));
        reg.set("Box Width", PropValue::Double(4.0)).unwrap();
        reg.set("Box Height", PropValue::Double(4.0)).unwrap();
        let mut timeout = None;

        let mut hs1 = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs1, &mut timeout);

        let mut hs2 = HardwareState::new(0.01, vec![FingerState::new(1, 1.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs2, &mut timeout);
        assert_eq!(hs2.fingers[0].x, 0.0);
    }
}
