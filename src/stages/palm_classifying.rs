//! Classifies a contact as palm using edge zone, pressure, width, age, and
//! proximity to other contacts; palms can be demoted back to pointing
//! fingers ("fat finger rescue") if lifetime max pressure stays low and
//! travel exceeds a minimum.
//!
//! Grounded on `palm_classifying_filter_interpreter.h` (header only; no
//! `.cc` in the retrieval pack, so the edge-envelope geometry and the
//! fat-finger-rescue ratios below follow the property list and doc comments
//! in the header plus the narrative in §4.4/§4.6).

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerFlags, FingerState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::{HashMap, HashSet};

pub struct PalmClassifyingFilterInterpreter {
    base: FilterBase,
    hwprops: HardwareProperties,
    origin_timestamps: HashMap<i16, Stime>,
    origin_fingerstates: HashMap<i16, FingerState>,
    max_pressure: HashMap<i16, f64>,
    max_width: HashMap<i16, f64>,
    palm: HashSet<i16>,
    non_stationary_palm: HashSet<i16>,

    palm_pressure: BoundCell<f64>,
    palm_width: BoundCell<f64>,
    multi_palm_width: BoundCell<f64>,
    fat_finger_pressure_ratio: BoundCell<f64>,
    fat_finger_width_ratio: BoundCell<f64>,
    fat_finger_min_dist: BoundCell<f64>,
    palm_edge_min_width: BoundCell<f64>,
    palm_edge_width: BoundCell<f64>,
    palm_eval_timeout: BoundCell<f64>,
    palm_stationary_time: BoundCell<f64>,
    palm_stationary_distance: BoundCell<f64>,
}

impl PalmClassifyingFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            hwprops: HardwareProperties::default(),
            origin_timestamps: HashMap::new(),
            origin_fingerstates: HashMap::new(),
            max_pressure: HashMap::new(),
            max_width: HashMap::new(),
            palm: HashSet::new(),
            non_stationary_palm: HashSet::new(),
            palm_pressure: prop_reg.bind_double("Palm Pressure", 150.0),
            palm_width: prop_reg.bind_double("Palm Width", 18.0),
            multi_palm_width: prop_reg.bind_double("Multiple Palm Width", 15.0),
            fat_finger_pressure_ratio: prop_reg.bind_double("Fat Finger Pressure Ratio", 0.8),
            fat_finger_width_ratio: prop_reg.bind_double("Fat Finger Width Ratio", 0.8),
            fat_finger_min_dist: prop_reg.bind_double("Fat Finger Min Travel", 10.0),
            palm_edge_min_width: prop_reg.bind_double("Palm Edge Zone Min Width", 5.0),
            palm_edge_width: prop_reg.bind_double("Palm Edge Zone Width", 14.0),
            palm_eval_timeout: prop_reg.bind_double("Palm Eval Timeout", 0.1),
            palm_stationary_time: prop_reg.bind_double("Palm Stationary Time", 0.1),
            palm_stationary_distance: prop_reg.bind_double("Palm Stationary Distance", 2.0),
        }
    }

    fn finger_age(&self, id: i16, now: Stime) -> Option<Stime> {
        self.origin_timestamps.get(&id).map(|t0| now - t0)
    }

    /// Distance in device units from the nearest pad edge the contact is
    /// closest to.
    fn dist_to_edge(&self, fs: &FingerState) -> f64 {
        let dl = fs.x - self.hwprops.left;
        let dr = self.hwprops.right - fs.x;
        let dt = fs.y - self.hwprops.top;
        let db = self.hwprops.bottom - fs.y;
        dl.min(dr).min(dt).min(db)
    }

    fn finger_in_palm_envelope(&self, fs: &FingerState) -> bool {
        let palm_edge_min_width = *self.palm_edge_min_width.borrow();
        let palm_edge_width = *self.palm_edge_width.borrow();
        let edge = self.dist_to_edge(fs);
        if edge <= palm_edge_min_width {
            return true;
        }
        if edge >= palm_edge_width {
            return false;
        }
        // Linear ramp: pressure threshold scales from 0 at
        // palm_edge_min_width to palm_pressure at palm_edge_width.
        let span = (palm_edge_width - palm_edge_min_width).max(1e-9);
        let frac = (edge - palm_edge_min_width) / span;
        fs.pressure >= *self.palm_pressure.borrow() * frac
    }

    fn finger_near_other_finger(&self, hwstate: &HardwareState, idx: usize) -> bool {
        let fs = &hwstate.fingers[idx];
        hwstate.fingers.iter().enumerate().any(|(j, other)| {
            j != idx && !self.palm.contains(&other.tracking_id) && fs.dist_sq(other) < 100.0
        })
    }

    fn update_palm_state(&mut self, hwstate: &HardwareState) {
        let present: HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.origin_timestamps.retain(|id, _| present.contains(id));
        self.origin_fingerstates.retain(|id, _| present.contains(id));
        self.max_pressure.retain(|id, _| present.contains(id));
        self.max_width.retain(|id, _| present.contains(id));
        self.palm.retain(|id| present.contains(id));
        self.non_stationary_palm.retain(|id| present.contains(id));

        for finger in &hwstate.fingers {
            self.origin_timestamps
                .entry(finger.tracking_id)
                .or_insert(hwstate.timestamp);
            self.origin_fingerstates
                .entry(finger.tracking_id)
                .or_insert(*finger);
            let mp = self.max_pressure.entry(finger.tracking_id).or_insert(finger.pressure);
            *mp = mp.max(finger.pressure);
            let mw = self.max_width.entry(finger.tracking_id).or_insert(finger.touch_major);
            *mw = mw.max(finger.touch_major);
        }

        let palm_width = *self.palm_width.borrow();
        let multi_palm_width = *self.multi_palm_width.borrow();
        let palm_pressure = *self.palm_pressure.borrow();
        let palm_eval_timeout = *self.palm_eval_timeout.borrow();
        let fat_finger_pressure_ratio = *self.fat_finger_pressure_ratio.borrow();
        let fat_finger_width_ratio = *self.fat_finger_width_ratio.borrow();
        let fat_finger_min_dist = *self.fat_finger_min_dist.borrow();

        for (idx, finger) in hwstate.fingers.iter().enumerate() {
            let id = finger.tracking_id;
            let already_palm = self.palm.contains(&id);
            let big_width = finger.touch_major >= palm_width
                || (self.finger_near_other_finger(hwstate, idx) && finger.touch_major >= multi_palm_width);

            if big_width || finger.pressure >= palm_pressure {
                self.palm.insert(id);
                continue;
            }

            let age = self.finger_age(id, hwstate.timestamp).unwrap_or(0.0);
            if age <= palm_eval_timeout && self.finger_in_palm_envelope(finger) {
                self.palm.insert(id);
                continue;
            }

            if already_palm {
                // Fat-finger rescue: a palm whose lifetime max pressure/width
                // stayed low and that has travelled far enough is probably a
                // real finger, not a palm.
                let origin = self.origin_fingerstates.get(&id).copied();
                let travelled = origin.map(|o| o.dist_sq(finger).sqrt()).unwrap_or(0.0);
                let mp = *self.max_pressure.get(&id).unwrap_or(&finger.pressure);
                let mw = *self.max_width.get(&id).unwrap_or(&finger.touch_major);
                let is_fat_finger_rescue = mp < palm_pressure * fat_finger_pressure_ratio
                    && mw < palm_width * fat_finger_width_ratio
                    && travelled >= fat_finger_min_dist;
                if is_fat_finger_rescue {
                    self.palm.remove(&id);
                } else {
                    continue; // stays palm
                }
            }
        }
    }

    fn update_palm_flags(&mut self, hwstate: &mut HardwareState) {
        let palm_eval_timeout = *self.palm_eval_timeout.borrow();
        for finger in &mut hwstate.fingers {
            if self.palm.contains(&finger.tracking_id) {
                finger.flags |= FingerFlags::PALM;
            } else {
                let age = self.finger_age(finger.tracking_id, hwstate.timestamp).unwrap_or(f64::MAX);
                if age <= palm_eval_timeout && self.finger_in_palm_envelope(finger) {
                    finger.flags |= FingerFlags::POSSIBLE_PALM;
                }
            }
        }
    }
}

impl Interpreter for PalmClassifyingFilterInterpreter {
    fn name(&self) -> &'static str {
        "PalmClassifyingFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.hwprops = hwprops.clone();
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.update_palm_state(hwstate);
        self.update_palm_flags(hwstate);

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
        self.origin_timestamps.clear();
        self.origin_fingerstates.clear();
        self.max_pressure.clear();
        self.max_width.clear();
        self.palm.clear();
        self.non_stationary_palm.clear();
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
    fn high_pressure_contact_is_flagged_palm() {
        let mut reg = PropRegistry::new();
        let mut filt = PalmClassifyingFilterInterpreter::new(&mut reg, Box::new(Sink));
        filt.initialize(&HardwareProperties::default(), &mut Metrics::new(10), &MetricsProperties);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 500.0, 500.0, 200.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(hs.fingers[0].flags.contains(FingerFlags::PALM));
    }

    #[test]
    fn light_centered_contact_is_not_palm() {
        let mut reg = PropRegistry::new();
        let mut filt = PalmClassifyingFilterInterpreter::new(&mut reg, Box::new(Sink));
        filt.initialize(&HardwareProperties::default(), &mut Metrics::new(10), &MetricsProperties);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 500.0, 500.0, 30.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(!hs.fingers[0].flags.contains(FingerFlags::PALM));
    }
}
