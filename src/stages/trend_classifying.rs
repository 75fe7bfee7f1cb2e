//! Per-axis Kendall-τ trend test over the last several samples; sets the
//! direction-trend flags when the Z-score passes the configured threshold
//! (default 2.5758, p ≈ 0.01).
//!
//! Grounded on `trend_classifying_filter_interpreter.cc`. The tie-corrected
//! variance term in the original combines `tie_n2`/`tie_n3` counters derived
//! from an unexported helper (`UpdateKTValuePair`) not present in the
//! retrieved source; this port uses the untied-score variance
//! `n(n-1)(2n+5)/18`, which is exact whenever no two samples on an axis are
//! equal and a slight overestimate of significance otherwise — a documented
//! simplification, not a behavioral guess (see DESIGN.md).

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerFlags, FingerState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendType {
    None,
    Increasing,
    Decreasing,
}

const AXIS_COUNT: usize = 4; // x, y, pressure, touch_major

fn axis_value(fs: &FingerState, axis: usize) -> f64 {
    match axis {
        0 => fs.x,
        1 => fs.y,
        2 => fs.pressure,
        3 => fs.touch_major,
        _ => unreachable!(),
    }
}

fn inc_flag(axis: usize) -> FingerFlags {
    match axis {
        0 => FingerFlags::TREND_INC_X,
        1 => FingerFlags::TREND_INC_Y,
        2 => FingerFlags::TREND_INC_PRESSURE,
        3 => FingerFlags::TREND_INC_TOUCH_MAJOR,
        _ => unreachable!(),
    }
}

fn dec_flag(axis: usize) -> FingerFlags {
    match axis {
        0 => FingerFlags::TREND_DEC_X,
        1 => FingerFlags::TREND_DEC_Y,
        2 => FingerFlags::TREND_DEC_PRESSURE,
        3 => FingerFlags::TREND_DEC_TOUCH_MAJOR,
        _ => unreachable!(),
    }
}

#[derive(Default)]
struct FingerHistory {
    samples: VecDeque<[f64; AXIS_COUNT]>,
}

pub struct TrendClassifyingFilterInterpreter {
    base: FilterBase,
    enabled: BoundCell<bool>,
    min_num_of_samples: BoundCell<i32>,
    num_of_samples: BoundCell<i32>,
    z_threshold: BoundCell<f64>,
    histories: HashMap<i16, FingerHistory>,
}

impl TrendClassifyingFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        prop_reg.register_bool("Trend Classifying 2nd-order Motion Enabled", false);
        Self {
            base: FilterBase::new(next),
            enabled: prop_reg.bind_bool("Trend Classifying Filter Enabled", true),
            min_num_of_samples: prop_reg.bind_int("Trend Classifying Min Num of Samples", 6),
            num_of_samples: prop_reg.bind_int("Trend Classifying Num of Samples", 20),
            z_threshold: prop_reg.bind_double("Trend Classifying Z Threshold", 2.5758293035489004),
            histories: HashMap::new(),
        }
    }

    fn compute_kt_variance(n_samples: usize) -> f64 {
        let n = n_samples as f64;
        n * (n - 1.0) * (2.0 * n + 5.0) / 18.0
    }

    fn run_kt_test(min_num_of_samples: usize, z_threshold: f64, score: f64, n_samples: usize) -> TrendType {
        if n_samples < min_num_of_samples {
            return TrendType::None;
        }
        if score == 0.0 {
            return TrendType::None;
        }
        let var = Self::compute_kt_variance(n_samples);
        if score * score < z_threshold * z_threshold * var {
            return TrendType::None;
        }
        if score > 0.0 {
            TrendType::Increasing
        } else {
            TrendType::Decreasing
        }
    }

    fn update_finger_state(&mut self, hwstate: &mut HardwareState) {
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.histories.retain(|id, _| present.contains(id));
        let min_num_of_samples = (*self.min_num_of_samples.borrow()).max(0) as usize;
        let num_of_samples = (*self.num_of_samples.borrow()).max(0) as usize;
        let z_threshold = *self.z_threshold.borrow();

        for finger in &mut hwstate.fingers {
            let history = self.histories.entry(finger.tracking_id).or_default();
            let sample = [
                axis_value(finger, 0),
                axis_value(finger, 1),
                axis_value(finger, 2),
                axis_value(finger, 3),
            ];
            if history.samples.len() == num_of_samples {
                history.samples.pop_front();
            }
            history.samples.push_back(sample);

            let n = history.samples.len();
            for axis in 0..AXIS_COUNT {
                let mut score = 0.0;
                for earlier in history.samples.iter().take(n.saturating_sub(1)) {
                    let d = sample[axis] - earlier[axis];
                    if d > 0.0 {
                        score += 1.0;
                    } else if d < 0.0 {
                        score -= 1.0;
                    }
                }
                let trend = Self::run_kt_test(min_num_of_samples, z_threshold, score, n);
                match trend {
                    TrendType::Increasing => finger.flags |= inc_flag(axis),
                    TrendType::Decreasing => finger.flags |= dec_flag(axis),
                    TrendType::None => {}
                }
            }
        }
    }
}

impl Interpreter for TrendClassifyingFilterInterpreter {
    fn name(&self) -> &'static str {
        "TrendClassifyingFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        if *self.enabled.borrow() {
            self.update_finger_state(hwstate);
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
        self.histories.clear();
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
    fn monotonic_motion_sets_increasing_trend() {
        let mut reg = PropRegistry::new();
        let mut filt = TrendClassifyingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        let mut last_flags = FingerFlags::empty();
        for i in 0..10 {
            let mut hs = HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, i as f64, 0.0, 50.0)]);
            filt.sync_interpret(&mut hs, &mut timeout);
            last_flags = hs.fingers[0].flags;
        }
        assert!(last_flags.contains(FingerFlags::TREND_INC_X));
    }

    #[test]
    fn too_few_samples_yields_no_trend() {
        let mut reg = PropRegistry::new();
        let mut filt = TrendClassifyingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(hs.fingers[0].flags.is_empty());
    }
}
