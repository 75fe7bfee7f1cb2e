//! Synthesizes button clicks on a haptic (force-sensing, no physical click
//! mechanism) touchpad from applied force, using a sensitivity-indexed
//! threshold table with hysteresis between the down and up thresholds and an
//! optional dynamic threshold that tracks a running baseline force.
//!
//! Grounded on `haptic_button_generator_filter_interpreter.h` (header only;
//! no `.cc` in the retrieval pack). The five-entry threshold tables and the
//! `[1..5]` sensitivity property range are transcribed directly from the
//! header; the dynamic-threshold ratio arithmetic follows its doc comments
//! since no implementation body was available to copy from.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Buttons, Gesture, HardwareProperties, HardwareState, Stime, Timeout};

const DOWN_THRESHOLDS: [f64; 5] = [90.0, 110.0, 130.0, 145.0, 160.0];
const UP_THRESHOLDS: [f64; 5] = [80.0, 95.0, 105.0, 120.0, 135.0];

pub struct HapticButtonGeneratorFilterInterpreter {
    base: FilterBase,
    is_haptic_pad: bool,
    enabled: BoundCell<bool>,
    sensitivity: BoundCell<i32>,
    use_custom_thresholds: BoundCell<bool>,
    custom_down_threshold: BoundCell<f64>,
    custom_up_threshold: BoundCell<f64>,
    use_dynamic_thresholds: BoundCell<bool>,
    dynamic_down_ratio: BoundCell<f64>,
    dynamic_up_ratio: BoundCell<f64>,
    max_dynamic_up_force: BoundCell<f64>,
    release_suppress_factor: BoundCell<f64>,
    complete_release_suppress_speed: BoundCell<f64>,

    button_down: bool,
    dynamic_baseline_force: f64,
    prev_max_force: f64,
}

impl HapticButtonGeneratorFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>, is_haptic_pad: bool) -> Self {
        Self {
            base: FilterBase::new(next),
            is_haptic_pad,
            enabled: prop_reg.bind_bool("Haptic Button Generation Enable", true),
            sensitivity: prop_reg.bind_int("Haptic Button Sensitivity", 3),
            use_custom_thresholds: prop_reg.bind_bool("Haptic Button Use Custom Thresholds", false),
            custom_down_threshold: prop_reg.bind_double("Haptic Button Custom Down Threshold", DOWN_THRESHOLDS[2]),
            custom_up_threshold: prop_reg.bind_double("Haptic Button Custom Up Threshold", UP_THRESHOLDS[2]),
            use_dynamic_thresholds: prop_reg.bind_bool("Haptic Button Use Dynamic Thresholds", false),
            dynamic_down_ratio: prop_reg.bind_double("Haptic Button Dynamic Down Ratio", 1.0),
            dynamic_up_ratio: prop_reg.bind_double("Haptic Button Dynamic Up Ratio", 0.9),
            max_dynamic_up_force: prop_reg.bind_double("Haptic Button Max Dynamic Up Force", 40.0),
            release_suppress_factor: prop_reg.bind_double("Haptic Button Release Suppress Factor", 0.8),
            complete_release_suppress_speed: prop_reg.bind_double("Haptic Button Complete Release Suppress Speed", 1.0),
            button_down: false,
            dynamic_baseline_force: 0.0,
            prev_max_force: 0.0,
        }
    }

    fn sensitivity_index(&self) -> usize {
        ((*self.sensitivity.borrow()).clamp(1, 5) - 1) as usize
    }

    fn down_threshold(&self) -> f64 {
        if *self.use_custom_thresholds.borrow() {
            return *self.custom_down_threshold.borrow();
        }
        let base = DOWN_THRESHOLDS[self.sensitivity_index()];
        if *self.use_dynamic_thresholds.borrow() {
            (self.dynamic_baseline_force * *self.dynamic_down_ratio.borrow()).max(base)
        } else {
            base
        }
    }

    fn up_threshold(&self) -> f64 {
        if *self.use_custom_thresholds.borrow() {
            return *self.custom_up_threshold.borrow();
        }
        let base = UP_THRESHOLDS[self.sensitivity_index()];
        if *self.use_dynamic_thresholds.borrow() {
            (self.dynamic_baseline_force * *self.dynamic_up_ratio.borrow())
                .min(*self.max_dynamic_up_force.borrow())
                .max(base * 0.5)
        } else {
            base
        }
    }

    fn max_force(hwstate: &HardwareState) -> f64 {
        hwstate.fingers.iter().map(|f| f.pressure).fold(0.0, f64::max)
    }

    fn update(&mut self, hwstate: &HardwareState) -> Option<Gesture> {
        if !*self.enabled.borrow() || !self.is_haptic_pad {
            return None;
        }
        let force = Self::max_force(hwstate);
        let use_dynamic_thresholds = *self.use_dynamic_thresholds.borrow();
        if !use_dynamic_thresholds && hwstate.fingers.is_empty() {
            self.dynamic_baseline_force = 0.0;
        } else if !hwstate.fingers.is_empty() {
            self.dynamic_baseline_force = self.dynamic_baseline_force.max(force);
        }

        let result = if !self.button_down {
            if force >= self.down_threshold() {
                self.button_down = true;
                Some(Gesture::ButtonsChange {
                    start_time: hwstate.timestamp,
                    end_time: hwstate.timestamp,
                    down: Buttons::LEFT,
                    up: Buttons::empty(),
                    is_tap: false,
                })
            } else {
                None
            }
        } else if force <= self.up_threshold() {
            self.button_down = false;
            Some(Gesture::ButtonsChange {
                start_time: hwstate.timestamp,
                end_time: hwstate.timestamp,
                down: Buttons::empty(),
                up: Buttons::LEFT,
                is_tap: false,
            })
        } else {
            None
        };
        self.prev_max_force = force;
        result
    }
}

impl Interpreter for HapticButtonGeneratorFilterInterpreter {
    fn name(&self) -> &'static str {
        "HapticButtonGeneratorFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.is_haptic_pad = hwprops.is_haptic_pad;
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let synthesized = self.update(hwstate);
        let now = hwstate.timestamp;
        let (mut gestures, _) = self.base.sync_interpret_next(now, hwstate);
        if let Some(g) = synthesized {
            gestures.insert(0, g);
        }
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
        self.button_down = false;
        self.dynamic_baseline_force = 0.0;
        self.prev_max_force = 0.0;
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
    fn force_above_down_threshold_emits_button_down() {
        let mut reg = PropRegistry::new();
        let mut filt = HapticButtonGeneratorFilterInterpreter::new(&mut reg, Box::new(Sink), true);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 200.0)]);
        let mut timeout = None;
        let gestures = filt.sync_interpret(&mut hs, &mut timeout);
        assert_eq!(gestures.len(), 1);
        assert!(matches!(gestures[0], Gesture::ButtonsChange { down: d, .. } if d == Buttons::LEFT));
    }

    #[test]
    fn non_haptic_pad_never_synthesizes_clicks() {
        let mut reg = PropRegistry::new();
        let mut filt = HapticButtonGeneratorFilterInterpreter::new(&mut reg, Box::new(Sink), false);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 200.0)]);
        let mut timeout = None;
        let gestures = filt.sync_interpret(&mut hs, &mut timeout);
        assert!(gestures.is_empty());
    }
}
