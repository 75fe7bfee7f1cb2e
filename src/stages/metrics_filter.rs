//! Watches for patterns worth a UMA-style metric and emits
//! `Gesture::Metrics` for them: a touchpad finger bouncing in place (noisy
//! ground) and summary statistics for one continuous mouse-movement
//! session.
//!
//! Grounded on `metrics_filter_interpreter.h` (header only; no `.cc` in the
//! retrieval pack). The per-finger 3-sample history and the
//! noisy-ground/mouse-movement property names are transcribed directly from
//! the header; the detection thresholds follow the doc comments since no
//! implementation body was available to copy from.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{FingerState, Gesture, HardwareProperties, HardwareState, MetricsType, Stime, Timeout};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: Stime,
    x: f64,
    y: f64,
}

#[derive(Default)]
struct FingerHistory {
    samples: VecDeque<Sample>,
}

const HISTORY_SIZE: usize = 3;

pub struct MetricsFilterInterpreter {
    base: FilterBase,
    histories: HashMap<i16, FingerHistory>,

    mouse_movement_session_index: i32,
    mouse_movement_current_session_length: i32,
    mouse_movement_current_session_start: Stime,
    mouse_movement_current_session_last: Stime,
    mouse_movement_current_session_distance: f64,
    in_mouse_session: bool,

    noisy_ground_distance_threshold: BoundCell<f64>,
    noisy_ground_time_threshold: BoundCell<f64>,
    mouse_moving_time_threshold: BoundCell<f64>,
    mouse_control_warmup_sessions: BoundCell<i32>,
}

impl MetricsFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            histories: HashMap::new(),
            mouse_movement_session_index: 0,
            mouse_movement_current_session_length: 0,
            mouse_movement_current_session_start: 0.0,
            mouse_movement_current_session_last: 0.0,
            mouse_movement_current_session_distance: 0.0,
            in_mouse_session: false,
            noisy_ground_distance_threshold: prop_reg.bind_double("Noisy Ground Distance Threshold", 0.2),
            noisy_ground_time_threshold: prop_reg.bind_double("Noisy Ground Time Threshold", 0.1),
            mouse_moving_time_threshold: prop_reg.bind_double("Mouse Moving Time Threshold", 0.5),
            mouse_control_warmup_sessions: prop_reg.bind_int("Mouse Control Warmup Sessions", 5),
        }
    }

    fn add_sample(history: &mut FingerHistory, fs: &FingerState, hwstate: &HardwareState) {
        if history.samples.len() == HISTORY_SIZE {
            history.samples.pop_front();
        }
        history.samples.push_back(Sample {
            timestamp: hwstate.timestamp,
            x: fs.x,
            y: fs.y,
        });
    }

    /// A finger that jitters back and forth across all three stored samples
    /// within a small distance and a short window is probably the pad
    /// picking up electrical noise from a poorly grounded chassis.
    fn detect_noisy_ground(&self, history: &FingerHistory) -> bool {
        if history.samples.len() < HISTORY_SIZE {
            return false;
        }
        let first = history.samples.front().unwrap();
        let last = history.samples.back().unwrap();
        let dt = last.timestamp - first.timestamp;
        if dt <= 0.0 || dt > *self.noisy_ground_time_threshold.borrow() {
            return false;
        }
        let max_dist = history
            .samples
            .iter()
            .flat_map(|a| history.samples.iter().map(move |b| ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()))
            .fold(0.0, f64::max);
        max_dist > 0.0 && max_dist < *self.noisy_ground_distance_threshold.borrow()
    }

    fn update_finger_state(&mut self, hwstate: &HardwareState) -> Vec<Gesture> {
        let present: std::collections::HashSet<i16> =
            hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.histories.retain(|id, _| present.contains(id));

        let mut out = Vec::new();
        for finger in &hwstate.fingers {
            let history = self.histories.entry(finger.tracking_id).or_default();
            Self::add_sample(history, finger, hwstate);
            if self.detect_noisy_ground(history) {
                out.push(Gesture::Metrics {
                    start_time: hwstate.timestamp,
                    end_time: hwstate.timestamp,
                    kind: MetricsType::NoisyGround,
                    a: finger.tracking_id as f64,
                    b: 0.0,
                });
            }
        }
        out
    }

    fn update_mouse_movement_state(&mut self, hwstate: &HardwareState) -> Option<Gesture> {
        let moving = hwstate.rel_x != 0.0 || hwstate.rel_y != 0.0;
        if !moving {
            if self.in_mouse_session
                && hwstate.timestamp - self.mouse_movement_current_session_last
                    > *self.mouse_moving_time_threshold.borrow()
            {
                let result = self.finish_session();
                self.in_mouse_session = false;
                return result;
            }
            return None;
        }
        if !self.in_mouse_session {
            self.in_mouse_session = true;
            self.mouse_movement_current_session_start = hwstate.timestamp;
            self.mouse_movement_current_session_length = 0;
            self.mouse_movement_current_session_distance = 0.0;
        }
        self.mouse_movement_current_session_length += 1;
        self.mouse_movement_current_session_last = hwstate.timestamp;
        self.mouse_movement_current_session_distance +=
            (hwstate.rel_x * hwstate.rel_x + hwstate.rel_y * hwstate.rel_y).sqrt();
        None
    }

    fn finish_session(&mut self) -> Option<Gesture> {
        self.mouse_movement_session_index += 1;
        if self.mouse_movement_session_index <= *self.mouse_control_warmup_sessions.borrow() {
            return None;
        }
        Some(Gesture::Metrics {
            start_time: self.mouse_movement_current_session_start,
            end_time: self.mouse_movement_current_session_last,
            kind: MetricsType::MouseMovement,
            a: self.mouse_movement_current_session_distance,
            b: self.mouse_movement_current_session_length as f64,
        })
    }
}

impl Interpreter for MetricsFilterInterpreter {
    fn name(&self) -> &'static str {
        "MetricsFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let mut synthesized = self.update_finger_state(hwstate);
        synthesized.extend(self.update_mouse_movement_state(hwstate));

        let now = hwstate.timestamp;
        let (mut gestures, _) = self.base.sync_interpret_next(now, hwstate);
        gestures.splice(0..0, synthesized);
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
        self.in_mouse_session = false;
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
    fn jittering_finger_triggers_noisy_ground_metric() {
        let mut reg = PropRegistry::new();
        let mut filt = MetricsFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut timeout = None;
        for (i, x) in [0.0, 0.05, 0.0].iter().enumerate() {
            let mut hs = HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, *x, 0.0, 50.0)]);
            let gestures = filt.sync_interpret(&mut hs, &mut timeout);
            if i == 2 {
                assert!(gestures.iter().any(|g| matches!(g, Gesture::Metrics { kind: MetricsType::NoisyGround, .. })));
            }
        }
    }

    #[test]
    fn warmup_sessions_are_not_reported() {
        let mut reg = PropRegistry::new();
        let mut filt = MetricsFilterInterpreter::new(&mut reg, Box::new(Sink));
        *filt.mouse_control_warmup_sessions.borrow_mut() = 0;
        let mut timeout = None;
        let mut hs1 = HardwareState::new(0.0, vec![]);
        hs1.rel_x = 1.0;
        filt.sync_interpret(&mut hs1, &mut timeout);
        let mut hs2 = HardwareState::new(1.0, vec![]);
        let gestures = filt.sync_interpret(&mut hs2, &mut timeout);
        assert!(gestures.iter().any(|g| matches!(g, Gesture::Metrics { kind: MetricsType::MouseMovement, .. })));
    }
}
