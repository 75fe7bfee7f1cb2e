//! The topmost stage: owns the on-disk activity log and exposes properties
//! that, when written, dump or clear it.
//!
//! Grounded on `logging_filter_interpreter.h`/`.cc`. `"Logging Notify"` dumps
//! the log to `"Log Path"`; `"Logging Reset"` clears it; `"Event Logging
//! Enable"`/`"Event Debug Logging Components Enable"` are recorded but, per
//! the source's own comment on `integrated_touchpad_`, have no behavioral
//! effect in this layer — the property just needs somewhere to live.

use crate::activity_log::ActivityLog;
use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, HardwareState as HwState, Stime, Timeout};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to the log and its two action properties, cloned out of
/// the stage at construction so the owning `GestureInterpreter` — which
/// alone holds the `PropRegistry` a dump needs to snapshot current property
/// values — can service `"Logging Notify"`/`"Logging Reset"` once per frame.
#[derive(Clone)]
pub struct LoggingHandle {
    log: Rc<RefCell<ActivityLog>>,
    log_path: BoundCell<String>,
    notify: BoundCell<i32>,
    reset: BoundCell<i32>,
    last_notify_seen: Rc<RefCell<i32>>,
    last_reset_seen: Rc<RefCell<i32>>,
}

impl LoggingHandle {
    pub fn log(&self) -> &Rc<RefCell<ActivityLog>> {
        &self.log
    }

    /// Writes the encoded log to the `Log Path` property's current value.
    /// Errors are logged, not propagated — a failed dump must never disturb
    /// gesture delivery.
    pub fn dump(&self, prop_reg: &PropRegistry) {
        let encoded = self.log.borrow().encode(prop_reg);
        let path = self.log_path.borrow().clone();
        match serde_json::to_vec(&encoded) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&path, bytes) {
                    log::error!("failed to write activity log to {}: {}", path, e);
                }
            }
            Err(e) => log::error!("failed to encode activity log: {}", e),
        }
    }

    /// A host triggers either action by writing any value different from
    /// the last one it wrote; the written value itself carries no meaning
    /// beyond "act now".
    pub fn service_triggers(&self, prop_reg: &PropRegistry) {
        let notify = *self.notify.borrow();
        if notify != *self.last_notify_seen.borrow() {
            *self.last_notify_seen.borrow_mut() = notify;
            self.dump(prop_reg);
        }
        let reset = *self.reset.borrow();
        if reset != *self.last_reset_seen.borrow() {
            *self.last_reset_seen.borrow_mut() = reset;
            self.log.borrow_mut().clear();
        }
    }
}

pub struct LoggingFilterInterpreter {
    base: FilterBase,
    handle: LoggingHandle,
    event_logging_enable: BoundCell<bool>,
    event_debug_logging_enable: BoundCell<i32>,
}

impl LoggingFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        let log = Rc::new(RefCell::new(ActivityLog::with_small_buffer()));
        prop_reg.attach_log(&log);
        prop_reg.register_bool("Integrated Touchpad", false);
        let handle = LoggingHandle {
            log,
            log_path: prop_reg.bind_string("Log Path", "/var/log/xorg/touchpad_activity_log.txt"),
            notify: prop_reg.bind_int("Logging Notify", 0),
            reset: prop_reg.bind_int("Logging Reset", 0),
            last_notify_seen: Rc::new(RefCell::new(0)),
            last_reset_seen: Rc::new(RefCell::new(0)),
        };
        Self {
            base: FilterBase::new(next),
            handle,
            event_logging_enable: prop_reg.bind_bool("Event Logging Enable", false),
            event_debug_logging_enable: prop_reg.bind_int("Event Debug Logging Components Enable", 0),
        }
    }

    pub fn log(&self) -> &Rc<RefCell<ActivityLog>> {
        self.handle.log()
    }

    /// Returns a cloned handle the owning `GestureInterpreter` retains to
    /// service the log's action properties once per frame.
    pub fn handle(&self) -> LoggingHandle {
        self.handle.clone()
    }

    pub fn dump(&self, prop_reg: &PropRegistry) {
        self.handle.dump(prop_reg);
    }
}

impl Interpreter for LoggingFilterInterpreter {
    fn name(&self) -> &'static str {
        "LoggingFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.log().borrow_mut().push_hardware_state_pre("SyncInterpret", hwstate);
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        self.log().borrow_mut().push_hardware_state_post("SyncInterpret", hwstate);
        for g in &gestures {
            self.log().borrow_mut().push_gesture(g);
        }
        *timeout = self.base.combine_timeout(now, None);
        gestures
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        self.log().borrow_mut().push_timer_callback(now);
        let (gestures, _) = self.base.handle_timer_next(now);
        for g in &gestures {
            self.log().borrow_mut().push_gesture(g);
        }
        *timeout = self.base.combine_timeout(now, None);
        gestures
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.log().borrow_mut().clear();
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
        fn sync_interpret(&mut self, _: &mut HwState, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
        fn handle_timer(&mut self, _: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
    }

    #[test]
    fn frames_are_recorded_in_the_log() {
        let mut reg = PropRegistry::new();
        let mut filt = LoggingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(filt.log().borrow().size() >= 2); // pre + post entries
    }

    #[test]
    fn clear_resets_log_size() {
        let mut reg = PropRegistry::new();
        let mut filt = LoggingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        filt.clear();
        assert_eq!(filt.log().borrow().size(), 0);
    }

    #[test]
    fn writing_logging_reset_through_the_registry_clears_the_log_on_next_service() {
        use crate::property::PropValue;

        let mut reg = PropRegistry::new();
        let mut filt = LoggingFilterInterpreter::new(&mut reg, Box::new(Sink));
        let handle = filt.handle();
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!(filt.log().borrow().size() > 0);

        reg.set("Logging Reset", PropValue::Int(1)).unwrap();
        handle.service_triggers(&reg);
        assert_eq!(filt.log().borrow().size(), 0);
    }
}
