//! Base behavior shared by every stage that wraps a single downstream
//! stage: the chained-timer arithmetic from §4.1.
//!
//! Grounded on `filter_interpreter.h`/`.cc`'s
//! `SetNextDeadlineAndReturnTimeoutVal` and `ShouldCallNextTimer`. A wrapping
//! stage owns its downstream stage directly (`Box<dyn Interpreter>`) rather
//! than the source's raw pointer into a tree of unique-pointers; see the
//! design notes on the chain shape.

use crate::interpreter::Interpreter;
use crate::types::{Gesture, HardwareState, Stime, Timeout};

/// Shared plumbing for a stage that wraps exactly one downstream stage.
pub struct FilterBase {
    pub next: Box<dyn Interpreter>,
    /// Downstream's absolute deadline, as last reported to us, or `None` if
    /// downstream has no outstanding timer request.
    next_deadline: Timeout,
}

impl FilterBase {
    pub fn new(next: Box<dyn Interpreter>) -> Self {
        Self {
            next,
            next_deadline: None,
        }
    }

    /// Forwards a frame to the wrapped stage and records its deadline.
    pub fn sync_interpret_next(&mut self, now: Stime, hwstate: &mut HardwareState) -> (Vec<Gesture>, Timeout) {
        let mut downstream_timeout = None;
        let gestures = self.next.sync_interpret(hwstate, &mut downstream_timeout);
        self.next_deadline = downstream_timeout.map(|dt| now + dt);
        (gestures, downstream_timeout)
    }

    /// Forwards a timer fire to the wrapped stage and records its new
    /// deadline.
    pub fn handle_timer_next(&mut self, now: Stime) -> (Vec<Gesture>, Timeout) {
        let mut downstream_timeout = None;
        let gestures = self.next.handle_timer(now, &mut downstream_timeout);
        self.next_deadline = downstream_timeout.map(|dt| now + dt);
        (gestures, downstream_timeout)
    }

    /// Combines a stage's own absolute deadline with the downstream
    /// deadline already recorded, returning the single relative timeout to
    /// report to the host.
    pub fn combine_timeout(&self, now: Stime, local_deadline: Timeout) -> Timeout {
        match (local_deadline, self.next_deadline) {
            (None, None) => None,
            (Some(l), None) => Some((l - now).max(0.0)),
            (None, Some(d)) => Some((d - now).max(0.0)),
            (Some(l), Some(d)) => Some((l.min(d) - now).max(0.0)),
        }
    }

    /// Whether a timer fire at `now` belongs to the downstream stage. Per
    /// the dispatch rule: if both the local and downstream deadlines have
    /// passed, local runs first (a stage calls this *after* handling its
    /// own local deadline).
    pub fn should_call_next_timer(&self, now: Stime) -> bool {
        match self.next_deadline {
            None => false,
            Some(d) => d <= now,
        }
    }

    pub fn next_deadline(&self) -> Timeout {
        self.next_deadline
    }

    pub fn clear_next(&mut self) {
        self.next.clear();
        self.next_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Metrics, MetricsProperties};
    use crate::types::HardwareProperties;

    struct Stub {
        timeout: Timeout,
    }
    impl Interpreter for Stub {
        fn name(&self) -> &'static str {
            "Stub"
        }
        fn initialize(&mut self, _: &HardwareProperties, _: &mut Metrics, _: &MetricsProperties) {}
        fn sync_interpret(&mut self, _: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = self.timeout;
            Vec::new()
        }
        fn handle_timer(&mut self, _: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
            *timeout = self.timeout;
            Vec::new()
        }
    }

    #[test]
    fn combine_timeout_picks_the_sooner_deadline() {
        let mut base = FilterBase::new(Box::new(Stub { timeout: Some(5.0) }));
        let mut hs = HardwareState::default();
        base.sync_interpret_next(0.0, &mut hs);
        // downstream wants 5.0s from now=0.0 -> absolute deadline 5.0
        let combined = base.combine_timeout(0.0, Some(2.0));
        assert_eq!(combined, Some(2.0));
    }

    #[test]
    fn combine_timeout_falls_back_to_whichever_side_is_set() {
        let mut base = FilterBase::new(Box::new(Stub { timeout: None }));
        let mut hs = HardwareState::default();
        base.sync_interpret_next(0.0, &mut hs);
        assert_eq!(base.combine_timeout(0.0, Some(1.0)), Some(1.0));
        assert_eq!(base.combine_timeout(0.0, None), None);
    }

    #[test]
    fn should_call_next_timer_true_once_deadline_passed() {
        let mut base = FilterBase::new(Box::new(Stub { timeout: Some(1.0) }));
        let mut hs = HardwareState::default();
        base.sync_interpret_next(10.0, &mut hs);
        assert!(!base.should_call_next_timer(10.5));
        assert!(base.should_call_next_timer(11.0));
    }
}
