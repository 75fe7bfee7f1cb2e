//! Delays every frame by a small, tunable amount so that drumroll
//! suppression, quick-move correction, and tap-down prediction can look at
//! what came shortly after a contact before committing to a tracking-id
//! decision; also rewrites tracking ids and performs slow-move suppression
//! on the way back up.
//!
//! Grounded on `lookahead_filter_interpreter.h`/`.cc`, per §4.2. The queue
//! is a `VecDeque<QState>`; `min_delay`/`max_delay` default to 0/0.09s. To
//! keep the look-ahead window from stalling the common case (a single
//! finger touching down on an empty pad and moving continuously, per
//! scenarios S1–S6), the extra variable delay described in §4.2 step 5 is
//! only engaged when a NEW finger joins an *already active* set, a finger
//! separates from one, or a liftoff jump is detected — not on the very
//! first contact of an interaction, which is the common path and must stay
//! responsive.
//!
//! Each queued frame keeps its own input-id-to-tracking-id map
//! (`QState::output_ids`), mirroring `QState::output_ids_` in the original.
//! A flushed frame is marked `completed` rather than popped immediately, and
//! `flush_due` only trims completed frames once more than two are queued —
//! otherwise, with the default zero delay, every frame would be flushed (and
//! its history lost) within the same call that queued it, leaving nothing
//! for the next frame's drumroll/quick-move comparison to look back at.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{
    Buttons, FingerFlags, FingerState, FlingState, Gesture, HardwareProperties, HardwareState, Stime, Timeout,
};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone)]
struct QState {
    hwstate: HardwareState,
    due: Stime,
    /// Input `tracking_id` (as reported by the finger-merge layer below) to
    /// the output `tracking_id` this stage assigned it for this frame.
    output_ids: HashMap<i16, i16>,
    /// Set once this frame has been sent downstream. Completed frames are
    /// kept around (at least two at a time) purely so the next frame's
    /// tracking-id assignment has something to compare against.
    completed: bool,
}

pub struct LookaheadFilterInterpreter {
    base: FilterBase,

    queue: VecDeque<QState>,
    next_id: i32,
    /// Output-id map for the frame currently being assigned, not yet pushed
    /// onto `queue`.
    pending_output_ids: HashMap<i16, i16>,

    prev_finger_cnt: usize,

    skip_reassignment: bool,

    min_delay: BoundCell<Stime>,
    max_delay: BoundCell<Stime>,
    quick_move_thresh: BoundCell<f64>,
    drumroll_speed_thresh: BoundCell<f64>,
    drumroll_max_speed_ratio: BoundCell<f64>,
    co_move_ratio: BoundCell<f64>,
    split_min_period: BoundCell<Stime>,
    min_nonsuppress_speed: BoundCell<f64>,
    suppress_immediate_tapdown: BoundCell<bool>,

    last_two_id_sets: VecDeque<(HashSet<i16>, Buttons)>,
}

impl LookaheadFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            queue: VecDeque::new(),
            next_id: 20000,
            pending_output_ids: HashMap::new(),
            prev_finger_cnt: 0,
            skip_reassignment: false,
            min_delay: prop_reg.bind_double("Lookahead Min Delay", 0.0),
            max_delay: prop_reg.bind_double("Lookahead Max Delay", 0.09),
            quick_move_thresh: prop_reg.bind_double("Lookahead Quick Move Threshold", 3.0),
            drumroll_speed_thresh: prop_reg.bind_double("Lookahead Drumroll Speed Threshold", 400.0),
            drumroll_max_speed_ratio: prop_reg.bind_double("Lookahead Drumroll Max Speed Ratio", 2.5),
            co_move_ratio: prop_reg.bind_double("Lookahead Co-Move Ratio", 0.5),
            split_min_period: prop_reg.bind_double("Lookahead Split Min Period", 0.021),
            min_nonsuppress_speed: prop_reg.bind_double("Lookahead Min Nonsuppress Speed", 200.0),
            suppress_immediate_tapdown: prop_reg.bind_bool("Lookahead Suppress Immediate Tapdown", false),
            last_two_id_sets: VecDeque::new(),
        }
    }

    fn alloc_id(&mut self) -> i16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id > i16::MAX as i32 {
            self.next_id = 20000;
        }
        id as i16
    }

    fn extra_variable_delay(&self) -> Stime {
        (*self.max_delay.borrow() - *self.min_delay.borrow()).max(0.0)
    }

    /// §4.2 step 3: rewrites `tracking_id` in place, splits off a new
    /// tracking id on drumroll, and retroactively amends the previous
    /// still-queued frame when a quick move reveals an earlier drumroll
    /// split was wrong, or when a drumroll split needs to also mark the
    /// previous frame `NO_TAP`. Returns whether any finger was newly
    /// assigned a tracking id this frame.
    fn assign_tracking_ids(&mut self, hwstate: &mut HardwareState) -> bool {
        if self.skip_reassignment {
            return false;
        }
        let quick_move_thresh = *self.quick_move_thresh.borrow();
        let drumroll_speed_thresh = *self.drumroll_speed_thresh.borrow();
        let drumroll_max_speed_ratio = *self.drumroll_max_speed_ratio.borrow();
        let co_move_ratio = *self.co_move_ratio.borrow();

        let present: HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        let mut new_output_ids: HashMap<i16, i16> =
            self.queue.back().map(|q| q.output_ids.clone()).unwrap_or_default();
        new_output_ids.retain(|id, _| present.contains(id));

        if self.queue.is_empty() {
            // Very first frame ever queued: always assign fresh ids so the
            // next frame has something to inherit and compare against.
            let mut any_new = false;
            for finger in hwstate.fingers.iter_mut() {
                let out_id = *new_output_ids.entry(finger.tracking_id).or_insert_with(|| {
                    any_new = true;
                    self.alloc_id()
                });
                finger.tracking_id = out_id;
            }
            self.pending_output_ids = new_output_ids;
            return any_new;
        }

        let now = hwstate.timestamp;
        let prev_qs_hwstate = self.queue.back().unwrap().hwstate.clone();
        let prev_qs_output_ids = self.queue.back().unwrap().output_ids.clone();
        let prev2 = if self.queue.len() >= 2 {
            let q = &self.queue[self.queue.len() - 2];
            Some((q.hwstate.clone(), q.output_ids.clone()))
        } else {
            None
        };

        let dt = (now - prev_qs_hwstate.timestamp).max(1e-6);
        let prev_dt = prev2
            .as_ref()
            .map(|(hs, _)| (prev_qs_hwstate.timestamp - hs.timestamp).max(1e-6))
            .unwrap_or(1.0);

        let dist_sq_thresh = dt * dt * drumroll_speed_thresh * drumroll_speed_thresh;
        let multiplier = dt * dt * drumroll_max_speed_ratio * drumroll_max_speed_ratio;
        let prev_dt_sq = prev_dt * prev_dt;

        let mut separated: Vec<(usize, i16, i16)> = Vec::new(); // (finger idx, input id, prev output id)
        let mut max_dist_sq = 0.0_f64;
        let mut drum_dist_sq = f64::INFINITY;
        let mut any_new = false;

        // Retroactive amendments to the previous still-queued frame,
        // applied once the loop over this frame's fingers is done.
        let mut prev_no_tap: HashSet<i16> = HashSet::new(); // previous-frame output ids
        let mut prev_requick: Vec<(i16, i16, i16)> = Vec::new(); // (input id, old prev output id, restored output id)

        for idx in 0..hwstate.fingers.len() {
            let (old_id, fx, fy, fflags) = {
                let f = &hwstate.fingers[idx];
                (f.tracking_id, f.x, f.y, f.flags)
            };
            let mut new_finger = false;
            let out_id = *new_output_ids.entry(old_id).or_insert_with(|| {
                any_new = true;
                new_finger = true;
                self.alloc_id()
            });
            hwstate.fingers[idx].tracking_id = out_id;
            if new_finger {
                continue;
            }

            let prev_output_id = match prev_qs_output_ids.get(&old_id) {
                Some(&v) => v,
                None => continue,
            };
            let prev_fs: FingerState = match prev_qs_hwstate.finger_by_id(prev_output_id) {
                Some(v) => *v,
                None => continue,
            };

            let dx = fx - prev_fs.x;
            let dy = fy - prev_fs.y;
            let dist_sq = dx * dx + dy * dy;
            let prev_max_dist_sq = max_dist_sq;
            if dist_sq > max_dist_sq {
                max_dist_sq = dist_sq;
            }

            let prev2_fs: Option<FingerState> = prev2.as_ref().and_then(|(hs, ids)| {
                ids.get(&old_id).and_then(|&pid2| hs.finger_by_id(pid2)).copied()
            });

            // Both tests below need a frame-before-the-previous to compare
            // directions against; with only one prior frame queued there's
            // nothing yet to call a reversal, so neither test runs.
            if let Some(p2) = prev2_fs {
                let prev_dx = prev_fs.x - p2.x;
                let prev_dy = prev_fs.y - p2.y;

                // Quick movement detection: a consistent direction across
                // the last two deltas means this is a fast swipe.
                let quick_move = (prev_dx * dx >= 0.0
                    && prev_dx.abs() >= quick_move_thresh
                    && dx.abs() >= quick_move_thresh)
                    || (prev_dy * dy >= 0.0 && prev_dy.abs() >= quick_move_thresh && dy.abs() >= quick_move_thresh);
                if quick_move {
                    // If the previous frame already rewrote this finger's id
                    // (a drumroll split we now know was wrong), undo it: the
                    // previous frame's id reverts to what frame-before-that
                    // had, and this frame inherits the same id. If there was
                    // nothing to undo, fall through to the drumroll test
                    // below as usual.
                    if let Some(&prev2_out) = prev2.as_ref().and_then(|(_, ids)| ids.get(&old_id)) {
                        if prev_output_id != prev2_out {
                            prev_requick.push((old_id, prev_output_id, prev2_out));
                            new_output_ids.insert(old_id, prev2_out);
                            hwstate.fingers[idx].tracking_id = prev2_out;
                            continue;
                        }
                    }
                }

                // Drumroll detection.
                if dist_sq > dist_sq_thresh {
                    let reversal = (dx.signum() != prev_dx.signum() && dx.abs() > 1e-9 && prev_dx.abs() > 1e-9)
                        || (dy.signum() != prev_dy.signum() && dy.abs() > 1e-9 && prev_dy.abs() > 1e-9);
                    if !reversal {
                        let prev_dist_sq = prev_dx * prev_dx + prev_dy * prev_dy;
                        if dist_sq * prev_dt_sq <= multiplier * prev_dist_sq {
                            continue;
                        }
                    }
                    if fflags.intersects(FingerFlags::WARP_X | FingerFlags::WARP_Y) {
                        // A warping finger's position jump is the warp, not
                        // a drumroll; don't reassign its tracking id.
                        hwstate.fingers[idx].flags |= FingerFlags::WARP_X | FingerFlags::WARP_Y;
                        continue;
                    }
                    let new_out = self.alloc_id();
                    new_output_ids.insert(old_id, new_out);
                    hwstate.fingers[idx].tracking_id = new_out;
                    hwstate.fingers[idx].flags |= FingerFlags::NO_TAP;
                    prev_no_tap.insert(prev_output_id);
                    separated.push((idx, old_id, prev_output_id));
                    max_dist_sq = prev_max_dist_sq;
                    drum_dist_sq = dist_sq;
                }
            }
        }

        // Two fingers drumrolling at once is more likely a fast swipe; a
        // single finger drumrolling about as much as another co-moving
        // finger is more likely the same swipe. Abort the split either way.
        if separated.len() > 1
            || (separated.len() == 1 && drum_dist_sq < max_dist_sq * co_move_ratio * co_move_ratio)
        {
            for (idx, input_id, prev_output_id) in &separated {
                new_output_ids.insert(*input_id, *prev_output_id);
                hwstate.fingers[*idx].tracking_id = *prev_output_id;
            }
        }

        // Amending an already-completed frame is harmless but pointless —
        // its gestures already went downstream — so only bother while it's
        // still waiting to be flushed, same as the upstream `completed_`
        // check this mirrors.
        if !prev_no_tap.is_empty() || !prev_requick.is_empty() {
            if let Some(prev_qs) = self.queue.back_mut().filter(|q| !q.completed) {
                for out_id in &prev_no_tap {
                    if let Some(f) = prev_qs.hwstate.finger_by_id_mut(*out_id) {
                        f.flags |= FingerFlags::NO_TAP;
                    }
                }
                for (input_id, old_prev_out, restored_out) in &prev_requick {
                    if let Some(f) = prev_qs.hwstate.finger_by_id_mut(*old_prev_out) {
                        f.tracking_id = *restored_out;
                    }
                    prev_qs.output_ids.insert(*input_id, *restored_out);
                }
            }
        }

        self.pending_output_ids = new_output_ids;
        any_new
    }

    fn detect_liftoff_jump(&self, hwstate: &HardwareState) -> bool {
        let prev = match self.queue.back() {
            Some(q) => &q.hwstate,
            None => return false,
        };
        let drumroll_speed_thresh = *self.drumroll_speed_thresh.borrow();
        hwstate.fingers.iter().any(|f| {
            let prev_fs = match prev.finger_by_id(f.tracking_id) {
                Some(v) => v,
                None => return false,
            };
            let pressure_drop = prev_fs.pressure - f.pressure;
            let dt = (hwstate.timestamp - prev.timestamp).max(1e-6);
            let speed = (f.dist_sq(prev_fs)).sqrt() / dt;
            pressure_drop > prev_fs.pressure * 0.5 && speed > drumroll_speed_thresh
        })
    }

    /// §4.2 step 4: synthesizes a midpoint frame when the gap to the
    /// previous queued frame is large and the finger set is unchanged.
    fn attempt_interpolation(&mut self, hwstate: &HardwareState) -> Option<HardwareState> {
        let split_min_period = *self.split_min_period.borrow();
        let back = self.queue.back()?;
        let gap = hwstate.timestamp - back.hwstate.timestamp;
        if gap <= split_min_period {
            return None;
        }
        let prev_ids: HashSet<i16> = back.hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        let cur_ids: HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        if prev_ids != cur_ids || prev_ids.is_empty() {
            return None;
        }
        let mid_ts = (back.hwstate.timestamp + hwstate.timestamp) / 2.0;
        let mut mid = back.hwstate.clone();
        mid.timestamp = mid_ts;
        for finger in &mut mid.fingers {
            if let Some(cur) = hwstate.finger_by_id(finger.tracking_id) {
                finger.x = (finger.x + cur.x) / 2.0;
                finger.y = (finger.y + cur.y) / 2.0;
                finger.pressure = (finger.pressure + cur.pressure) / 2.0;
            }
        }
        Some(mid)
    }

    fn next_due(&self) -> Option<Stime> {
        self.queue.iter().find(|q| !q.completed).map(|q| q.due)
    }

    fn flush_due(&mut self, now: Stime) -> Vec<Gesture> {
        let mut out = Vec::new();
        loop {
            let idx = match self.queue.iter().position(|q| !q.completed) {
                Some(i) => i,
                None => break,
            };
            if self.queue[idx].due > now {
                break;
            }
            let ts = self.queue[idx].hwstate.timestamp;
            let mut hwstate_copy = self.queue[idx].hwstate.clone();
            let (gestures, _) = self.base.sync_interpret_next(ts, &mut hwstate_copy);
            self.queue[idx].hwstate = hwstate_copy;
            self.queue[idx].completed = true;
            for g in gestures {
                if let Some(g) = self.filter_gesture(g) {
                    out.push(g);
                }
            }
            // Keep at least two frames around for the next frame's
            // tracking-id lookback; only trim older completed history.
            while self.queue.len() > 2 && self.queue.front().is_some_and(|q| q.completed) {
                self.queue.pop_front();
            }
        }
        out
    }

    /// §4.2 step 6: drops a slow Move/Scroll that straddles a change in the
    /// active finger set or button state, since such a gesture is almost
    /// always sensor noise rather than intended motion.
    fn filter_gesture(&mut self, gesture: Gesture) -> Option<Gesture> {
        let min_nonsuppress_speed = *self.min_nonsuppress_speed.borrow();
        let speed = match &gesture {
            Gesture::Move { start_time, end_time, dx, dy, .. }
            | Gesture::Scroll { start_time, end_time, dx, dy, .. } => {
                let dt = (end_time - start_time).max(1e-6);
                Some((dx * dx + dy * dy).sqrt() / dt)
            }
            _ => None,
        };
        if let Some(speed) = speed {
            if speed < min_nonsuppress_speed {
                let changed = self.last_two_id_sets.len() == 2
                    && (self.last_two_id_sets[0].0 != self.last_two_id_sets[1].0
                        || self.last_two_id_sets[0].1 != self.last_two_id_sets[1].1);
                if changed {
                    return None;
                }
            }
        }
        Some(gesture)
    }

    fn update_speed_history(&mut self, hwstate: &HardwareState) {
        let ids: HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        if self.last_two_id_sets.len() >= 2 {
            self.last_two_id_sets.pop_front();
        }
        self.last_two_id_sets.push_back((ids, hwstate.buttons_down));
    }
}

impl Interpreter for LookaheadFilterInterpreter {
    fn name(&self) -> &'static str {
        "LookaheadFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.skip_reassignment = hwprops.is_semi_mt || hwprops.is_haptic_pad;
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let now = hwstate.timestamp;

        // Step 2: a large backward jump flushes everything and resets.
        if let Some(back) = self.queue.back() {
            if now + 1e-9 < back.hwstate.timestamp {
                let flushed = self.flush_due(Stime::INFINITY);
                self.queue.clear();
                self.pending_output_ids.clear();
                let mut out = flushed;
                out.extend(self.sync_interpret_inner(hwstate, timeout));
                return out;
            }
        }

        self.sync_interpret_inner(hwstate, timeout)
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let mut out = self.flush_due(now);
        if self.base.should_call_next_timer(now) {
            let (gestures, _) = self.base.handle_timer_next(now);
            for g in gestures {
                if let Some(g) = self.filter_gesture(g) {
                    out.push(g);
                }
            }
        }
        *timeout = self.base.combine_timeout(now, self.next_due());
        out
    }

    fn clear(&mut self) {
        self.base.clear_next();
        self.queue.clear();
        self.pending_output_ids.clear();
        self.prev_finger_cnt = 0;
        self.last_two_id_sets.clear();
    }
}

impl LookaheadFilterInterpreter {
    fn sync_interpret_inner(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let now = hwstate.timestamp;
        let min_delay = *self.min_delay.borrow();
        let suppress_immediate_tapdown = *self.suppress_immediate_tapdown.borrow();
        let mut out = Vec::new();

        let any_new = self.assign_tracking_ids(hwstate);

        if any_new && !suppress_immediate_tapdown {
            out.push(Gesture::Fling {
                start_time: now,
                end_time: now,
                vx: 0.0,
                vy: 0.0,
                fling_state: FlingState::TapDown,
            });
        }

        if let Some(mid) = self.attempt_interpolation(hwstate) {
            let output_ids = self.queue.back().map(|q| q.output_ids.clone()).unwrap_or_default();
            self.queue.push_back(QState { due: mid.timestamp + min_delay, hwstate: mid, output_ids, completed: false });
        }

        let finger_added = hwstate.fingers.len() > self.prev_finger_cnt && self.prev_finger_cnt > 0;
        let finger_separated = hwstate.fingers.len() < self.prev_finger_cnt && self.prev_finger_cnt > 0;
        let liftoff = self.prev_finger_cnt > 0 && self.detect_liftoff_jump(hwstate);
        let extra = if finger_added || finger_separated || liftoff { self.extra_variable_delay() } else { 0.0 };

        self.prev_finger_cnt = hwstate.fingers.len();
        self.update_speed_history(hwstate);

        let output_ids = std::mem::take(&mut self.pending_output_ids);
        self.queue.push_back(QState { due: now + min_delay + extra, hwstate: hwstate.clone(), output_ids, completed: false });

        out.extend(self.flush_due(now));

        *timeout = self.base.combine_timeout(now, self.next_due());
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

    fn filt() -> LookaheadFilterInterpreter {
        let mut reg = PropRegistry::new();
        let mut f = LookaheadFilterInterpreter::new(&mut reg, Box::new(Sink));
        f.initialize(&HardwareProperties::default(), &mut Metrics::new(10), &MetricsProperties);
        f
    }

    #[test]
    fn steady_single_finger_keeps_its_tracking_id() {
        let mut f = filt();
        let mut timeout = None;
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut hs = HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, i as f64, 0.0, 50.0)]);
            f.sync_interpret(&mut hs, &mut timeout);
            ids.push(hs.fingers[0].tracking_id);
        }
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[1], ids[2]);
    }

    #[test]
    fn drumroll_reversal_assigns_a_new_tracking_id_and_sets_no_tap() {
        let mut f = filt();
        let mut timeout = None;

        let mut hs0 = HardwareState::new(0.00, vec![FingerState::new(1, 50.0, 50.0, 50.0)]);
        f.sync_interpret(&mut hs0, &mut timeout);
        let id0 = hs0.fingers[0].tracking_id;

        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 50.0, 60.0, 50.0)]);
        f.sync_interpret(&mut hs1, &mut timeout);
        let id1 = hs1.fingers[0].tracking_id;
        assert_eq!(id0, id1);

        let mut hs2 = HardwareState::new(0.02, vec![FingerState::new(1, 50.0, 5.0, 50.0)]);
        f.sync_interpret(&mut hs2, &mut timeout);
        assert_ne!(hs2.fingers[0].tracking_id, id1);
        assert!(hs2.fingers[0].flags.contains(FingerFlags::NO_TAP));
    }

    #[test]
    fn consistent_direction_quick_move_keeps_identity() {
        let mut f = filt();
        let mut timeout = None;
        let mut last_id = None;
        for (i, y) in [50.0, 60.0, 70.0, 80.0].iter().enumerate() {
            let mut hs = HardwareState::new(i as f64 * 0.01, vec![FingerState::new(1, 50.0, *y, 50.0)]);
            f.sync_interpret(&mut hs, &mut timeout);
            if let Some(prev) = last_id {
                assert_eq!(hs.fingers[0].tracking_id, prev);
            }
            last_id = Some(hs.fingers[0].tracking_id);
        }
    }

    #[test]
    fn new_contact_emits_immediate_tap_down_fling() {
        let mut f = filt();
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        let mut timeout = None;
        let gestures = f.sync_interpret(&mut hs, &mut timeout);
        assert!(gestures
            .iter()
            .any(|g| matches!(g, Gesture::Fling { fling_state: FlingState::TapDown, .. })));
    }

    #[test]
    fn quick_move_retroactively_undoes_a_previous_drumroll_split() {
        // A finger drumrolls (reverses direction sharply) for one frame,
        // then immediately resumes a fast, consistent move in the new
        // direction. The quick-move rule should detect that the "drumroll"
        // was actually the start of a swipe and restore the original id on
        // both the previous (still-queued) frame and this one.
        let mut f = filt();
        let mut timeout = None;

        let mut hs0 = HardwareState::new(0.00, vec![FingerState::new(1, 50.0, 50.0, 50.0)]);
        f.sync_interpret(&mut hs0, &mut timeout);
        let id0 = hs0.fingers[0].tracking_id;

        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 50.0, 60.0, 50.0)]);
        f.sync_interpret(&mut hs1, &mut timeout);
        let id1 = hs1.fingers[0].tracking_id;
        assert_eq!(id0, id1);

        // Sharp reversal: looks like drumroll in isolation.
        let mut hs2 = HardwareState::new(0.02, vec![FingerState::new(1, 50.0, 5.0, 50.0)]);
        f.sync_interpret(&mut hs2, &mut timeout);
        let id2 = hs2.fingers[0].tracking_id;
        assert_ne!(id2, id1);

        // Continuing fast in the same (new) direction as hs1->hs2 confirms
        // it was a swipe, not a drumroll: the id should revert to id1.
        let mut hs3 = HardwareState::new(0.03, vec![FingerState::new(1, 50.0, -40.0, 50.0)]);
        f.sync_interpret(&mut hs3, &mut timeout);
        assert_eq!(hs3.fingers[0].tracking_id, id1);
    }

    #[test]
    fn warping_finger_is_not_split_on_large_jump() {
        let mut f = filt();
        let mut timeout = None;

        let mut hs0 = HardwareState::new(0.00, vec![FingerState::new(1, 50.0, 50.0, 50.0)]);
        f.sync_interpret(&mut hs0, &mut timeout);
        let id0 = hs0.fingers[0].tracking_id;

        let mut hs1 = HardwareState::new(0.01, vec![FingerState::new(1, 50.0, 60.0, 50.0)]);
        f.sync_interpret(&mut hs1, &mut timeout);
        let id1 = hs1.fingers[0].tracking_id;
        assert_eq!(id0, id1);

        let mut warped = FingerState::new(1, 50.0, 5.0, 50.0);
        warped.flags |= FingerFlags::WARP_X | FingerFlags::WARP_Y;
        let mut hs2 = HardwareState::new(0.02, vec![warped]);
        f.sync_interpret(&mut hs2, &mut timeout);
        assert_eq!(hs2.fingers[0].tracking_id, id1);
        assert!(!hs2.fingers[0].flags.contains(FingerFlags::NO_TAP));
    }
}
