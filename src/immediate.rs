//! The terminal touchpad/touchscreen stage: the tap-to-click state machine
//! (§4.3) and the motion/scroll/pinch/swipe/fling classifier (§4.4).
//!
//! Grounded on `immediate_interpreter.h`/`.cc`. Unlike every other stage in
//! this crate, `ImmediateInterpreter` has no downstream — it is the source
//! of every gesture the rest of the chain filters, delays, or rescales.

use crate::gesture_interpreter::DeviceClass;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Buttons, FingerState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapState {
    Idle,
    FirstTapBegan,
    TapComplete,
    SubsequentTapBegan,
    Drag,
    DragRelease,
    DragRetouch,
}

#[derive(Debug, Clone, Copy)]
struct Track {
    x: f64,
    y: f64,
    timestamp: Stime,
}

#[derive(Debug, Clone, Copy)]
struct Ambiguous {
    first_x: f64,
    first_y: f64,
    frames: u32,
}

pub struct ImmediateInterpreter {
    device_class: DeviceClass,

    // tap-to-click state machine
    tap_state: TapState,
    tap_anchors: HashMap<i16, (f64, f64)>,
    tap_max_fingers: usize,
    tap_down_time: Stime,
    tap_wait_deadline: Stime,
    drag_button: Buttons,

    tap_enable: BoundCell<bool>,
    tap_paused: BoundCell<bool>,
    tap_timeout: BoundCell<f64>,
    tap_drag_timeout: BoundCell<f64>,
    tap_move_dist: BoundCell<f64>,
    tapping_finger_min_separation: BoundCell<f64>,
    motion_tap_prevent_timeout: BoundCell<f64>,
    last_key_event: Option<Stime>,

    // shared finger bookkeeping
    prev_track: HashMap<i16, Track>,
    ambiguous: HashMap<i16, Ambiguous>,
    permanently_excluded: HashSet<i16>,
    prev_real_buttons: Buttons,
    ambiguous_decision_frames: BoundCell<i32>,
    ambiguous_travel_thresh: BoundCell<f64>,
    thumb_touch_major_thresh: BoundCell<f64>,
    thumb_speed_thresh: BoundCell<f64>,

    // motion classifier
    move_min_dist: BoundCell<f64>,
    axis_snap_ratio: BoundCell<f64>,
    two_finger_scroll_enable: BoundCell<bool>,
    pinch_enable: BoundCell<bool>,
    pinch_warmup_frames: BoundCell<i32>,
    pinch_fast_speed: BoundCell<f64>,
    pinch_frames: u32,
    scroll_buffer: VecDeque<(Stime, f64, f64)>,
    fling_buffer_depth: BoundCell<i32>,
    prev_gesturing_cnt: usize,

    pending_timeout: Timeout,
}

impl ImmediateInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, device_class: DeviceClass) -> Self {
        Self {
            device_class,
            tap_state: TapState::Idle,
            tap_anchors: HashMap::new(),
            tap_max_fingers: 0,
            tap_down_time: 0.0,
            tap_wait_deadline: 0.0,
            drag_button: Buttons::empty(),
            tap_enable: prop_reg.bind_bool("Tap Enable", true),
            tap_paused: prop_reg.bind_bool("Tap Paused", false),
            tap_timeout: prop_reg.bind_double("Tap Timeout", 0.2),
            tap_drag_timeout: prop_reg.bind_double("Tap Drag Timeout", 0.7),
            tap_move_dist: prop_reg.bind_double("Tap Move Distance", 2.0),
            tapping_finger_min_separation: prop_reg.bind_double("Tapping Finger Min Separation", 10.0),
            motion_tap_prevent_timeout: prop_reg.bind_double("Motion Tap Prevent Timeout", 0.05),
            last_key_event: None,
            prev_track: HashMap::new(),
            ambiguous: HashMap::new(),
            permanently_excluded: HashSet::new(),
            prev_real_buttons: Buttons::empty(),
            ambiguous_decision_frames: prop_reg.bind_int("Ambiguous Palm Decision Frames", 3),
            ambiguous_travel_thresh: prop_reg.bind_double("Ambiguous Palm Travel Threshold", 6.0),
            thumb_touch_major_thresh: prop_reg.bind_double("Resting Thumb Touch Major Threshold", 12.0),
            thumb_speed_thresh: prop_reg.bind_double("Resting Thumb Speed Threshold", 5.0),
            move_min_dist: prop_reg.bind_double("Move Min Distance", 0.2),
            axis_snap_ratio: prop_reg.bind_double("Axis Snap Ratio", 3.0),
            two_finger_scroll_enable: prop_reg.bind_bool("Two Finger Scroll Enable", true),
            pinch_enable: prop_reg.bind_bool("Pinch Enable", true),
            pinch_warmup_frames: prop_reg.bind_int("Pinch Warmup Frames", 3),
            pinch_fast_speed: prop_reg.bind_double("Pinch Fast Separation Speed", 40.0),
            pinch_frames: 0,
            scroll_buffer: VecDeque::new(),
            fling_buffer_depth: prop_reg.bind_int("Fling Buffer Depth", 10),
            prev_gesturing_cnt: 0,
            pending_timeout: None,
        }
    }

    /// Host-driven notification that a keyboard event occurred; per §4.3,
    /// suppresses tap generation for `motion_tap_prevent_timeout` after it.
    pub fn notify_key_event(&mut self, now: Stime) {
        self.last_key_event = Some(now);
    }

    fn tap_prevented(&self, now: Stime) -> bool {
        let motion_tap_prevent_timeout = *self.motion_tap_prevent_timeout.borrow();
        self.last_key_event.map(|t| now - t < motion_tap_prevent_timeout).unwrap_or(false)
    }

    fn button_for_count(n: usize) -> Buttons {
        match n {
            1 => Buttons::LEFT,
            2 => Buttons::RIGHT,
            3 => Buttons::MIDDLE,
            _ => Buttons::RIGHT,
        }
    }

    fn reset_to_idle(&mut self) {
        self.tap_state = TapState::Idle;
        self.tap_anchors.clear();
        self.tap_max_fingers = 0;
        self.drag_button = Buttons::empty();
    }

    /// §4.4's gesturing-finger selection: drops palms, resting thumbs, and
    /// ambiguous-palm candidates still being decided; promotes or
    /// permanently excludes ambiguous contacts once their decision window
    /// elapses.
    fn resolve_motion_fingers(&mut self, hwstate: &HardwareState) -> Vec<i16> {
        let present: HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.ambiguous.retain(|id, _| present.contains(id));
        self.permanently_excluded.retain(|id| present.contains(id));
        let thumb_touch_major_thresh = *self.thumb_touch_major_thresh.borrow();
        let thumb_speed_thresh = *self.thumb_speed_thresh.borrow();
        let ambiguous_decision_frames = (*self.ambiguous_decision_frames.borrow()).max(0) as u32;
        let ambiguous_travel_thresh = *self.ambiguous_travel_thresh.borrow();

        let mut ids = Vec::new();
        for f in &hwstate.fingers {
            if f.is_palm() {
                continue;
            }

            let speed = self
                .prev_track
                .get(&f.tracking_id)
                .map(|t| {
                    let dt = (hwstate.timestamp - t.timestamp).max(1e-6);
                    ((f.x - t.x).powi(2) + (f.y - t.y).powi(2)).sqrt() / dt
                })
                .unwrap_or(0.0);

            if f.touch_major >= thumb_touch_major_thresh && speed < thumb_speed_thresh {
                continue;
            }

            if f.is_possible_palm() {
                let entry = self.ambiguous.entry(f.tracking_id).or_insert(Ambiguous {
                    first_x: f.x,
                    first_y: f.y,
                    frames: 0,
                });
                entry.frames += 1;
                let travel = ((f.x - entry.first_x).powi(2) + (f.y - entry.first_y).powi(2)).sqrt();
                if entry.frames >= ambiguous_decision_frames {
                    let excluded = travel < ambiguous_travel_thresh;
                    self.ambiguous.remove(&f.tracking_id);
                    if excluded {
                        self.permanently_excluded.insert(f.tracking_id);
                        continue;
                    }
                } else {
                    continue;
                }
            }

            if self.permanently_excluded.contains(&f.tracking_id) {
                continue;
            }
            ids.push(f.tracking_id);
        }
        ids
    }

    fn tapping_fingers(&self, hwstate: &HardwareState, motion_ids: &[i16]) -> Vec<i16> {
        let tapping_finger_min_separation = *self.tapping_finger_min_separation.borrow();
        let candidates: Vec<&FingerState> = hwstate
            .fingers
            .iter()
            .filter(|f| motion_ids.contains(&f.tracking_id) && !f.no_tap())
            .collect();

        let mut clusters: Vec<i16> = Vec::new();
        'outer: for f in &candidates {
            for &rep in &clusters {
                if let Some(r) = hwstate.finger_by_id(rep) {
                    let dx = f.x - r.x;
                    let dy = f.y - r.y;
                    if (dx * dx + dy * dy).sqrt() < tapping_finger_min_separation {
                        continue 'outer;
                    }
                }
            }
            clusters.push(f.tracking_id);
        }
        clusters
    }

    fn within_tap_move_dist(&self, hwstate: &HardwareState) -> bool {
        let tap_move_dist = *self.tap_move_dist.borrow();
        self.tap_anchors.iter().all(|(id, (ax, ay))| match hwstate.finger_by_id(*id) {
            Some(f) => {
                let dx = f.x - ax;
                let dy = f.y - ay;
                (dx * dx + dy * dy).sqrt() <= tap_move_dist
            }
            None => true,
        })
    }

    fn tap_step(&mut self, hwstate: &HardwareState, motion_ids: &[i16], now: Stime) -> Vec<Gesture> {
        if (!*self.tap_enable.borrow() || *self.tap_paused.borrow() || self.tap_prevented(now))
            && self.tap_state == TapState::Idle
        {
            return Vec::new();
        }

        let tapping_ids = self.tapping_fingers(hwstate, motion_ids);
        let tap_timeout = *self.tap_timeout.borrow();
        let tap_drag_timeout = *self.tap_drag_timeout.borrow();

        match self.tap_state {
            TapState::Idle => {
                if !tapping_ids.is_empty() {
                    self.tap_anchors = tapping_ids
                        .iter()
                        .filter_map(|id| hwstate.finger_by_id(*id).map(|f| (*id, (f.x, f.y))))
                        .collect();
                    self.tap_max_fingers = tapping_ids.len();
                    self.tap_down_time = now;
                    self.tap_state = TapState::FirstTapBegan;
                }
                Vec::new()
            }
            TapState::FirstTapBegan => {
                if tapping_ids.is_empty() {
                    if now - self.tap_down_time <= tap_timeout && self.within_tap_move_dist(hwstate) {
                        self.tap_state = TapState::TapComplete;
                        self.tap_wait_deadline = now + tap_timeout;
                    } else {
                        self.reset_to_idle();
                    }
                } else {
                    self.tap_max_fingers = self.tap_max_fingers.max(tapping_ids.len());
                    for id in &tapping_ids {
                        if !self.tap_anchors.contains_key(id) {
                            if let Some(f) = hwstate.finger_by_id(*id) {
                                self.tap_anchors.insert(*id, (f.x, f.y));
                            }
                        }
                    }
                    if now - self.tap_down_time > tap_timeout || !self.within_tap_move_dist(hwstate) {
                        self.reset_to_idle();
                    }
                }
                Vec::new()
            }
            TapState::TapComplete => {
                if !tapping_ids.is_empty() {
                    self.tap_anchors = tapping_ids
                        .iter()
                        .filter_map(|id| hwstate.finger_by_id(*id).map(|f| (*id, (f.x, f.y))))
                        .collect();
                    self.tap_state = TapState::SubsequentTapBegan;
                    self.tap_wait_deadline = now + tap_timeout;
                    Vec::new()
                } else if now >= self.tap_wait_deadline {
                    let btn = Self::button_for_count(self.tap_max_fingers);
                    self.reset_to_idle();
                    vec![Gesture::ButtonsChange { start_time: now, end_time: now, down: btn, up: btn, is_tap: true }]
                } else {
                    Vec::new()
                }
            }
            TapState::SubsequentTapBegan => {
                let moved = !self.within_tap_move_dist(hwstate);
                if tapping_ids.is_empty() {
                    // quick re-tap that already lifted: resolve the original
                    // tap as a click, no drag materialized.
                    let btn = Self::button_for_count(self.tap_max_fingers);
                    self.reset_to_idle();
                    vec![Gesture::ButtonsChange { start_time: now, end_time: now, down: btn, up: btn, is_tap: true }]
                } else if moved || now >= self.tap_wait_deadline {
                    let btn = Self::button_for_count(self.tap_max_fingers);
                    self.tap_state = TapState::Drag;
                    self.drag_button = btn;
                    vec![Gesture::ButtonsChange {
                        start_time: now,
                        end_time: now,
                        down: btn,
                        up: Buttons::empty(),
                        is_tap: true,
                    }]
                } else {
                    Vec::new()
                }
            }
            TapState::Drag => {
                if tapping_ids.is_empty() {
                    self.tap_state = TapState::DragRelease;
                    self.tap_wait_deadline = now + tap_drag_timeout;
                }
                Vec::new()
            }
            TapState::DragRelease => {
                if !tapping_ids.is_empty() {
                    self.tap_state = TapState::DragRetouch;
                } else if now >= self.tap_wait_deadline {
                    let btn = self.drag_button;
                    self.reset_to_idle();
                    return vec![Gesture::ButtonsChange {
                        start_time: now,
                        end_time: now,
                        down: Buttons::empty(),
                        up: btn,
                        is_tap: true,
                    }];
                }
                Vec::new()
            }
            TapState::DragRetouch => {
                if tapping_ids.is_empty() {
                    self.tap_state = TapState::DragRelease;
                    self.tap_wait_deadline = now + tap_drag_timeout;
                } else {
                    self.tap_state = TapState::Drag;
                }
                Vec::new()
            }
        }
    }

    fn maybe_emit_fling(&mut self, now: Stime) -> Option<Gesture> {
        if self.scroll_buffer.len() < 2 {
            self.scroll_buffer.clear();
            return None;
        }
        let t0 = self.scroll_buffer.front().unwrap().0;
        let t1 = self.scroll_buffer.back().unwrap().0;
        let dt = (t1 - t0).max(1e-6);
        let recent_enough = now - t1 < 0.1;
        let (sum_dx, sum_dy) = self
            .scroll_buffer
            .iter()
            .skip(1)
            .fold((0.0, 0.0), |(ax, ay), (_, dx, dy)| (ax + dx, ay + dy));
        self.scroll_buffer.clear();
        if !recent_enough {
            return None;
        }
        Some(Gesture::Fling {
            start_time: now,
            end_time: now,
            vx: sum_dx / dt,
            vy: sum_dy / dt,
            fling_state: crate::types::FlingState::Start,
        })
    }

    fn snap(&self, dx: f64, dy: f64) -> (f64, f64) {
        let axis_snap_ratio = *self.axis_snap_ratio.borrow();
        if dx.abs() > 1e-9 && dy.abs() / dx.abs() < 1.0 / axis_snap_ratio {
            (dx, 0.0)
        } else if dy.abs() > 1e-9 && dx.abs() / dy.abs() < 1.0 / axis_snap_ratio {
            (0.0, dy)
        } else {
            (dx, dy)
        }
    }

    fn classify_motion(&mut self, hwstate: &HardwareState, motion_ids: &[i16], now: Stime) -> Vec<Gesture> {
        let fingers: Vec<&FingerState> = motion_ids.iter().filter_map(|id| hwstate.finger_by_id(*id)).collect();
        let n = fingers.len();
        let mut out = Vec::new();
        let move_min_dist = *self.move_min_dist.borrow();
        let two_finger_scroll_enable = *self.two_finger_scroll_enable.borrow();
        let pinch_enable = *self.pinch_enable.borrow();
        let pinch_warmup_frames = (*self.pinch_warmup_frames.borrow()).max(0) as u32;
        let pinch_fast_speed = *self.pinch_fast_speed.borrow();
        let fling_buffer_depth = (*self.fling_buffer_depth.borrow()).max(0) as usize;

        if self.prev_gesturing_cnt == 3 && n < 3 {
            out.push(Gesture::SwipeLift { start_time: now, end_time: now });
        }
        if self.prev_gesturing_cnt == 4 && n < 4 {
            out.push(Gesture::FourFingerSwipeLift { start_time: now, end_time: now });
        }

        if n == 0 {
            if let Some(g) = self.maybe_emit_fling(now) {
                out.push(g);
            }
            self.pinch_frames = 0;
            self.prev_gesturing_cnt = 0;
            return out;
        }

        let deltas: Vec<(f64, f64)> = fingers
            .iter()
            .map(|f| {
                self.prev_track
                    .get(&f.tracking_id)
                    .map(|t| (f.x - t.x, f.y - t.y))
                    .unwrap_or((0.0, 0.0))
            })
            .collect();

        match n {
            1 => {
                let (dx, dy) = deltas[0];
                if (dx * dx + dy * dy).sqrt() >= move_min_dist {
                    let (dx, dy) = self.snap(dx, dy);
                    out.push(Gesture::Move { start_time: now, end_time: now, dx, dy, ordinal_dx: dx, ordinal_dy: dy });
                }
                self.scroll_buffer.clear();
                self.pinch_frames = 0;
            }
            2 => {
                let (d0x, d0y) = deltas[0];
                let (d1x, d1y) = deltas[1];
                let m0 = (d0x * d0x + d0y * d0y).sqrt();
                let m1 = (d1x * d1x + d1y * d1y).sqrt();

                if m0 < move_min_dist && m1 < move_min_dist {
                    self.pinch_frames = 0;
                } else if m0 < move_min_dist || m1 < move_min_dist {
                    // one finger anchored: treat as a single-finger move.
                    let (dx, dy) = if m0 >= m1 { (d0x, d0y) } else { (d1x, d1y) };
                    let (dx, dy) = self.snap(dx, dy);
                    out.push(Gesture::Move { start_time: now, end_time: now, dx, dy, ordinal_dx: dx, ordinal_dy: dy });
                    self.pinch_frames = 0;
                } else {
                    let dot = d0x * d1x + d0y * d1y;
                    let same_direction = dot > 0.0;

                    if same_direction && two_finger_scroll_enable {
                        let dx = (d0x + d1x) / 2.0;
                        let dy = (d0y + d1y) / 2.0;
                        let dt = (now - self.scroll_buffer.back().map(|(t, ..)| *t).unwrap_or(now)).max(1e-6);
                        self.scroll_buffer.push_back((now, dx, dy));
                        if self.scroll_buffer.len() > fling_buffer_depth {
                            self.scroll_buffer.pop_front();
                        }
                        let _ = dt;
                        out.push(Gesture::Scroll {
                            start_time: now,
                            end_time: now,
                            dx,
                            dy,
                            ordinal_dx: dx,
                            ordinal_dy: dy,
                        });
                        self.pinch_frames = 0;
                    } else if pinch_enable {
                        let f0 = fingers[0];
                        let f1 = fingers[1];
                        let prev0 = self.prev_track.get(&f0.tracking_id);
                        let prev1 = self.prev_track.get(&f1.tracking_id);
                        if let (Some(p0), Some(p1)) = (prev0, prev1) {
                            let prev_spread = ((p0.x - p1.x).powi(2) + (p0.y - p1.y).powi(2)).sqrt();
                            let cur_spread = ((f0.x - f1.x).powi(2) + (f0.y - f1.y).powi(2)).sqrt();
                            let dz = cur_spread - prev_spread;
                            let dt = (now - p0.timestamp).max(1e-6);
                            let spread_speed = dz.abs() / dt;

                            self.pinch_frames += 1;
                            let committed = spread_speed >= pinch_fast_speed || self.pinch_frames >= pinch_warmup_frames;
                            if committed && dz.abs() >= move_min_dist {
                                out.push(Gesture::Pinch { start_time: now, end_time: now, dz, ordinal_dz: dz });
                            }
                        }
                        self.scroll_buffer.clear();
                    }
                }
            }
            3 => {
                let dx = deltas.iter().map(|(x, _)| x).sum::<f64>() / 3.0;
                let dy = deltas.iter().map(|(_, y)| y).sum::<f64>() / 3.0;
                if (dx * dx + dy * dy).sqrt() >= move_min_dist {
                    out.push(Gesture::Swipe { start_time: now, end_time: now, dx, dy, ordinal_dx: dx, ordinal_dy: dy });
                }
            }
            _ => {
                let cnt = deltas.len() as f64;
                let dx = deltas.iter().map(|(x, _)| x).sum::<f64>() / cnt;
                let dy = deltas.iter().map(|(_, y)| y).sum::<f64>() / cnt;
                if (dx * dx + dy * dy).sqrt() >= move_min_dist {
                    out.push(Gesture::FourFingerSwipe {
                        start_time: now,
                        end_time: now,
                        dx,
                        dy,
                        ordinal_dx: dx,
                        ordinal_dy: dy,
                    });
                }
            }
        }

        self.prev_gesturing_cnt = n;
        out
    }

    fn update_tracks(&mut self, hwstate: &HardwareState) {
        let present: HashSet<i16> = hwstate.fingers.iter().map(|f| f.tracking_id).collect();
        self.prev_track.retain(|id, _| present.contains(id));
        for f in &hwstate.fingers {
            self.prev_track.insert(f.tracking_id, Track { x: f.x, y: f.y, timestamp: hwstate.timestamp });
        }
    }
}

impl Interpreter for ImmediateInterpreter {
    fn name(&self) -> &'static str {
        "ImmediateInterpreter"
    }

    fn initialize(&mut self, _hwprops: &HardwareProperties, _metrics: &mut Metrics, _mprops: &MetricsProperties) {}

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let now = hwstate.timestamp;
        let mut out = Vec::new();

        let real_down = hwstate.buttons_down & !self.prev_real_buttons;
        let real_up = self.prev_real_buttons & !hwstate.buttons_down;
        if !real_down.is_empty() || !real_up.is_empty() {
            out.push(Gesture::ButtonsChange { start_time: now, end_time: now, down: real_down, up: real_up, is_tap: false });
            if self.tap_state == TapState::Idle {
                self.reset_to_idle();
            } else {
                self.reset_to_idle();
            }
        }
        self.prev_real_buttons = hwstate.buttons_down;

        let motion_ids = self.resolve_motion_fingers(hwstate);

        out.extend(self.tap_step(hwstate, &motion_ids, now));
        out.extend(self.classify_motion(hwstate, &motion_ids, now));

        self.update_tracks(hwstate);

        *timeout = if self.tap_state != TapState::Idle { Some(0.05) } else { None };
        out
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        // Timer fires just re-run the tap machine against the last-seen
        // finger set (no new frame arrived, so nothing moved).
        let empty = HardwareState::new(now, Vec::new());
        let out = self.tap_step(&empty, &[], now);
        *timeout = if self.tap_state != TapState::Idle { Some(0.05) } else { None };
        out
    }

    fn clear(&mut self) {
        self.reset_to_idle();
        self.prev_track.clear();
        self.ambiguous.clear();
        self.permanently_excluded.clear();
        self.prev_real_buttons = Buttons::empty();
        self.scroll_buffer.clear();
        self.pinch_frames = 0;
        self.prev_gesturing_cnt = 0;
        self.pending_timeout = None;
    }
}
