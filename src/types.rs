//! Core data model: hardware-reported frames and the gestures derived from
//! them.
//!
//! Every type here is plain data with explicit ownership. `HardwareState`
//! borrows nothing; a stage that needs to remember one across calls must
//! clone it, which mirrors the source's "caller owns the frame, callee must
//! not retain it" rule.

use bitflags::bitflags;

/// Seconds, monotonic, double precision. Shared by both "point in time" and
/// "duration" uses, matching the data model's timestamp fields.
pub type Stime = f64;

/// A requested wake-up: `None` means no callback is wanted (the historical
/// source used a negative sentinel, `NO_DEADLINE`, for this; see the
/// redesign notes on why that sentinel does not survive the port).
pub type Timeout = Option<Stime>;

bitflags! {
    /// Per-finger flags. Each bit has exactly one meaning and none is
    /// repurposed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FingerFlags: u32 {
        const WARP_X              = 1 << 0;
        const WARP_Y              = 1 << 1;
        const WARP_X_NON_MOVE     = 1 << 2;
        const WARP_Y_NON_MOVE     = 1 << 3;
        const WARP_X_MOVE         = 1 << 4;
        const WARP_Y_MOVE         = 1 << 5;
        const WARP_X_TAP_MOVE     = 1 << 6;
        const WARP_Y_TAP_MOVE     = 1 << 7;
        const WARP_TELEPORTATION  = 1 << 8;
        const NO_TAP              = 1 << 9;
        const POSSIBLE_PALM       = 1 << 10;
        const PALM                = 1 << 11;
        const MERGE               = 1 << 12;
        const INSTANTANEOUS_MOVING = 1 << 13;
        const TREND_INC_X         = 1 << 14;
        const TREND_DEC_X         = 1 << 15;
        const TREND_INC_Y         = 1 << 16;
        const TREND_DEC_Y         = 1 << 17;
        const TREND_INC_PRESSURE  = 1 << 18;
        const TREND_DEC_PRESSURE  = 1 << 19;
        const TREND_INC_TOUCH_MAJOR = 1 << 20;
        const TREND_DEC_TOUCH_MAJOR = 1 << 21;
    }
}

bitflags! {
    /// Mouse/touchpad button bitmask, shared by `HardwareState::buttons_down`
    /// and `Gesture::ButtonsChange`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u32 {
        const LEFT   = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT  = 1 << 2;
        const BACK   = 1 << 3;
        const FORWARD = 1 << 4;
        const SIDE   = 1 << 5;
        const EXTRA  = 1 << 6;
    }
}

/// Immutable device description, set once at `initialize` and never mutated
/// afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareProperties {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub res_x: f64,
    pub res_y: f64,
    pub screen_dpi: f64,
    pub orientation_minimum: i32,
    pub orientation_maximum: i32,
    pub max_finger_cnt: usize,
    pub max_touch_cnt: usize,
    pub is_t5r2: bool,
    pub is_semi_mt: bool,
    pub is_button_pad: bool,
    pub has_wheel: bool,
    pub wheel_is_high_resolution: bool,
    pub is_haptic_pad: bool,
}

impl Default for HardwareProperties {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 1000.0,
            bottom: 1000.0,
            res_x: 32.0,
            res_y: 32.0,
            screen_dpi: 133.0,
            orientation_minimum: 0,
            orientation_maximum: 0,
            max_finger_cnt: 5,
            max_touch_cnt: 5,
            is_t5r2: false,
            is_semi_mt: false,
            is_button_pad: false,
            has_wheel: false,
            wheel_is_high_resolution: false,
            is_haptic_pad: false,
        }
    }
}

/// One contact reported in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerState {
    pub touch_major: f64,
    pub touch_minor: f64,
    pub width_major: f64,
    pub width_minor: f64,
    pub pressure: f64,
    pub orientation: f64,
    pub x: f64,
    pub y: f64,
    pub tracking_id: i16,
    pub flags: FingerFlags,
}

impl FingerState {
    pub fn new(tracking_id: i16, x: f64, y: f64, pressure: f64) -> Self {
        Self {
            touch_major: 0.0,
            touch_minor: 0.0,
            width_major: 0.0,
            width_minor: 0.0,
            pressure,
            orientation: 0.0,
            x,
            y,
            tracking_id,
            flags: FingerFlags::empty(),
        }
    }

    pub fn is_palm(&self) -> bool {
        self.flags.contains(FingerFlags::PALM)
    }

    pub fn is_possible_palm(&self) -> bool {
        self.flags.contains(FingerFlags::POSSIBLE_PALM)
    }

    pub fn no_tap(&self) -> bool {
        self.flags.contains(FingerFlags::NO_TAP)
    }

    pub fn dist_sq(&self, other: &FingerState) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// One frame: the full sensor snapshot at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HardwareState {
    pub timestamp: Stime,
    pub msc_timestamp: Stime,
    pub buttons_down: Buttons,
    pub touch_cnt: usize,
    pub fingers: Vec<FingerState>,
    pub rel_x: f64,
    pub rel_y: f64,
    pub rel_wheel: f64,
    pub rel_wheel_hi_res: f64,
    pub rel_hwheel: f64,
}

impl HardwareState {
    pub fn new(timestamp: Stime, fingers: Vec<FingerState>) -> Self {
        let touch_cnt = fingers.len();
        Self {
            timestamp,
            msc_timestamp: 0.0,
            buttons_down: Buttons::empty(),
            touch_cnt,
            fingers,
            rel_x: 0.0,
            rel_y: 0.0,
            rel_wheel: 0.0,
            rel_wheel_hi_res: 0.0,
            rel_hwheel: 0.0,
        }
    }

    pub fn finger_cnt(&self) -> usize {
        self.fingers.len()
    }

    pub fn finger_by_id(&self, tracking_id: i16) -> Option<&FingerState> {
        self.fingers.iter().find(|f| f.tracking_id == tracking_id)
    }

    pub fn finger_by_id_mut(&mut self, tracking_id: i16) -> Option<&mut FingerState> {
        self.fingers.iter_mut().find(|f| f.tracking_id == tracking_id)
    }

    /// Checks the invariant `fingers.len() == finger_cnt` and `touch_cnt >=
    /// finger_cnt`; callers in debug builds may want to assert on this, but
    /// per the error design a violation is logged and tolerated rather than
    /// panicking.
    pub fn is_self_consistent(&self) -> bool {
        self.touch_cnt >= self.fingers.len()
    }
}

/// State the fling gesture carries: whether this is the start of an inertial
/// scroll, or a synthetic stop injected by a new touch-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlingState {
    Start,
    TapDown,
}

/// A high-level event emitted upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Null,
    ContactInitiated {
        start_time: Stime,
        end_time: Stime,
    },
    Move {
        start_time: Stime,
        end_time: Stime,
        dx: f64,
        dy: f64,
        ordinal_dx: f64,
        ordinal_dy: f64,
    },
    Scroll {
        start_time: Stime,
        end_time: Stime,
        dx: f64,
        dy: f64,
        ordinal_dx: f64,
        ordinal_dy: f64,
    },
    MouseWheel {
        start_time: Stime,
        end_time: Stime,
        tick_120ths_dx: i32,
        tick_120ths_dy: i32,
    },
    Pinch {
        start_time: Stime,
        end_time: Stime,
        dz: f64,
        ordinal_dz: f64,
    },
    ButtonsChange {
        start_time: Stime,
        end_time: Stime,
        down: Buttons,
        up: Buttons,
        is_tap: bool,
    },
    Fling {
        start_time: Stime,
        end_time: Stime,
        vx: f64,
        vy: f64,
        fling_state: FlingState,
    },
    Swipe {
        start_time: Stime,
        end_time: Stime,
        dx: f64,
        dy: f64,
        ordinal_dx: f64,
        ordinal_dy: f64,
    },
    SwipeLift {
        start_time: Stime,
        end_time: Stime,
    },
    FourFingerSwipe {
        start_time: Stime,
        end_time: Stime,
        dx: f64,
        dy: f64,
        ordinal_dx: f64,
        ordinal_dy: f64,
    },
    FourFingerSwipeLift {
        start_time: Stime,
        end_time: Stime,
    },
    Metrics {
        start_time: Stime,
        end_time: Stime,
        kind: MetricsType,
        a: f64,
        b: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsType {
    MouseMovement,
    NoisyGround,
    ButtonTooLate,
}

impl Gesture {
    pub fn start_time(&self) -> Stime {
        match self {
            Gesture::Null => 0.0,
            Gesture::ContactInitiated { start_time, .. }
            | Gesture::Move { start_time, .. }
            | Gesture::Scroll { start_time, .. }
            | Gesture::MouseWheel { start_time, .. }
            | Gesture::Pinch { start_time, .. }
            | Gesture::ButtonsChange { start_time, .. }
            | Gesture::Fling { start_time, .. }
            | Gesture::Swipe { start_time, .. }
            | Gesture::SwipeLift { start_time, .. }
            | Gesture::FourFingerSwipe { start_time, .. }
            | Gesture::FourFingerSwipeLift { start_time, .. }
            | Gesture::Metrics { start_time, .. } => *start_time,
        }
    }

    pub fn end_time(&self) -> Stime {
        match self {
            Gesture::Null => 0.0,
            Gesture::ContactInitiated { end_time, .. }
            | Gesture::Move { end_time, .. }
            | Gesture::Scroll { end_time, .. }
            | Gesture::MouseWheel { end_time, .. }
            | Gesture::Pinch { end_time, .. }
            | Gesture::ButtonsChange { end_time, .. }
            | Gesture::Fling { end_time, .. }
            | Gesture::Swipe { end_time, .. }
            | Gesture::SwipeLift { end_time, .. }
            | Gesture::FourFingerSwipe { end_time, .. }
            | Gesture::FourFingerSwipeLift { end_time, .. }
            | Gesture::Metrics { end_time, .. } => *end_time,
        }
    }

    /// Shifts both timestamps by `delta`. Used by `TimestampFilter` to
    /// translate a gesture back to the host clock before it leaves the
    /// chain.
    pub fn shift_time(&mut self, delta: Stime) {
        match self {
            Gesture::Null => {}
            Gesture::ContactInitiated { start_time, end_time }
            | Gesture::Move { start_time, end_time, .. }
            | Gesture::Scroll { start_time, end_time, .. }
            | Gesture::MouseWheel { start_time, end_time, .. }
            | Gesture::Pinch { start_time, end_time, .. }
            | Gesture::ButtonsChange { start_time, end_time, .. }
            | Gesture::Fling { start_time, end_time, .. }
            | Gesture::Swipe { start_time, end_time, .. }
            | Gesture::SwipeLift { start_time, end_time }
            | Gesture::FourFingerSwipe { start_time, end_time, .. }
            | Gesture::FourFingerSwipeLift { start_time, end_time }
            | Gesture::Metrics { start_time, end_time, .. } => {
                *start_time -= delta;
                *end_time -= delta;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_state_tracks_touch_and_finger_count() {
        let hs = HardwareState::new(0.1, vec![FingerState::new(1, 0.0, 0.0, 50.0)]);
        assert_eq!(hs.finger_cnt(), 1);
        assert_eq!(hs.touch_cnt, 1);
        assert!(hs.is_self_consistent());
    }

    #[test]
    fn finger_lookup_by_id() {
        let hs = HardwareState::new(
            0.1,
            vec![FingerState::new(5, 1.0, 2.0, 10.0), FingerState::new(9, 3.0, 4.0, 10.0)],
        );
        assert_eq!(hs.finger_by_id(9).unwrap().x, 3.0);
        assert!(hs.finger_by_id(42).is_none());
    }

    #[test]
    fn gesture_shift_time_moves_both_ends() {
        let mut g = Gesture::Move {
            start_time: 1.0,
            end_time: 1.1,
            dx: 1.0,
            dy: 0.0,
            ordinal_dx: 1.0,
            ordinal_dy: 0.0,
        };
        g.shift_time(0.5);
        assert_eq!(g.start_time(), 0.5);
        assert_eq!(g.end_time(), 0.6);
    }

    #[test]
    fn flags_do_not_overlap() {
        let all = [
            FingerFlags::WARP_X,
            FingerFlags::WARP_Y,
            FingerFlags::NO_TAP,
            FingerFlags::POSSIBLE_PALM,
            FingerFlags::PALM,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert!(!a.intersects(*b));
                }
            }
        }
    }
}
