//! Bounded ring buffer recording every input and output of one chain, for
//! offline replay.
//!
//! Grounded on `activity_log.h`: a fixed-capacity ring of tagged [`LogEntry`]
//! values; `HardwareState` entries own their `FingerState`s directly (this
//! port doesn't need the parallel finger-slot ring the C++ version uses to
//! avoid a second heap allocation per entry — a `Vec<FingerState>` per entry
//! is simplest and the self-contained, never-aliases-caller-memory property
//! still holds because `HardwareState` is cloned on push). `encode` produces
//! the same logical document shape (version, gesturesVersion, properties,
//! hardwareProperties, entries) using the C++ key-name constants, preserved
//! verbatim below since they're part of the replay tool's compatibility
//! contract.

use crate::property::{PropRegistry, PropValue};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime};
use serde_json::{json, Value};
use std::collections::VecDeque;

/// Compile-time ring capacity. The source picks 65536 under
/// `GESTURES_LARGE_LOGGING_BUFFER`, 8192 otherwise; we default to the small
/// size and let a host ask for the large one.
pub const SMALL_BUFFER_SIZE: usize = 8192;
pub const LARGE_BUFFER_SIZE: usize = 65536;

pub mod keys {
    pub const TYPE: &str = "type";
    pub const HARDWARE_STATE: &str = "hardwareState";
    pub const HARDWARE_STATE_PRE: &str = "hardwareStatePre";
    pub const HARDWARE_STATE_POST: &str = "hardwareStatePost";
    pub const TIMER_CALLBACK: &str = "timerCallback";
    pub const CALLBACK_REQUEST: &str = "callbackRequest";
    pub const GESTURE: &str = "gesture";
    pub const PROP_CHANGE: &str = "propChange";
    pub const METHOD_NAME: &str = "methodName";

    pub const HWSTATE_TIMESTAMP: &str = "timestamp";
    pub const HWSTATE_BUTTONS_DOWN: &str = "buttonsDown";
    pub const HWSTATE_TOUCH_CNT: &str = "touchCnt";
    pub const HWSTATE_FINGERS: &str = "fingerStates";
    pub const HWSTATE_REL_X: &str = "relX";
    pub const HWSTATE_REL_Y: &str = "relY";
    pub const HWSTATE_REL_WHEEL: &str = "relWheel";
    pub const HWSTATE_REL_HWHEEL: &str = "relHWheel";

    pub const FINGER_TOUCH_MAJOR: &str = "touchMajor";
    pub const FINGER_TOUCH_MINOR: &str = "touchMinor";
    pub const FINGER_WIDTH_MAJOR: &str = "widthMajor";
    pub const FINGER_WIDTH_MINOR: &str = "widthMinor";
    pub const FINGER_PRESSURE: &str = "pressure";
    pub const FINGER_ORIENTATION: &str = "orientation";
    pub const FINGER_POSITION_X: &str = "positionX";
    pub const FINGER_POSITION_Y: &str = "positionY";
    pub const FINGER_TRACKING_ID: &str = "trackingId";
    pub const FINGER_FLAGS: &str = "flags";

    pub const TIMER_CALLBACK_NOW: &str = "now";
    pub const CALLBACK_REQUEST_WHEN: &str = "when";

    pub const GESTURE_TYPE: &str = "gestureType";
    pub const GESTURE_START_TIME: &str = "startTime";
    pub const GESTURE_END_TIME: &str = "endTime";

    pub const PROP_CHANGE_TYPE: &str = "type";
    pub const PROP_CHANGE_NAME: &str = "name";
    pub const PROP_CHANGE_VALUE: &str = "value";

    pub const HWPROP_ROOT: &str = "hardwareProperties";
    pub const HWPROP_LEFT: &str = "left";
    pub const HWPROP_TOP: &str = "top";
    pub const HWPROP_RIGHT: &str = "right";
    pub const HWPROP_BOTTOM: &str = "bottom";
    pub const HWPROP_RES_X: &str = "resX";
    pub const HWPROP_RES_Y: &str = "resY";
    pub const HWPROP_SCREEN_DPI_X: &str = "screenDpiX";
    pub const HWPROP_SCREEN_DPI_Y: &str = "screenDpiY";
    pub const HWPROP_ORIENTATION_MIN: &str = "orientationMinimum";
    pub const HWPROP_ORIENTATION_MAX: &str = "orientationMaximum";
    pub const HWPROP_MAX_FINGER_CNT: &str = "maxFingerCount";
    pub const HWPROP_MAX_TOUCH_CNT: &str = "maxTouchCount";
    pub const HWPROP_SUPPORTS_T5R2: &str = "supportsT5R2";
    pub const HWPROP_SEMI_MT: &str = "semiMt";
    pub const HWPROP_IS_BUTTON_PAD: &str = "isButtonPad";
    pub const HWPROP_HAS_WHEEL: &str = "hasWheel";

    pub const PROPERTIES: &str = "properties";
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    HardwareState(HardwareState),
    HardwareStatePre { method: String, hwstate: HardwareState },
    HardwareStatePost { method: String, hwstate: HardwareState },
    TimerCallback(Stime),
    CallbackRequest(Stime),
    Gesture(Gesture),
    PropChange { name: String, value: PropValue },
}

/// Fixed-capacity ring buffer of [`LogEntry`]. `push` evicts the oldest
/// entry once full, matching `ResourceExhausted`'s "silently overwritten"
/// error-design kind.
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
    hwprops: HardwareProperties,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
            hwprops: HardwareProperties::default(),
        }
    }

    pub fn with_small_buffer() -> Self {
        Self::new(SMALL_BUFFER_SIZE)
    }

    pub fn with_large_buffer() -> Self {
        Self::new(LARGE_BUFFER_SIZE)
    }

    pub fn set_hardware_properties(&mut self, hwprops: HardwareProperties) {
        self.hwprops = hwprops;
    }

    fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn push_hardware_state(&mut self, hwstate: &HardwareState) {
        self.push(LogEntry::HardwareState(hwstate.clone()));
    }

    pub fn push_hardware_state_pre(&mut self, method: &str, hwstate: &HardwareState) {
        self.push(LogEntry::HardwareStatePre {
            method: method.to_string(),
            hwstate: hwstate.clone(),
        });
    }

    pub fn push_hardware_state_post(&mut self, method: &str, hwstate: &HardwareState) {
        self.push(LogEntry::HardwareStatePost {
            method: method.to_string(),
            hwstate: hwstate.clone(),
        });
    }

    pub fn push_timer_callback(&mut self, now: Stime) {
        self.push(LogEntry::TimerCallback(now));
    }

    pub fn push_callback_request(&mut self, when: Stime) {
        self.push(LogEntry::CallbackRequest(when));
    }

    pub fn push_gesture(&mut self, gesture: &Gesture) {
        self.push(LogEntry::Gesture(gesture.clone()));
    }

    pub fn push_prop_change(&mut self, name: &str, value: &PropValue) {
        self.push(LogEntry::PropChange {
            name: name.to_string(),
            value: value.clone(),
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn max_size(&self) -> usize {
        self.capacity
    }

    pub fn get_entry(&self, idx: usize) -> Option<&LogEntry> {
        self.entries.get(idx)
    }

    /// Encodes the full log as the JSON document described in the external
    /// interfaces section: `{version, gesturesVersion, properties,
    /// hardwareProperties, entries}`.
    pub fn encode(&self, props: &PropRegistry) -> Value {
        let mut entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            entries.push(encode_entry(entry));
        }
        json!({
            "version": 1,
            "gesturesVersion": env!("CARGO_PKG_VERSION"),
            keys::PROPERTIES: encode_props(props),
            keys::HWPROP_ROOT: encode_hwprops(&self.hwprops),
            "entries": entries,
        })
    }
}

fn encode_hwprops(hw: &HardwareProperties) -> Value {
    json!({
        keys::HWPROP_LEFT: hw.left,
        keys::HWPROP_TOP: hw.top,
        keys::HWPROP_RIGHT: hw.right,
        keys::HWPROP_BOTTOM: hw.bottom,
        keys::HWPROP_RES_X: hw.res_x,
        keys::HWPROP_RES_Y: hw.res_y,
        keys::HWPROP_SCREEN_DPI_X: hw.screen_dpi,
        keys::HWPROP_SCREEN_DPI_Y: hw.screen_dpi,
        keys::HWPROP_ORIENTATION_MIN: hw.orientation_minimum,
        keys::HWPROP_ORIENTATION_MAX: hw.orientation_maximum,
        keys::HWPROP_MAX_FINGER_CNT: hw.max_finger_cnt,
        keys::HWPROP_MAX_TOUCH_CNT: hw.max_touch_cnt,
        keys::HWPROP_SUPPORTS_T5R2: hw.is_t5r2,
        keys::HWPROP_SEMI_MT: hw.is_semi_mt,
        keys::HWPROP_IS_BUTTON_PAD: hw.is_button_pad,
        keys::HWPROP_HAS_WHEEL: hw.has_wheel,
    })
}

fn encode_props(props: &PropRegistry) -> Value {
    let mut map = serde_json::Map::new();
    for name in props.names() {
        if let Some(p) = props.get(name) {
            let v = match p.value() {
                PropValue::Bool(b) => json!(b),
                PropValue::Int(i) => json!(i),
                PropValue::Double(d) => json!(d),
                PropValue::String(s) => json!(s),
                PropValue::DoubleArray(a) => json!(a),
                PropValue::IntArray(a) => json!(a),
            };
            map.insert(name.to_string(), v);
        }
    }
    Value::Object(map)
}

fn encode_hwstate_common(hw: &HardwareState) -> Value {
    let fingers: Vec<Value> = hw
        .fingers
        .iter()
        .map(|f| {
            json!({
                keys::FINGER_TOUCH_MAJOR: f.touch_major,
                keys::FINGER_TOUCH_MINOR: f.touch_minor,
                keys::FINGER_WIDTH_MAJOR: f.width_major,
                keys::FINGER_WIDTH_MINOR: f.width_minor,
                keys::FINGER_PRESSURE: f.pressure,
                keys::FINGER_ORIENTATION: f.orientation,
                keys::FINGER_POSITION_X: f.x,
                keys::FINGER_POSITION_Y: f.y,
                keys::FINGER_TRACKING_ID: f.tracking_id,
                keys::FINGER_FLAGS: f.flags.bits(),
            })
        })
        .collect();
    json!({
        keys::HWSTATE_TIMESTAMP: hw.timestamp,
        keys::HWSTATE_BUTTONS_DOWN: hw.buttons_down.bits(),
        keys::HWSTATE_TOUCH_CNT: hw.touch_cnt,
        keys::HWSTATE_FINGERS: fingers,
        keys::HWSTATE_REL_X: hw.rel_x,
        keys::HWSTATE_REL_Y: hw.rel_y,
        keys::HWSTATE_REL_WHEEL: hw.rel_wheel,
        keys::HWSTATE_REL_HWHEEL: hw.rel_hwheel,
    })
}

fn encode_gesture(g: &Gesture) -> Value {
    let mut v = json!({
        keys::GESTURE_START_TIME: g.start_time(),
        keys::GESTURE_END_TIME: g.end_time(),
    });
    let obj = v.as_object_mut().unwrap();
    match g {
        Gesture::Null => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("null"));
        }
        Gesture::ContactInitiated { .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("contactInitiated"));
        }
        Gesture::Move { dx, dy, ordinal_dx, ordinal_dy, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("move"));
            obj.insert("dx".into(), json!(dx));
            obj.insert("dy".into(), json!(dy));
            obj.insert("ordinalDx".into(), json!(ordinal_dx));
            obj.insert("ordinalDy".into(), json!(ordinal_dy));
        }
        Gesture::Scroll { dx, dy, ordinal_dx, ordinal_dy, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("scroll"));
            obj.insert("dx".into(), json!(dx));
            obj.insert("dy".into(), json!(dy));
            obj.insert("ordinalDx".into(), json!(ordinal_dx));
            obj.insert("ordinalDy".into(), json!(ordinal_dy));
        }
        Gesture::MouseWheel { tick_120ths_dx, tick_120ths_dy, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("mouseWheel"));
            obj.insert("tick120dx".into(), json!(tick_120ths_dx));
            obj.insert("tick120dy".into(), json!(tick_120ths_dy));
        }
        Gesture::Pinch { dz, ordinal_dz, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("pinch"));
            obj.insert("dz".into(), json!(dz));
            obj.insert("ordinalDz".into(), json!(ordinal_dz));
        }
        Gesture::ButtonsChange { down, up, is_tap, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("buttonsChange"));
            obj.insert("down".into(), json!(down.bits()));
            obj.insert("up".into(), json!(up.bits()));
            obj.insert("isTap".into(), json!(is_tap));
        }
        Gesture::Fling { vx, vy, fling_state, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("fling"));
            obj.insert("vx".into(), json!(vx));
            obj.insert("vy".into(), json!(vy));
            obj.insert(
                "flingState".into(),
                json!(matches!(fling_state, crate::types::FlingState::TapDown)),
            );
        }
        Gesture::Swipe { dx, dy, ordinal_dx, ordinal_dy, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("swipe"));
            obj.insert("dx".into(), json!(dx));
            obj.insert("dy".into(), json!(dy));
            obj.insert("ordinalDx".into(), json!(ordinal_dx));
            obj.insert("ordinalDy".into(), json!(ordinal_dy));
        }
        Gesture::SwipeLift { .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("swipeLift"));
        }
        Gesture::FourFingerSwipe { dx, dy, ordinal_dx, ordinal_dy, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("fourFingerSwipe"));
            obj.insert("dx".into(), json!(dx));
            obj.insert("dy".into(), json!(dy));
            obj.insert("ordinalDx".into(), json!(ordinal_dx));
            obj.insert("ordinalDy".into(), json!(ordinal_dy));
        }
        Gesture::FourFingerSwipeLift { .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("fourFingerSwipeLift"));
        }
        Gesture::Metrics { kind, a, b, .. } => {
            obj.insert(keys::GESTURE_TYPE.into(), json!("metrics"));
            obj.insert("metricsType".into(), json!(format!("{:?}", kind)));
            obj.insert("data1".into(), json!(a));
            obj.insert("data2".into(), json!(b));
        }
    }
    v
}

fn encode_entry(entry: &LogEntry) -> Value {
    match entry {
        LogEntry::HardwareState(hw) => {
            let mut v = encode_hwstate_common(hw);
            v.as_object_mut()
                .unwrap()
                .insert(keys::TYPE.into(), json!(keys::HARDWARE_STATE));
            v
        }
        LogEntry::HardwareStatePre { method, hwstate } => {
            let mut v = encode_hwstate_common(hwstate);
            let obj = v.as_object_mut().unwrap();
            obj.insert(keys::TYPE.into(), json!(keys::HARDWARE_STATE_PRE));
            obj.insert(keys::METHOD_NAME.into(), json!(method));
            v
        }
        LogEntry::HardwareStatePost { method, hwstate } => {
            let mut v = encode_hwstate_common(hwstate);
            let obj = v.as_object_mut().unwrap();
            obj.insert(keys::TYPE.into(), json!(keys::HARDWARE_STATE_POST));
            obj.insert(keys::METHOD_NAME.into(), json!(method));
            v
        }
        LogEntry::TimerCallback(now) => json!({
            keys::TYPE: keys::TIMER_CALLBACK,
            keys::TIMER_CALLBACK_NOW: now,
        }),
        LogEntry::CallbackRequest(when) => json!({
            keys::TYPE: keys::CALLBACK_REQUEST,
            keys::CALLBACK_REQUEST_WHEN: when,
        }),
        LogEntry::Gesture(g) => {
            let mut v = encode_gesture(g);
            v.as_object_mut()
                .unwrap()
                .insert(keys::TYPE.into(), json!(keys::GESTURE));
            v
        }
        LogEntry::PropChange { name, value } => {
            let (type_tag, encoded) = match value {
                PropValue::Bool(b) => ("bool", json!(b)),
                PropValue::Double(d) => ("double", json!(d)),
                PropValue::Int(i) => ("int", json!(i)),
                PropValue::String(s) => ("string", json!(s)),
                PropValue::DoubleArray(a) => ("doubleArray", json!(a)),
                PropValue::IntArray(a) => ("intArray", json!(a)),
            };
            json!({
                keys::TYPE: keys::PROP_CHANGE,
                keys::PROP_CHANGE_TYPE: type_tag,
                keys::PROP_CHANGE_NAME: name,
                keys::PROP_CHANGE_VALUE: encoded,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FingerState;

    #[test]
    fn push_evicts_oldest_once_full() {
        let mut log = ActivityLog::new(2);
        log.push_timer_callback(1.0);
        log.push_timer_callback(2.0);
        log.push_timer_callback(3.0);
        assert_eq!(log.size(), 2);
        assert_eq!(log.get_entry(0), Some(&LogEntry::TimerCallback(2.0)));
        assert_eq!(log.get_entry(1), Some(&LogEntry::TimerCallback(3.0)));
    }

    #[test]
    fn clear_resets_size_to_zero() {
        let mut log = ActivityLog::new(8);
        log.push_timer_callback(1.0);
        log.clear();
        assert_eq!(log.size(), 0);
    }

    #[test]
    fn encode_round_trips_hardware_state_fields() {
        let mut log = ActivityLog::new(8);
        let hw = HardwareState::new(0.5, vec![FingerState::new(3, 10.0, 20.0, 50.0)]);
        log.push_hardware_state(&hw);
        let props = PropRegistry::new();
        let encoded = log.encode(&props);
        let entry = &encoded["entries"][0];
        assert_eq!(entry[keys::TYPE], keys::HARDWARE_STATE);
        assert_eq!(entry[keys::HWSTATE_TIMESTAMP], 0.5);
        assert_eq!(entry[keys::HWSTATE_FINGERS][0][keys::FINGER_TRACKING_ID], 3);
    }

    #[test]
    fn prop_change_idempotence_logs_one_entry_for_two_identical_writes() {
        // push_prop_change itself is a raw ring append with no notion of a
        // property's previous value; the dedup lives one layer up, in
        // PropRegistry::set, which is what a host actually calls.
        use std::cell::RefCell;
        use std::rc::Rc;

        let log = Rc::new(RefCell::new(ActivityLog::new(8)));
        let mut reg = PropRegistry::new();
        reg.attach_log(&log);
        reg.register_bool("Tap Enable", false);
        reg.set("Tap Enable", PropValue::Bool(true)).unwrap();
        reg.set("Tap Enable", PropValue::Bool(true)).unwrap();
        assert_eq!(log.borrow().size(), 1);
    }
}
