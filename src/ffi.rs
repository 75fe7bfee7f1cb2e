//! The C ABI façade (§6) for embedding hosts: an opaque handle, a
//! `repr(C)` mirror of the data model, and function-pointer provider
//! tables for the timer and property integrations a host supplies.
//!
//! Grounded on `gestures.h`'s `extern "C"` surface. Every entry point here
//! catches unwinding panics at the boundary — per the error handling
//! design, nothing inside the data path is allowed to propagate a failure
//! across an API edge, and a panic crossing an `extern "C"` boundary is
//! undefined behavior, so [`std::panic::catch_unwind`] enforces that same
//! rule for the one edge Rust's type system can't enforce on its own.

use crate::gesture_interpreter::{DeviceClass, GestureInterpreter};
use crate::types::{Buttons, FingerFlags, FingerState, Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use log::error;
use std::os::raw::c_void;
use std::panic;

/// `device_class` values accepted by [`gestures_initialize`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CDeviceClass {
    Touchpad = 0,
    Touchscreen = 1,
    Mouse = 2,
    PointingStick = 3,
    MultitouchMouse = 4,
}

impl From<CDeviceClass> for DeviceClass {
    fn from(c: CDeviceClass) -> Self {
        match c {
            CDeviceClass::Touchpad => DeviceClass::Touchpad,
            CDeviceClass::Touchscreen => DeviceClass::Touchscreen,
            CDeviceClass::Mouse => DeviceClass::Mouse,
            CDeviceClass::PointingStick => DeviceClass::PointingStick,
            CDeviceClass::MultitouchMouse => DeviceClass::MultitouchMouse,
        }
    }
}

/// `repr(C)` mirror of [`crate::types::HardwareProperties`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CHardwareProperties {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub res_x: f64,
    pub res_y: f64,
    pub screen_dpi: f64,
    pub orientation_minimum: i32,
    pub orientation_maximum: i32,
    pub max_finger_cnt: u32,
    pub max_touch_cnt: u32,
    pub is_t5r2: bool,
    pub is_semi_mt: bool,
    pub is_button_pad: bool,
    pub has_wheel: bool,
    pub wheel_is_high_resolution: bool,
    pub is_haptic_pad: bool,
}

impl From<CHardwareProperties> for HardwareProperties {
    fn from(c: CHardwareProperties) -> Self {
        Self {
            left: c.left,
            top: c.top,
            right: c.right,
            bottom: c.bottom,
            res_x: c.res_x,
            res_y: c.res_y,
            screen_dpi: c.screen_dpi,
            orientation_minimum: c.orientation_minimum,
            orientation_maximum: c.orientation_maximum,
            max_finger_cnt: c.max_finger_cnt as usize,
            max_touch_cnt: c.max_touch_cnt as usize,
            is_t5r2: c.is_t5r2,
            is_semi_mt: c.is_semi_mt,
            is_button_pad: c.is_button_pad,
            has_wheel: c.has_wheel,
            wheel_is_high_resolution: c.wheel_is_high_resolution,
            is_haptic_pad: c.is_haptic_pad,
        }
    }
}

/// `repr(C)` mirror of one [`crate::types::FingerState`]. The caller owns
/// the backing array for the duration of [`gestures_push_hardware_state`]
/// only, matching the data model's "callee must not retain" rule.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CFingerState {
    pub touch_major: f64,
    pub touch_minor: f64,
    pub width_major: f64,
    pub width_minor: f64,
    pub pressure: f64,
    pub orientation: f64,
    pub x: f64,
    pub y: f64,
    pub tracking_id: i16,
    pub flags: u32,
}

impl From<&CFingerState> for FingerState {
    fn from(c: &CFingerState) -> Self {
        let mut f = FingerState::new(c.tracking_id, c.x, c.y, c.pressure);
        f.touch_major = c.touch_major;
        f.touch_minor = c.touch_minor;
        f.width_major = c.width_major;
        f.width_minor = c.width_minor;
        f.orientation = c.orientation;
        f.flags = FingerFlags::from_bits_truncate(c.flags);
        f
    }
}

/// `repr(C)` mirror of one [`crate::types::HardwareState`] frame.
#[repr(C)]
pub struct CHardwareState {
    pub timestamp: f64,
    pub buttons_down: u32,
    pub touch_cnt: u32,
    pub finger_cnt: u32,
    pub fingers: *const CFingerState,
    pub rel_x: f64,
    pub rel_y: f64,
    pub rel_wheel: f64,
    pub rel_wheel_hi_res: f64,
    pub rel_hwheel: f64,
}

/// # Safety
/// `c.fingers` must point to at least `c.finger_cnt` valid, initialized
/// `CFingerState` values for the duration of this call.
unsafe fn hwstate_from_c(c: &CHardwareState) -> HardwareState {
    let fingers: Vec<FingerState> = if c.fingers.is_null() || c.finger_cnt == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(c.fingers, c.finger_cnt as usize)
            .iter()
            .map(FingerState::from)
            .collect()
    };
    let mut hw = HardwareState::new(c.timestamp, fingers);
    hw.buttons_down = Buttons::from_bits_truncate(c.buttons_down);
    hw.touch_cnt = c.touch_cnt as usize;
    hw.rel_x = c.rel_x;
    hw.rel_y = c.rel_y;
    hw.rel_wheel = c.rel_wheel;
    hw.rel_wheel_hi_res = c.rel_wheel_hi_res;
    hw.rel_hwheel = c.rel_hwheel;
    hw
}

/// Tag identifying which variant of [`CGesture`]'s payload is populated.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CGestureType {
    Null,
    ContactInitiated,
    Move,
    Scroll,
    MouseWheel,
    Pinch,
    ButtonsChange,
    Fling,
    Swipe,
    SwipeLift,
    FourFingerSwipe,
    FourFingerSwipeLift,
    Metrics,
}

/// A flattened, C-compatible gesture. Unused payload fields for a given
/// `kind` are zeroed, not left uninitialized.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CGesture {
    pub kind: CGestureType,
    pub start_time: f64,
    pub end_time: f64,
    pub dx: f64,
    pub dy: f64,
    pub ordinal_dx: f64,
    pub ordinal_dy: f64,
    pub tick_120ths_dx: i32,
    pub tick_120ths_dy: i32,
    pub buttons_down: u32,
    pub buttons_up: u32,
    pub is_tap: bool,
    pub fling_is_tap_down: bool,
}

impl From<Gesture> for CGesture {
    fn from(g: Gesture) -> Self {
        let mut c = CGesture {
            kind: CGestureType::Null,
            start_time: g.start_time(),
            end_time: g.end_time(),
            dx: 0.0,
            dy: 0.0,
            ordinal_dx: 0.0,
            ordinal_dy: 0.0,
            tick_120ths_dx: 0,
            tick_120ths_dy: 0,
            buttons_down: 0,
            buttons_up: 0,
            is_tap: false,
            fling_is_tap_down: false,
        };
        match g {
            Gesture::Null => c.kind = CGestureType::Null,
            Gesture::ContactInitiated { .. } => c.kind = CGestureType::ContactInitiated,
            Gesture::Move { dx, dy, ordinal_dx, ordinal_dy, .. } => {
                c.kind = CGestureType::Move;
                c.dx = dx;
                c.dy = dy;
                c.ordinal_dx = ordinal_dx;
                c.ordinal_dy = ordinal_dy;
            }
            Gesture::Scroll { dx, dy, ordinal_dx, ordinal_dy, .. } => {
                c.kind = CGestureType::Scroll;
                c.dx = dx;
                c.dy = dy;
                c.ordinal_dx = ordinal_dx;
                c.ordinal_dy = ordinal_dy;
            }
            Gesture::MouseWheel { tick_120ths_dx, tick_120ths_dy, .. } => {
                c.kind = CGestureType::MouseWheel;
                c.tick_120ths_dx = tick_120ths_dx;
                c.tick_120ths_dy = tick_120ths_dy;
            }
            Gesture::Pinch { dz, ordinal_dz, .. } => {
                c.kind = CGestureType::Pinch;
                c.dx = dz;
                c.ordinal_dx = ordinal_dz;
            }
            Gesture::ButtonsChange { down, up, is_tap, .. } => {
                c.kind = CGestureType::ButtonsChange;
                c.buttons_down = down.bits();
                c.buttons_up = up.bits();
                c.is_tap = is_tap;
            }
            Gesture::Fling { vx, vy, fling_state, .. } => {
                c.kind = CGestureType::Fling;
                c.dx = vx;
                c.dy = vy;
                c.fling_is_tap_down = matches!(fling_state, crate::types::FlingState::TapDown);
            }
            Gesture::Swipe { dx, dy, ordinal_dx, ordinal_dy, .. } => {
                c.kind = CGestureType::Swipe;
                c.dx = dx;
                c.dy = dy;
                c.ordinal_dx = ordinal_dx;
                c.ordinal_dy = ordinal_dy;
            }
            Gesture::SwipeLift { .. } => c.kind = CGestureType::SwipeLift,
            Gesture::FourFingerSwipe { dx, dy, ordinal_dx, ordinal_dy, .. } => {
                c.kind = CGestureType::FourFingerSwipe;
                c.dx = dx;
                c.dy = dy;
                c.ordinal_dx = ordinal_dx;
                c.ordinal_dy = ordinal_dy;
            }
            Gesture::FourFingerSwipeLift { .. } => c.kind = CGestureType::FourFingerSwipeLift,
            Gesture::Metrics { a, b, .. } => {
                c.kind = CGestureType::Metrics;
                c.dx = a;
                c.dy = b;
            }
        }
        c
    }
}

pub type GestureCallback = unsafe extern "C" fn(gesture: CGesture, user_data: *mut c_void);

/// Tag identifying a property's primitive kind, passed to a
/// [`CPropProvider`]'s `create` callback so the host knows what storage to
/// allocate for it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CPropKind {
    Bool,
    Int,
    Double,
    String,
    DoubleArray,
    IntArray,
}

impl From<&crate::property::PropValue> for CPropKind {
    fn from(v: &crate::property::PropValue) -> Self {
        use crate::property::PropValue;
        match v {
            PropValue::Bool(_) => CPropKind::Bool,
            PropValue::Int(_) => CPropKind::Int,
            PropValue::Double(_) => CPropKind::Double,
            PropValue::String(_) => CPropKind::String,
            PropValue::DoubleArray(_) => CPropKind::DoubleArray,
            PropValue::IntArray(_) => CPropKind::IntArray,
        }
    }
}

/// Host-supplied property provider (§6): `create` is invoked once per
/// property already registered in the chain's `PropRegistry` at the moment
/// the provider is installed, mirroring §4.8's "creation callback into the
/// host"; `register` lets the host hand a name back to acknowledge it;
/// `free` releases whatever the host allocated for `user_data`. Mirrors
/// [`CTimerProvider`]'s shape: one small function-pointer table plus
/// `user_data`, set once via [`gestures_set_prop_provider`].
#[repr(C)]
pub struct CPropProvider {
    pub create: Option<unsafe extern "C" fn(name: *const std::os::raw::c_char, kind: CPropKind, user_data: *mut c_void)>,
    pub register: Option<unsafe extern "C" fn(name: *const std::os::raw::c_char, user_data: *mut c_void)>,
    pub free: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub user_data: *mut c_void,
}

/// Host-supplied timer provider: `set` schedules a callback `timeout`
/// seconds from now; `cancel` cancels any pending one. There is exactly
/// one outstanding timer per chain (§5).
#[repr(C)]
pub struct CTimerProvider {
    pub set: Option<unsafe extern "C" fn(timeout: f64, user_data: *mut c_void)>,
    pub cancel: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub user_data: *mut c_void,
}

struct ChainHandle {
    gi: GestureInterpreter,
    callback: Option<GestureCallback>,
    callback_data: *mut c_void,
    timer: Option<CTimerProvider>,
    prop_provider: Option<CPropProvider>,
}

/// Opaque handle returned by [`gestures_new`].
pub struct GestureInterpreterHandle(ChainHandle);

fn dispatch(handle: &ChainHandle, gestures: Vec<Gesture>) {
    if let Some(cb) = handle.callback {
        for g in gestures {
            unsafe { cb(g.into(), handle.callback_data) };
        }
    }
}

fn arm_timer(handle: &ChainHandle, timeout: Timeout) {
    let Some(provider) = &handle.timer else { return };
    match timeout {
        Some(dt) => {
            if let Some(set) = provider.set {
                unsafe { set(dt, provider.user_data) };
            }
        }
        None => {
            if let Some(cancel) = provider.cancel {
                unsafe { cancel(provider.user_data) };
            }
        }
    }
}

/// Constructs a new interpreter handle. `version` must lie in `[1, 1]`;
/// any other value returns a null pointer and logs the rejected version
/// rather than constructing a handle the host can't safely drive.
///
/// # Safety
/// The returned pointer must eventually be passed to exactly one
/// [`gestures_delete`] call, and to no other function after that.
#[no_mangle]
pub unsafe extern "C" fn gestures_new(version: u32) -> *mut GestureInterpreterHandle {
    if !(1..=1).contains(&version) {
        error!("unsupported gesture interpreter version {version}");
        return std::ptr::null_mut();
    }
    let result = panic::catch_unwind(|| {
        let gi = GestureInterpreter::new(DeviceClass::Touchpad, HardwareProperties::default(), 2);
        Box::into_raw(Box::new(GestureInterpreterHandle(ChainHandle {
            gi,
            callback: None,
            callback_data: std::ptr::null_mut(),
            timer: None,
            prop_provider: None,
        })))
    });
    result.unwrap_or(std::ptr::null_mut())
}

/// Rebuilds the chain for `device_class`, discarding any chain built by a
/// previous call. Must be called before the first `push_hardware_state`.
///
/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`].
#[no_mangle]
pub unsafe extern "C" fn gestures_initialize(handle: *mut GestureInterpreterHandle, device_class: CDeviceClass) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let h = &mut (*handle).0;
        let hwprops = h.gi.hardware_properties().clone();
        h.gi = GestureInterpreter::new(device_class.into(), hwprops, 2);
        h.gi.initialize();
    }));
}

/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`].
#[no_mangle]
pub unsafe extern "C" fn gestures_set_hardware_properties(
    handle: *mut GestureInterpreterHandle,
    hwprops: CHardwareProperties,
) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        (*handle).0.gi.set_hardware_properties(hwprops.into());
    }));
}

/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`];
/// `hwstate.fingers` must point to `hwstate.finger_cnt` valid entries.
#[no_mangle]
pub unsafe extern "C" fn gestures_push_hardware_state(handle: *mut GestureInterpreterHandle, hwstate: CHardwareState) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let h = &mut (*handle).0;
        let mut hw = hwstate_from_c(&hwstate);
        let mut timeout: Timeout = None;
        let gestures = h.gi.push_hardware_state(&mut hw, &mut timeout);
        dispatch(h, gestures);
        arm_timer(h, timeout);
    }));
}

/// Drives a previously armed timer fire.
///
/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`].
#[no_mangle]
pub unsafe extern "C" fn gestures_handle_timer(handle: *mut GestureInterpreterHandle, now: Stime) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let h = &mut (*handle).0;
        let mut timeout: Timeout = None;
        let gestures = h.gi.handle_timer(now, &mut timeout);
        dispatch(h, gestures);
        arm_timer(h, timeout);
    }));
}

/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`]; `callback`
/// (if non-`None`) must remain valid to call for as long as it's
/// installed.
#[no_mangle]
pub unsafe extern "C" fn gestures_set_callback(
    handle: *mut GestureInterpreterHandle,
    callback: Option<GestureCallback>,
    user_data: *mut c_void,
) {
    if handle.is_null() {
        return;
    }
    let h = &mut (*handle).0;
    h.callback = callback;
    h.callback_data = user_data;
}

/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`].
#[no_mangle]
pub unsafe extern "C" fn gestures_set_timer_provider(handle: *mut GestureInterpreterHandle, provider: CTimerProvider) {
    if handle.is_null() {
        return;
    }
    (*handle).0.timer = Some(provider);
}

/// Installs the host's property provider and immediately calls `create`
/// for every property already registered in the chain (every property that
/// exists is registered at chain-build time, before a host can reach this
/// call, so a retroactive sweep is the only point at which `create` can
/// fire for them).
///
/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`]; if set,
/// `provider.create`/`provider.register`/`provider.free` must be valid to
/// call with `provider.user_data` for as long as the provider is installed.
#[no_mangle]
pub unsafe extern "C" fn gestures_set_prop_provider(handle: *mut GestureInterpreterHandle, provider: CPropProvider) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let h = &mut (*handle).0;
        let names: Vec<String> = h.gi.properties().names().map(|s| s.to_string()).collect();
        for name in names {
            let Some(prop) = h.gi.properties().get(&name) else { continue };
            let kind = CPropKind::from(prop.value());
            let Ok(cname) = std::ffi::CString::new(name.as_str()) else { continue };
            if let Some(create) = provider.create {
                unsafe { create(cname.as_ptr(), kind, provider.user_data) };
            }
            if let Some(register) = provider.register {
                unsafe { register(cname.as_ptr(), provider.user_data) };
            }
        }
        h.prop_provider = Some(provider);
    }));
}

/// Resets every stage in the chain to as-if-just-constructed.
///
/// # Safety
/// `handle` must be a live pointer returned by [`gestures_new`].
#[no_mangle]
pub unsafe extern "C" fn gestures_clear(handle: *mut GestureInterpreterHandle) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        (*handle).0.gi.clear();
    }));
}

/// Destroys a handle created by [`gestures_new`].
///
/// # Safety
/// `handle` must either be null or a pointer returned by [`gestures_new`]
/// that has not already been passed to this function.
#[no_mangle]
pub unsafe extern "C" fn gestures_delete(handle: *mut GestureInterpreterHandle) {
    if handle.is_null() {
        return;
    }
    let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        if let Some(provider) = &(*handle).0.prop_provider {
            if let Some(free) = provider.free {
                unsafe { free(provider.user_data) };
            }
        }
        drop(Box::from_raw(handle));
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_version() {
        let handle = unsafe { gestures_new(2) };
        assert!(handle.is_null());
    }

    #[test]
    fn full_lifecycle_push_frame_and_delete_does_not_crash() {
        unsafe {
            let handle = gestures_new(1);
            assert!(!handle.is_null());
            gestures_initialize(handle, CDeviceClass::Touchpad);

            let finger = CFingerState {
                touch_major: 0.0,
                touch_minor: 0.0,
                width_major: 0.0,
                width_minor: 0.0,
                pressure: 50.0,
                orientation: 0.0,
                x: 10.0,
                y: 10.0,
                tracking_id: 1,
                flags: 0,
            };
            let hwstate = CHardwareState {
                timestamp: 0.0,
                buttons_down: 0,
                touch_cnt: 1,
                finger_cnt: 1,
                fingers: &finger,
                rel_x: 0.0,
                rel_y: 0.0,
                rel_wheel: 0.0,
                rel_wheel_hi_res: 0.0,
                rel_hwheel: 0.0,
            };
            gestures_push_hardware_state(handle, hwstate);
            gestures_clear(handle);
            gestures_delete(handle);
        }
    }

    #[test]
    fn callback_receives_dispatched_gestures() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNT: AtomicUsize = AtomicUsize::new(0);
        unsafe extern "C" fn cb(_g: CGesture, _user_data: *mut c_void) {
            COUNT.fetch_add(1, Ordering::SeqCst);
        }
        unsafe {
            let handle = gestures_new(1);
            gestures_initialize(handle, CDeviceClass::Mouse);
            gestures_set_callback(handle, Some(cb), std::ptr::null_mut());

            let hwstate = CHardwareState {
                timestamp: 0.0,
                buttons_down: 0,
                touch_cnt: 0,
                finger_cnt: 0,
                fingers: std::ptr::null(),
                rel_x: 5.0,
                rel_y: 0.0,
                rel_wheel: 0.0,
                rel_wheel_hi_res: 0.0,
                rel_hwheel: 0.0,
            };
            gestures_push_hardware_state(handle, hwstate);
            assert!(COUNT.load(Ordering::SeqCst) > 0);
            gestures_delete(handle);
        }
    }

    #[test]
    fn prop_provider_create_fires_once_per_already_registered_property_and_free_fires_on_delete() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CREATED: AtomicUsize = AtomicUsize::new(0);
        static FREED: AtomicUsize = AtomicUsize::new(0);
        unsafe extern "C" fn create(_name: *const std::os::raw::c_char, _kind: CPropKind, _user_data: *mut c_void) {
            CREATED.fetch_add(1, Ordering::SeqCst);
        }
        unsafe extern "C" fn free(_user_data: *mut c_void) {
            FREED.fetch_add(1, Ordering::SeqCst);
        }
        unsafe {
            let handle = gestures_new(1);
            gestures_initialize(handle, CDeviceClass::Touchpad);
            let expected = (*handle).0.gi.properties().len();
            assert!(expected > 0);

            gestures_set_prop_provider(
                handle,
                CPropProvider {
                    create: Some(create),
                    register: None,
                    free: Some(free),
                    user_data: std::ptr::null_mut(),
                },
            );
            assert_eq!(CREATED.load(Ordering::SeqCst), expected);

            gestures_delete(handle);
            assert_eq!(FREED.load(Ordering::SeqCst), 1);
        }
    }
}
