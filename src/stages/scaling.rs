//! Converts device-unit coordinates to millimetres on the way in and scales
//! gesture deltas from millimetres to screen pixels on the way out.
//!
//! Grounded on `scaling_filter_interpreter.cc`: `Initialize` derives
//! `tp_x_scale_`/`tp_y_scale_` from the reported resolution (falling back to
//! 32 device-units/mm), `ScaleTouchpadHardwareState` applies per-axis bias
//! and orientation-dependent ellipse rescaling with a major/minor swap when
//! calibration inverts their order, and `ConsumeGesture` applies the 133 DPI
//! screen scale plus the invert-scrolling toggles.

use crate::filter_base::FilterBase;
use crate::gesture_interpreter::DeviceClass;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, PropRegistry};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};

const SCREEN_DPI_BASELINE: f64 = 133.0;
const MM_PER_INCH: f64 = 25.4;

pub struct ScalingFilterInterpreter {
    base: FilterBase,

    tp_x_scale: f64,
    tp_y_scale: f64,
    tp_x_translate: f64,
    tp_y_translate: f64,
    screen_x_scale: f64,
    screen_y_scale: f64,
    orientation_scale: f64,

    invert_scrolling_and_swiping: BoundCell<bool>,
    invert_scrolling_only: BoundCell<bool>,
    surface_area_from_pressure: BoundCell<bool>,
    tp_x_bias: BoundCell<f64>,
    tp_y_bias: BoundCell<f64>,
    pressure_scale: BoundCell<f64>,
    pressure_translate: BoundCell<f64>,
    pressure_threshold: BoundCell<f64>,
    filter_low_pressure: BoundCell<bool>,
    force_touch_count_to_match_finger_count: BoundCell<bool>,
    mouse_cpi: BoundCell<f64>,

    device_mouse: bool,
    device_pointing_stick: bool,
    device_touchpad: bool,
}

impl ScalingFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>, devclass: DeviceClass) -> Self {
        let is_mouse = matches!(devclass, DeviceClass::Mouse | DeviceClass::MultitouchMouse);
        let is_pointing_stick = matches!(devclass, DeviceClass::PointingStick);
        let is_touchpad = matches!(devclass, DeviceClass::Touchpad | DeviceClass::Touchscreen | DeviceClass::MultitouchMouse);

        Self {
            base: FilterBase::new(next),
            tp_x_scale: 1.0,
            tp_y_scale: 1.0,
            tp_x_translate: 0.0,
            tp_y_translate: 0.0,
            screen_x_scale: SCREEN_DPI_BASELINE / MM_PER_INCH,
            screen_y_scale: SCREEN_DPI_BASELINE / MM_PER_INCH,
            orientation_scale: 1.0,
            invert_scrolling_and_swiping: prop_reg.bind_bool("Australian Scrolling", false),
            invert_scrolling_only: prop_reg.bind_bool("Invert Scrolling", false),
            surface_area_from_pressure: prop_reg.bind_bool("Compute Surface Area from Pressure", true),
            tp_x_bias: prop_reg.bind_double("Touchpad Device Output Bias on X-Axis", 0.0),
            tp_y_bias: prop_reg.bind_double("Touchpad Device Output Bias on Y-Axis", 0.0),
            pressure_scale: prop_reg.bind_double("Pressure Calibration Slope", 1.0),
            pressure_translate: prop_reg.bind_double("Pressure Calibration Offset", 0.0),
            pressure_threshold: prop_reg.bind_double("Pressure Minimum Threshold", 0.0),
            filter_low_pressure: prop_reg.bind_bool("Filter Low Pressure", false),
            force_touch_count_to_match_finger_count: prop_reg
                .bind_bool("Force Touch Count To Match Finger Count", false),
            mouse_cpi: prop_reg.bind_double("Mouse CPI", 1000.0),
            device_mouse: is_mouse,
            device_pointing_stick: is_pointing_stick,
            device_touchpad: is_touchpad,
        }
    }

    fn filter_low_pressure_fingers(&self, hwstate: &mut HardwareState) {
        let pressure_scale = *self.pressure_scale.borrow();
        let threshold = if pressure_scale > 0.0 && hwstate.buttons_down.is_empty() {
            (*self.pressure_threshold.borrow() - *self.pressure_translate.borrow()) / pressure_scale
        } else {
            0.0
        };
        hwstate.fingers.retain(|f| f.pressure > threshold);
        hwstate.touch_cnt = hwstate.touch_cnt.min(hwstate.fingers.len()).max(hwstate.fingers.len());
    }

    fn filter_zero_area(&self, hwstate: &mut HardwareState) {
        hwstate.fingers.retain(|f| f.pressure != 0.0);
        hwstate.touch_cnt = hwstate.touch_cnt.min(hwstate.fingers.len()).max(hwstate.fingers.len());
    }

    fn scale_mouse_hardware_state(&self, hwstate: &mut HardwareState) {
        let mouse_cpi = *self.mouse_cpi.borrow();
        hwstate.rel_x = hwstate.rel_x / mouse_cpi * MM_PER_INCH;
        hwstate.rel_y = hwstate.rel_y / mouse_cpi * MM_PER_INCH;
    }

    fn scale_touchpad_hardware_state(&self, hwstate: &mut HardwareState) {
        let surface_area_from_pressure = *self.surface_area_from_pressure.borrow();
        let pressure_threshold = *self.pressure_threshold.borrow();
        let pressure_scale = *self.pressure_scale.borrow();
        let pressure_translate = *self.pressure_translate.borrow();
        let tp_x_bias = *self.tp_x_bias.borrow();
        let tp_y_bias = *self.tp_y_bias.borrow();

        if *self.force_touch_count_to_match_finger_count.borrow() {
            hwstate.touch_cnt = hwstate.fingers.len();
        }
        if surface_area_from_pressure && (*self.filter_low_pressure.borrow() || pressure_threshold > 0.0) {
            self.filter_low_pressure_fingers(hwstate);
        }

        for finger in &mut hwstate.fingers {
            finger.x = finger.x * self.tp_x_scale + self.tp_x_translate;
            finger.y = finger.y * self.tp_y_scale + self.tp_y_translate;
            finger.orientation *= self.orientation_scale;

            let (mut cos2, mut sin2, rx2, ry2) = (0.0, 0.0, self.tp_x_scale * self.tp_x_scale, self.tp_y_scale * self.tp_y_scale);
            if finger.touch_major != 0.0 || finger.touch_minor != 0.0 {
                let c = finger.orientation.cos();
                let s = finger.orientation.sin();
                cos2 = c * c;
                sin2 = s * s;
            }
            if finger.touch_major != 0.0 {
                let bias = tp_x_bias * sin2 + tp_y_bias * cos2;
                finger.touch_major = (finger.touch_major - bias).abs() * (rx2 * sin2 + ry2 * cos2).sqrt();
            }
            if finger.touch_minor != 0.0 {
                let bias = tp_x_bias * cos2 + tp_y_bias * sin2;
                finger.touch_minor = (finger.touch_minor - bias).abs() * (rx2 * cos2 + ry2 * sin2).sqrt();
            }

            if self.orientation_scale != 0.0 && finger.touch_major < finger.touch_minor {
                std::mem::swap(&mut finger.touch_major, &mut finger.touch_minor);
                if finger.orientation > 0.0 {
                    finger.orientation -= std::f64::consts::FRAC_PI_2;
                } else {
                    finger.orientation += std::f64::consts::FRAC_PI_2;
                }
            }

            if surface_area_from_pressure {
                finger.pressure = finger.pressure * pressure_scale + pressure_translate;
            } else if finger.touch_major != 0.0 && finger.touch_minor != 0.0 {
                finger.pressure = std::f64::consts::FRAC_PI_4 * finger.touch_major * finger.touch_minor;
            } else if finger.touch_major != 0.0 {
                finger.pressure = std::f64::consts::FRAC_PI_4 * finger.touch_major * finger.touch_major;
            } else {
                finger.pressure = 0.0;
            }
            finger.pressure = finger.pressure.max(1.0);
        }

        if !surface_area_from_pressure {
            self.filter_zero_area(hwstate);
        }
    }

    fn scale_hardware_state(&self, hwstate: &mut HardwareState) {
        if self.device_touchpad {
            self.scale_touchpad_hardware_state(hwstate);
        }
        if self.device_mouse || self.device_pointing_stick {
            self.scale_mouse_hardware_state(hwstate);
        }
    }

    fn invert(&self) -> bool {
        !(*self.invert_scrolling_and_swiping.borrow() || *self.invert_scrolling_only.borrow())
    }

    fn scale_gesture(&self, gesture: Gesture) -> Gesture {
        match gesture {
            Gesture::Move { start_time, end_time, mut dx, mut dy, mut ordinal_dx, mut ordinal_dy } => {
                let mouse_cpi = *self.mouse_cpi.borrow();
                let original_rel_x = (ordinal_dx * mouse_cpi / MM_PER_INCH).round() as i64;
                let original_rel_y = (ordinal_dy * mouse_cpi / MM_PER_INCH).round() as i64;
                dx *= self.screen_x_scale;
                dy *= self.screen_y_scale;
                ordinal_dx *= self.screen_x_scale;
                ordinal_dy *= self.screen_y_scale;
                if self.device_mouse && ((original_rel_x == 0) != (original_rel_y == 0)) {
                    const MIN_PIXELS: f64 = 1.0 / 1.2;
                    if dx.abs() > MIN_PIXELS && original_rel_x.abs() == 1 {
                        let v = if dx > 0.0 { MIN_PIXELS } else { -MIN_PIXELS };
                        dx = v;
                        ordinal_dx = v;
                    }
                    if dy.abs() > MIN_PIXELS && original_rel_y.abs() == 1 {
                        let v = if dy > 0.0 { MIN_PIXELS } else { -MIN_PIXELS };
                        dy = v;
                        ordinal_dy = v;
                    }
                }
                Gesture::Move { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy }
            }
            Gesture::Scroll { start_time, end_time, mut dx, mut dy, mut ordinal_dx, mut ordinal_dy } => {
                if self.device_touchpad {
                    dx *= self.screen_x_scale;
                    dy *= self.screen_y_scale;
                    ordinal_dx *= self.screen_x_scale;
                    ordinal_dy *= self.screen_y_scale;
                }
                if self.invert() {
                    dx *= -1.0;
                    dy *= -1.0;
                    ordinal_dx *= -1.0;
                    ordinal_dy *= -1.0;
                }
                Gesture::Scroll { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy }
            }
            Gesture::MouseWheel { start_time, end_time, mut tick_120ths_dx, mut tick_120ths_dy } => {
                if self.invert() {
                    tick_120ths_dx = -tick_120ths_dx;
                    tick_120ths_dy = -tick_120ths_dy;
                }
                Gesture::MouseWheel { start_time, end_time, tick_120ths_dx, tick_120ths_dy }
            }
            Gesture::Fling { start_time, end_time, mut vx, mut vy, fling_state } => {
                vx *= self.screen_x_scale;
                vy *= self.screen_y_scale;
                if self.invert() {
                    vx *= -1.0;
                    vy *= -1.0;
                }
                Gesture::Fling { start_time, end_time, vx, vy, fling_state }
            }
            Gesture::Swipe { start_time, end_time, dx, mut dy, ordinal_dx, mut ordinal_dy } => {
                let dx = dx * self.screen_x_scale;
                let ordinal_dx = ordinal_dx * self.screen_x_scale;
                dy *= self.screen_y_scale;
                ordinal_dy *= self.screen_y_scale;
                if !*self.invert_scrolling_and_swiping.borrow() {
                    dy *= -1.0;
                    ordinal_dy *= -1.0;
                }
                Gesture::Swipe { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy }
            }
            Gesture::FourFingerSwipe { start_time, end_time, dx, mut dy, ordinal_dx, mut ordinal_dy } => {
                let dx = dx * self.screen_x_scale;
                let ordinal_dx = ordinal_dx * self.screen_x_scale;
                dy *= self.screen_y_scale;
                ordinal_dy *= self.screen_y_scale;
                if !*self.invert_scrolling_and_swiping.borrow() {
                    dy *= -1.0;
                    ordinal_dy *= -1.0;
                }
                Gesture::FourFingerSwipe { start_time, end_time, dx, dy, ordinal_dx, ordinal_dy }
            }
            other => other,
        }
    }
}

impl Interpreter for ScalingFilterInterpreter {
    fn name(&self) -> &'static str {
        "ScalingFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        let res_x = if hwprops.res_x != 0.0 { hwprops.res_x } else { 32.0 };
        let res_y = if hwprops.res_y != 0.0 { hwprops.res_y } else { 32.0 };
        self.tp_x_scale = 1.0 / res_x;
        self.tp_y_scale = 1.0 / res_y;
        self.tp_x_translate = -(hwprops.left * self.tp_x_scale);
        self.tp_y_translate = -(hwprops.top * self.tp_y_scale);
        self.screen_x_scale = SCREEN_DPI_BASELINE / MM_PER_INCH;
        self.screen_y_scale = SCREEN_DPI_BASELINE / MM_PER_INCH;
        if hwprops.orientation_maximum != 0 {
            self.orientation_scale = std::f64::consts::PI
                / (hwprops.orientation_maximum - hwprops.orientation_minimum) as f64;
        }
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        self.scale_hardware_state(hwstate);
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        *timeout = self.base.combine_timeout(now, None);
        gestures.into_iter().map(|g| self.scale_gesture(g)).collect()
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let (gestures, _) = self.base.handle_timer_next(now);
        *timeout = self.base.combine_timeout(now, None);
        gestures.into_iter().map(|g| self.scale_gesture(g)).collect()
    }

    fn clear(&mut self) {
        self.base.clear_next();
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
    fn touchpad_coordinates_rescale_to_millimeters() {
        let mut reg = PropRegistry::new();
        let mut filt = ScalingFilterInterpreter::new(&mut reg, Box::new(Sink), DeviceClass::Touchpad);
        let hwprops = HardwareProperties {
            res_x: 32.0,
            res_y: 32.0,
            ..HardwareProperties::default()
        };
        filt.initialize(&hwprops, &mut Metrics::new(10), &MetricsProperties);
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 320.0, 320.0, 50.0)]);
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!((hs.fingers[0].x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn mouse_rel_converts_cpi_to_millimeters() {
        let mut reg = PropRegistry::new();
        let mut filt = ScalingFilterInterpreter::new(&mut reg, Box::new(Sink), DeviceClass::Mouse);
        *filt.mouse_cpi.borrow_mut() = 1000.0;
        filt.initialize(&HardwareProperties::default(), &mut Metrics::new(10), &MetricsProperties);
        let mut hs = HardwareState::new(0.0, vec![]);
        hs.rel_x = 1000.0;
        let mut timeout = None;
        filt.sync_interpret(&mut hs, &mut timeout);
        assert!((hs.rel_x - 25.4).abs() < 1e-9);
    }
}
