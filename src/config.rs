//! Bulk property-default bootstrap.
//!
//! A host that wants to override compiled-in tunables in one place — a
//! config file — rather than calling [`crate::property::PropRegistry::set`]
//! once per property, loads a [`PropertyDefaults`] from JSON and applies it
//! to a registry right after [`crate::gesture_interpreter::GestureInterpreter::new`]
//! builds the chain (every property named here must already be registered
//! by a stage's constructor; [`PropertyDefaults::apply_to`] skips, and logs,
//! any name the chain in use didn't register).
//!
//! This is deliberately *not* an application-level config — there is no
//! socket path, no IPC transport, no visualizer timing here, only the same
//! named tunables a stage would otherwise hardcode as its own `register_*`
//! default.
//!
//! # Example
//!
//! ```json
//! {
//!   "tap_enable": true,
//!   "tap_timeout": 0.15,
//!   "sensitivity": 5
//! }
//! ```

use crate::property::{PropRegistry, PropValue};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Compiled-in defaults for every property a stage registers, expressed the
/// way a host's config file overrides them. Every field is optional; a
/// minimal `{}` file changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyDefaults {
    // immediate.rs (ImmediateInterpreter) — tap-to-click + motion classifier
    #[serde(rename = "Tap Enable")]
    pub tap_enable: bool,
    #[serde(rename = "Tap Paused")]
    pub tap_paused: bool,
    #[serde(rename = "Tap Timeout")]
    pub tap_timeout: f64,
    #[serde(rename = "Tap Drag Timeout")]
    pub tap_drag_timeout: f64,
    #[serde(rename = "Tap Move Distance")]
    pub tap_move_distance: f64,
    #[serde(rename = "Tapping Finger Min Separation")]
    pub tapping_finger_min_separation: f64,
    #[serde(rename = "Motion Tap Prevent Timeout")]
    pub motion_tap_prevent_timeout: f64,
    #[serde(rename = "Move Min Distance")]
    pub move_min_distance: f64,
    #[serde(rename = "Axis Snap Ratio")]
    pub axis_snap_ratio: f64,
    #[serde(rename = "Two Finger Scroll Enable")]
    pub two_finger_scroll_enable: bool,
    #[serde(rename = "Pinch Enable")]
    pub pinch_enable: bool,
    #[serde(rename = "Pinch Warmup Frames")]
    pub pinch_warmup_frames: i32,
    #[serde(rename = "Pinch Fast Separation Speed")]
    pub pinch_fast_separation_speed: f64,
    #[serde(rename = "Fling Buffer Depth")]
    pub fling_buffer_depth: i32,
    #[serde(rename = "Ambiguous Palm Decision Frames")]
    pub ambiguous_palm_decision_frames: i32,
    #[serde(rename = "Ambiguous Palm Travel Threshold")]
    pub ambiguous_palm_travel_threshold: f64,
    #[serde(rename = "Resting Thumb Touch Major Threshold")]
    pub resting_thumb_touch_major_threshold: f64,
    #[serde(rename = "Resting Thumb Speed Threshold")]
    pub resting_thumb_speed_threshold: f64,

    // stages/accel.rs
    #[serde(rename = "Pointer Acceleration Enable")]
    pub pointer_acceleration_enable: bool,
    #[serde(rename = "Pointer Accel Min Speed")]
    pub pointer_accel_min_speed: f64,
    #[serde(rename = "Pointer Accel Max Speed")]
    pub pointer_accel_max_speed: f64,
    #[serde(rename = "Pointer Accel Min Gain")]
    pub pointer_accel_min_gain: f64,
    #[serde(rename = "Pointer Accel Max Gain")]
    pub pointer_accel_max_gain: f64,

    // stages/box_filter.rs
    #[serde(rename = "Box Width")]
    pub box_width: f64,
    #[serde(rename = "Box Height")]
    pub box_height: f64,

    // stages/click_wiggle.rs
    #[serde(rename = "Click Wiggle Enable")]
    pub click_wiggle_enable: bool,
    #[serde(rename = "Click Wiggle Max Distance")]
    pub click_wiggle_max_distance: f64,
    #[serde(rename = "Click Wiggle Timeout")]
    pub click_wiggle_timeout: f64,

    // stages/finger_merge.rs
    #[serde(rename = "Merge Max Distance")]
    pub merge_max_distance: f64,
    #[serde(rename = "Merge Min Frames")]
    pub merge_min_frames: i32,

    // stages/fling_stop.rs
    #[serde(rename = "Fling Stop Timeout")]
    pub fling_stop_timeout: f64,
    #[serde(rename = "Fling Stop Extra Delay")]
    pub fling_stop_extra_delay: f64,

    // stages/haptic_button.rs
    #[serde(rename = "Haptic Button Generation Enable")]
    pub haptic_button_generation_enable: bool,
    #[serde(rename = "Haptic Button Sensitivity")]
    pub haptic_button_sensitivity: i32,
    #[serde(rename = "Haptic Button Use Custom Thresholds")]
    pub haptic_button_use_custom_thresholds: bool,
    #[serde(rename = "Haptic Button Use Dynamic Thresholds")]
    pub haptic_button_use_dynamic_thresholds: bool,
    #[serde(rename = "Haptic Button Dynamic Down Ratio")]
    pub haptic_button_dynamic_down_ratio: f64,
    #[serde(rename = "Haptic Button Dynamic Up Ratio")]
    pub haptic_button_dynamic_up_ratio: f64,
    #[serde(rename = "Haptic Button Max Dynamic Up Force")]
    pub haptic_button_max_dynamic_up_force: f64,
    #[serde(rename = "Haptic Button Release Suppress Factor")]
    pub haptic_button_release_suppress_factor: f64,
    #[serde(rename = "Haptic Button Complete Release Suppress Speed")]
    pub haptic_button_complete_release_suppress_speed: f64,

    // stages/iir.rs (v1 stack only)
    #[serde(rename = "Iir Alpha")]
    pub iir_alpha: f64,
    #[serde(rename = "Iir Jump Threshold")]
    pub iir_jump_threshold: f64,

    // stages/logging.rs
    #[serde(rename = "Event Logging Enable")]
    pub event_logging_enable: bool,
    #[serde(rename = "Log Path")]
    pub log_path: String,
    #[serde(rename = "Integrated Touchpad")]
    pub integrated_touchpad: bool,

    // stages/lookahead.rs
    #[serde(rename = "Lookahead Min Delay")]
    pub lookahead_min_delay: f64,
    #[serde(rename = "Lookahead Max Delay")]
    pub lookahead_max_delay: f64,
    #[serde(rename = "Lookahead Quick Move Threshold")]
    pub lookahead_quick_move_threshold: f64,
    #[serde(rename = "Lookahead Drumroll Speed Threshold")]
    pub lookahead_drumroll_speed_threshold: f64,
    #[serde(rename = "Lookahead Drumroll Max Speed Ratio")]
    pub lookahead_drumroll_max_speed_ratio: f64,
    #[serde(rename = "Lookahead Co-Move Ratio")]
    pub lookahead_co_move_ratio: f64,
    #[serde(rename = "Lookahead Split Min Period")]
    pub lookahead_split_min_period: f64,
    #[serde(rename = "Lookahead Min Nonsuppress Speed")]
    pub lookahead_min_nonsuppress_speed: f64,
    #[serde(rename = "Lookahead Suppress Immediate Tapdown")]
    pub lookahead_suppress_immediate_tapdown: bool,

    // stages/metrics_filter.rs
    #[serde(rename = "Noisy Ground Distance Threshold")]
    pub noisy_ground_distance_threshold: f64,
    #[serde(rename = "Noisy Ground Time Threshold")]
    pub noisy_ground_time_threshold: f64,
    #[serde(rename = "Mouse Moving Time Threshold")]
    pub mouse_moving_time_threshold: f64,
    #[serde(rename = "Mouse Control Warmup Sessions")]
    pub mouse_control_warmup_sessions: i32,

    // stages/palm_classifying.rs
    #[serde(rename = "Palm Pressure")]
    pub palm_pressure: f64,
    #[serde(rename = "Palm Width")]
    pub palm_width: f64,
    #[serde(rename = "Multiple Palm Width")]
    pub multiple_palm_width: f64,
    #[serde(rename = "Fat Finger Pressure Ratio")]
    pub fat_finger_pressure_ratio: f64,
    #[serde(rename = "Fat Finger Width Ratio")]
    pub fat_finger_width_ratio: f64,
    #[serde(rename = "Fat Finger Min Travel")]
    pub fat_finger_min_travel: f64,
    #[serde(rename = "Palm Edge Zone Min Width")]
    pub palm_edge_zone_min_width: f64,
    #[serde(rename = "Palm Edge Zone Width")]
    pub palm_edge_zone_width: f64,
    #[serde(rename = "Palm Eval Timeout")]
    pub palm_eval_timeout: f64,
    #[serde(rename = "Palm Stationary Time")]
    pub palm_stationary_time: f64,
    #[serde(rename = "Palm Stationary Distance")]
    pub palm_stationary_distance: f64,

    // stages/scaling.rs
    #[serde(rename = "Australian Scrolling")]
    pub australian_scrolling: bool,
    #[serde(rename = "Invert Scrolling")]
    pub invert_scrolling: bool,
    #[serde(rename = "Compute Surface Area from Pressure")]
    pub compute_surface_area_from_pressure: bool,
    #[serde(rename = "Pressure Calibration Slope")]
    pub pressure_calibration_slope: f64,
    #[serde(rename = "Pressure Calibration Offset")]
    pub pressure_calibration_offset: f64,
    #[serde(rename = "Pressure Minimum Threshold")]
    pub pressure_minimum_threshold: f64,
    #[serde(rename = "Filter Low Pressure")]
    pub filter_low_pressure: bool,
    #[serde(rename = "Force Touch Count To Match Finger Count")]
    pub force_touch_count_to_match_finger_count: bool,
    #[serde(rename = "Mouse CPI")]
    pub mouse_cpi: f64,

    // stages/sensor_jump.rs (v1 stack only)
    #[serde(rename = "Sensor Jump Speed Ratio")]
    pub sensor_jump_speed_ratio: f64,
    #[serde(rename = "Sensor Jump Minimum Speed")]
    pub sensor_jump_minimum_speed: f64,

    // stages/split_correcting.rs (v1 stack only)
    #[serde(rename = "Split Correct Max Distance")]
    pub split_correct_max_distance: f64,
    #[serde(rename = "Split Correct Min Frames")]
    pub split_correct_min_frames: i32,

    // stages/stationary_wiggle.rs
    #[serde(rename = "Wiggle Moving Energy Threshold")]
    pub wiggle_moving_energy_threshold: f64,
    #[serde(rename = "Wiggle Stationary Energy Threshold")]
    pub wiggle_stationary_energy_threshold: f64,
    #[serde(rename = "Wiggle Energy Decay")]
    pub wiggle_energy_decay: f64,

    // stages/t5r2.rs (v1 stack only)
    #[serde(rename = "T5R2 Touch Count Correct Enabled")]
    pub t5r2_touch_count_correct_enabled: bool,

    // stages/trend_classifying.rs
    #[serde(rename = "Trend Classifying Filter Enabled")]
    pub trend_classifying_filter_enabled: bool,
    #[serde(rename = "Trend Classifying 2nd-order Motion Enabled")]
    pub trend_classifying_2nd_order_motion_enabled: bool,
    #[serde(rename = "Trend Classifying Min Num of Samples")]
    pub trend_classifying_min_num_of_samples: i32,
    #[serde(rename = "Trend Classifying Num of Samples")]
    pub trend_classifying_num_of_samples: i32,
    #[serde(rename = "Trend Classifying Z Threshold")]
    pub trend_classifying_z_threshold: f64,

    // mouse.rs / multitouch_mouse.rs
    #[serde(rename = "Wheel Tick 120ths")]
    pub wheel_tick_120ths: i32,
}

impl Default for PropertyDefaults {
    fn default() -> Self {
        Self {
            tap_enable: true,
            tap_paused: false,
            tap_timeout: 0.2,
            tap_drag_timeout: 0.7,
            tap_move_distance: 2.0,
            tapping_finger_min_separation: 10.0,
            motion_tap_prevent_timeout: 0.05,
            move_min_distance: 0.2,
            axis_snap_ratio: 3.0,
            two_finger_scroll_enable: true,
            pinch_enable: true,
            pinch_warmup_frames: 3,
            pinch_fast_separation_speed: 40.0,
            fling_buffer_depth: 10,
            ambiguous_palm_decision_frames: 3,
            ambiguous_palm_travel_threshold: 6.0,
            resting_thumb_touch_major_threshold: 12.0,
            resting_thumb_speed_threshold: 5.0,

            pointer_acceleration_enable: true,
            pointer_accel_min_speed: 10.0,
            pointer_accel_max_speed: 1000.0,
            pointer_accel_min_gain: 1.0,
            pointer_accel_max_gain: 3.0,

            box_width: 0.0,
            box_height: 0.0,

            click_wiggle_enable: true,
            click_wiggle_max_distance: 10.0,
            click_wiggle_timeout: 0.05,

            merge_max_distance: 4.0,
            merge_min_frames: 3,

            fling_stop_timeout: 0.03,
            fling_stop_extra_delay: 0.055,

            haptic_button_generation_enable: true,
            haptic_button_sensitivity: 3,
            haptic_button_use_custom_thresholds: false,
            haptic_button_use_dynamic_thresholds: false,
            haptic_button_dynamic_down_ratio: 1.0,
            haptic_button_dynamic_up_ratio: 0.9,
            haptic_button_max_dynamic_up_force: 40.0,
            haptic_button_release_suppress_factor: 0.8,
            haptic_button_complete_release_suppress_speed: 1.0,

            iir_alpha: 0.35,
            iir_jump_threshold: 15.0,

            event_logging_enable: false,
            log_path: "/var/log/xorg/touchpad_activity_log.txt".to_string(),
            integrated_touchpad: false,

            lookahead_min_delay: 0.0,
            lookahead_max_delay: 0.09,
            lookahead_quick_move_threshold: 3.0,
            lookahead_drumroll_speed_threshold: 400.0,
            lookahead_drumroll_max_speed_ratio: 2.5,
            lookahead_co_move_ratio: 0.5,
            lookahead_split_min_period: 0.021,
            lookahead_min_nonsuppress_speed: 200.0,
            lookahead_suppress_immediate_tapdown: false,

            noisy_ground_distance_threshold: 0.2,
            noisy_ground_time_threshold: 0.1,
            mouse_moving_time_threshold: 0.5,
            mouse_control_warmup_sessions: 5,

            palm_pressure: 150.0,
            palm_width: 18.0,
            multiple_palm_width: 15.0,
            fat_finger_pressure_ratio: 0.8,
            fat_finger_width_ratio: 0.8,
            fat_finger_min_travel: 10.0,
            palm_edge_zone_min_width: 5.0,
            palm_edge_zone_width: 14.0,
            palm_eval_timeout: 0.1,
            palm_stationary_time: 0.1,
            palm_stationary_distance: 2.0,

            australian_scrolling: false,
            invert_scrolling: false,
            compute_surface_area_from_pressure: true,
            pressure_calibration_slope: 1.0,
            pressure_calibration_offset: 0.0,
            pressure_minimum_threshold: 0.0,
            filter_low_pressure: false,
            force_touch_count_to_match_finger_count: false,
            mouse_cpi: 1000.0,

            sensor_jump_speed_ratio: 4.0,
            sensor_jump_minimum_speed: 200.0,

            split_correct_max_distance: 5.0,
            split_correct_min_frames: 2,

            wiggle_moving_energy_threshold: 1.0,
            wiggle_stationary_energy_threshold: 0.2,
            wiggle_energy_decay: 0.9,

            t5r2_touch_count_correct_enabled: true,

            trend_classifying_filter_enabled: true,
            trend_classifying_2nd_order_motion_enabled: false,
            trend_classifying_min_num_of_samples: 6,
            trend_classifying_num_of_samples: 20,
            trend_classifying_z_threshold: 2.5758293035489004,

            wheel_tick_120ths: 120,
        }
    }
}

impl PropertyDefaults {
    /// Loads overrides from a JSON file at `path`. Missing keys fall back
    /// to the compiled-in default shown by [`Default::default`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents).map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Writes every field into `reg`. A name the built chain never
    /// registered (e.g. a v1-only property against a v2 chain) is logged
    /// and skipped rather than treated as an error — the chain shape, not
    /// this file, is authoritative about which properties exist.
    pub fn apply_to(&self, reg: &mut PropRegistry) {
        let mut set_bool = |name: &str, v: bool| {
            if reg.set(name, PropValue::Bool(v)).is_err() {
                warn!("property {name:?} not registered by this chain, skipping default override");
            }
        };
        set_bool("Tap Enable", self.tap_enable);
        set_bool("Tap Paused", self.tap_paused);
        set_bool("Two Finger Scroll Enable", self.two_finger_scroll_enable);
        set_bool("Pinch Enable", self.pinch_enable);
        set_bool("Pointer Acceleration Enable", self.pointer_acceleration_enable);
        set_bool("Click Wiggle Enable", self.click_wiggle_enable);
        set_bool("Haptic Button Generation Enable", self.haptic_button_generation_enable);
        set_bool("Haptic Button Use Custom Thresholds", self.haptic_button_use_custom_thresholds);
        set_bool("Haptic Button Use Dynamic Thresholds", self.haptic_button_use_dynamic_thresholds);
        set_bool("Event Logging Enable", self.event_logging_enable);
        set_bool("Integrated Touchpad", self.integrated_touchpad);
        set_bool("Lookahead Suppress Immediate Tapdown", self.lookahead_suppress_immediate_tapdown);
        set_bool("Australian Scrolling", self.australian_scrolling);
        set_bool("Invert Scrolling", self.invert_scrolling);
        set_bool("Compute Surface Area from Pressure", self.compute_surface_area_from_pressure);
        set_bool("Filter Low Pressure", self.filter_low_pressure);
        set_bool(
            "Force Touch Count To Match Finger Count",
            self.force_touch_count_to_match_finger_count,
        );
        set_bool("T5R2 Touch Count Correct Enabled", self.t5r2_touch_count_correct_enabled);
        set_bool("Trend Classifying Filter Enabled", self.trend_classifying_filter_enabled);
        set_bool(
            "Trend Classifying 2nd-order Motion Enabled",
            self.trend_classifying_2nd_order_motion_enabled,
        );
        drop(set_bool);

        let mut set_double = |name: &str, v: f64| {
            if reg.set(name, PropValue::Double(v)).is_err() {
                warn!("property {name:?} not registered by this chain, skipping default override");
            }
        };
        set_double("Tap Timeout", self.tap_timeout);
        set_double("Tap Drag Timeout", self.tap_drag_timeout);
        set_double("Tap Move Distance", self.tap_move_distance);
        set_double("Tapping Finger Min Separation", self.tapping_finger_min_separation);
        set_double("Motion Tap Prevent Timeout", self.motion_tap_prevent_timeout);
        set_double("Move Min Distance", self.move_min_distance);
        set_double("Axis Snap Ratio", self.axis_snap_ratio);
        set_double("Pinch Fast Separation Speed", self.pinch_fast_separation_speed);
        set_double("Ambiguous Palm Travel Threshold", self.ambiguous_palm_travel_threshold);
        set_double("Resting Thumb Touch Major Threshold", self.resting_thumb_touch_major_threshold);
        set_double("Resting Thumb Speed Threshold", self.resting_thumb_speed_threshold);
        set_double("Pointer Accel Min Speed", self.pointer_accel_min_speed);
        set_double("Pointer Accel Max Speed", self.pointer_accel_max_speed);
        set_double("Pointer Accel Min Gain", self.pointer_accel_min_gain);
        set_double("Pointer Accel Max Gain", self.pointer_accel_max_gain);
        set_double("Box Width", self.box_width);
        set_double("Box Height", self.box_height);
        set_double("Click Wiggle Max Distance", self.click_wiggle_max_distance);
        set_double("Click Wiggle Timeout", self.click_wiggle_timeout);
        set_double("Merge Max Distance", self.merge_max_distance);
        set_double("Fling Stop Timeout", self.fling_stop_timeout);
        set_double("Fling Stop Extra Delay", self.fling_stop_extra_delay);
        set_double("Haptic Button Dynamic Down Ratio", self.haptic_button_dynamic_down_ratio);
        set_double("Haptic Button Dynamic Up Ratio", self.haptic_button_dynamic_up_ratio);
        set_double("Haptic Button Max Dynamic Up Force", self.haptic_button_max_dynamic_up_force);
        set_double("Haptic Button Release Suppress Factor", self.haptic_button_release_suppress_factor);
        set_double(
            "Haptic Button Complete Release Suppress Speed",
            self.haptic_button_complete_release_suppress_speed,
        );
        set_double("Iir Alpha", self.iir_alpha);
        set_double("Iir Jump Threshold", self.iir_jump_threshold);
        set_double("Lookahead Min Delay", self.lookahead_min_delay);
        set_double("Lookahead Max Delay", self.lookahead_max_delay);
        set_double("Lookahead Quick Move Threshold", self.lookahead_quick_move_threshold);
        set_double("Lookahead Drumroll Speed Threshold", self.lookahead_drumroll_speed_threshold);
        set_double("Lookahead Drumroll Max Speed Ratio", self.lookahead_drumroll_max_speed_ratio);
        set_double("Lookahead Co-Move Ratio", self.lookahead_co_move_ratio);
        set_double("Lookahead Split Min Period", self.lookahead_split_min_period);
        set_double("Lookahead Min Nonsuppress Speed", self.lookahead_min_nonsuppress_speed);
        set_double("Noisy Ground Distance Threshold", self.noisy_ground_distance_threshold);
        set_double("Noisy Ground Time Threshold", self.noisy_ground_time_threshold);
        set_double("Mouse Moving Time Threshold", self.mouse_moving_time_threshold);
        set_double("Palm Pressure", self.palm_pressure);
        set_double("Palm Width", self.palm_width);
        set_double("Multiple Palm Width", self.multiple_palm_width);
        set_double("Fat Finger Pressure Ratio", self.fat_finger_pressure_ratio);
        set_double("Fat Finger Width Ratio", self.fat_finger_width_ratio);
        set_double("Fat Finger Min Travel", self.fat_finger_min_travel);
        set_double("Palm Edge Zone Min Width", self.palm_edge_zone_min_width);
        set_double("Palm Edge Zone Width", self.palm_edge_zone_width);
        set_double("Palm Eval Timeout", self.palm_eval_timeout);
        set_double("Palm Stationary Time", self.palm_stationary_time);
        set_double("Palm Stationary Distance", self.palm_stationary_distance);
        set_double("Pressure Calibration Slope", self.pressure_calibration_slope);
        set_double("Pressure Calibration Offset", self.pressure_calibration_offset);
        set_double("Pressure Minimum Threshold", self.pressure_minimum_threshold);
        set_double("Mouse CPI", self.mouse_cpi);
        set_double("Sensor Jump Speed Ratio", self.sensor_jump_speed_ratio);
        set_double("Sensor Jump Minimum Speed", self.sensor_jump_minimum_speed);
        set_double("Split Correct Max Distance", self.split_correct_max_distance);
        set_double("Wiggle Moving Energy Threshold", self.wiggle_moving_energy_threshold);
        set_double("Wiggle Stationary Energy Threshold", self.wiggle_stationary_energy_threshold);
        set_double("Wiggle Energy Decay", self.wiggle_energy_decay);
        set_double("Trend Classifying Z Threshold", self.trend_classifying_z_threshold);
        drop(set_double);

        let mut set_int = |name: &str, v: i32| {
            if reg.set(name, PropValue::Int(v)).is_err() {
                warn!("property {name:?} not registered by this chain, skipping default override");
            }
        };
        set_int("Pinch Warmup Frames", self.pinch_warmup_frames);
        set_int("Fling Buffer Depth", self.fling_buffer_depth);
        set_int("Ambiguous Palm Decision Frames", self.ambiguous_palm_decision_frames);
        set_int("Merge Min Frames", self.merge_min_frames);
        set_int("Haptic Button Sensitivity", self.haptic_button_sensitivity);
        set_int("Mouse Control Warmup Sessions", self.mouse_control_warmup_sessions);
        set_int("Split Correct Min Frames", self.split_correct_min_frames);
        set_int("Trend Classifying Min Num of Samples", self.trend_classifying_min_num_of_samples);
        set_int("Trend Classifying Num of Samples", self.trend_classifying_num_of_samples);
        set_int("Wheel Tick 120ths", self.wheel_tick_120ths);
        drop(set_int);

        if reg.set("Log Path", PropValue::String(self.log_path.clone())).is_err() {
            warn!("property \"Log Path\" not registered by this chain, skipping default override");
        }
    }
}

/// Error from loading or parsing a [`PropertyDefaults`] file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture_interpreter::{DeviceClass, GestureInterpreter};
    use crate::types::HardwareProperties;

    #[test]
    fn empty_json_yields_compiled_in_defaults() {
        let defaults: PropertyDefaults = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, PropertyDefaults::default());
    }

    #[test]
    fn overrides_only_named_fields() {
        let json = r#"{ "Tap Timeout": 0.4, "Mouse CPI": 1600.0 }"#;
        let defaults: PropertyDefaults = serde_json::from_str(json).unwrap();
        assert_eq!(defaults.tap_timeout, 0.4);
        assert_eq!(defaults.mouse_cpi, 1600.0);
        assert_eq!(defaults.tap_drag_timeout, PropertyDefaults::default().tap_drag_timeout);
    }

    #[test]
    fn apply_to_writes_into_a_built_chain() {
        let mut gi = GestureInterpreter::new(DeviceClass::Touchpad, HardwareProperties::default(), 2);
        let mut defaults = PropertyDefaults::default();
        defaults.tap_timeout = 0.33;
        defaults.apply_to(gi.properties());
        assert_eq!(
            gi.properties().get("Tap Timeout").unwrap().value(),
            &PropValue::Double(0.33)
        );
    }

    #[test]
    fn apply_to_skips_properties_the_chain_never_registered() {
        // The Mouse chain never registers "Tap Timeout"; applying defaults
        // built for a touchpad should not panic or error.
        let mut gi = GestureInterpreter::new(DeviceClass::Mouse, HardwareProperties::default(), 2);
        let defaults = PropertyDefaults::default();
        defaults.apply_to(gi.properties());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = PropertyDefaults::load(Path::new("/nonexistent/gestures.json"));
        assert!(err.is_err());
    }
}
