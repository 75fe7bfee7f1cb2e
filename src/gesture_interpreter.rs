//! Device-class-driven chain composition and the top-level façade a host
//! drives directly, or through the C ABI in [`crate::ffi`].
//!
//! Grounded on `gestures.h`'s `GestureInterpreter` and the construction
//! logic historically inlined into its constructor. Chain shape is fixed
//! per device class (§6): each stage wraps the one built before it, ending
//! with `LoggingFilterInterpreter` as the outermost, host-facing stage.
//! `"Touchpad Stack Version"` selects the legacy v1 additions; unlike the
//! rest of this crate's properties, it is read once at construction time
//! since it changes the chain's *shape*, not a runtime-tunable value within
//! a fixed shape.

use crate::immediate::ImmediateInterpreter;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::mouse::MouseInterpreter;
use crate::multitouch_mouse::MultitouchMouseInterpreter;
use crate::property::PropRegistry;
use crate::stages::accel::AccelFilterInterpreter;
use crate::stages::box_filter::BoxFilterInterpreter;
use crate::stages::click_wiggle::ClickWiggleFilterInterpreter;
use crate::stages::finger_merge::FingerMergeFilterInterpreter;
use crate::stages::fling_stop::FlingStopFilterInterpreter;
use crate::stages::haptic_button::HapticButtonGeneratorFilterInterpreter;
use crate::stages::iir::IirFilterInterpreter;
use crate::stages::integral_gesture::IntegralGestureFilterInterpreter;
use crate::stages::logging::{LoggingFilterInterpreter, LoggingHandle};
use crate::stages::lookahead::LookaheadFilterInterpreter;
use crate::stages::metrics_filter::MetricsFilterInterpreter;
use crate::stages::non_linearity::NonLinearityFilterInterpreter;
use crate::stages::palm_classifying::PalmClassifyingFilterInterpreter;
use crate::stages::scaling::ScalingFilterInterpreter;
use crate::stages::sensor_jump::SensorJumpFilterInterpreter;
use crate::stages::split_correcting::SplitCorrectingFilterInterpreter;
use crate::stages::stationary_wiggle::StationaryWiggleFilterInterpreter;
use crate::stages::stuck_button::StuckButtonInhibitorFilterInterpreter;
use crate::stages::t5r2::T5R2CorrectingFilterInterpreter;
use crate::stages::timestamp::TimestampFilterInterpreter;
use crate::stages::trend_classifying::TrendClassifyingFilterInterpreter;
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Touchpad,
    Touchscreen,
    Mouse,
    PointingStick,
    MultitouchMouse,
}

/// Owns the property registry, the built interpreter chain, and the
/// per-run metrics/hardware-properties state a host interacts with.
pub struct GestureInterpreter {
    prop_reg: PropRegistry,
    metrics: Metrics,
    mprops: MetricsProperties,
    hwprops: HardwareProperties,
    device_class: DeviceClass,
    chain: Box<dyn Interpreter>,
    logging: LoggingHandle,
    initialized: bool,
}

impl GestureInterpreter {
    /// `touchpad_stack_version` selects the chain shape for `Touchpad`/
    /// `Touchscreen` classes; it is ignored for the other classes.
    pub fn new(device_class: DeviceClass, hwprops: HardwareProperties, touchpad_stack_version: u32) -> Self {
        let mut prop_reg = PropRegistry::new();
        prop_reg.register_int("Touchpad Stack Version", touchpad_stack_version as i32);
        let (chain, logging) = build_chain(&mut prop_reg, device_class, touchpad_stack_version, &hwprops);
        info!("built {:?} gesture chain (stack version {})", device_class, touchpad_stack_version);
        Self {
            prop_reg,
            metrics: Metrics::new(3),
            mprops: MetricsProperties,
            hwprops,
            device_class,
            chain,
            logging,
            initialized: false,
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device_class
    }

    pub fn properties(&mut self) -> &mut PropRegistry {
        &mut self.prop_reg
    }

    /// Must be called once before any frame is pushed through the chain.
    pub fn initialize(&mut self) {
        self.chain.initialize(&self.hwprops, &mut self.metrics, &self.mprops);
        self.initialized = true;
    }

    /// Replaces the hardware properties driving the chain. Only valid
    /// before [`Self::initialize`]; a chain's geometry-derived state (e.g.
    /// `ScalingFilterInterpreter`'s mm-per-unit factors) is fixed at
    /// `initialize` time, so changing hardware properties afterwards would
    /// silently desync filters that already cached derived constants.
    pub fn set_hardware_properties(&mut self, hwprops: HardwareProperties) {
        if self.initialized {
            warn!("ignoring set_hardware_properties after initialize");
            return;
        }
        self.hwprops = hwprops;
    }

    pub fn hardware_properties(&self) -> &HardwareProperties {
        &self.hwprops
    }

    pub fn push_hardware_state(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        let gestures = self.chain.sync_interpret(hwstate, timeout);
        self.logging.service_triggers(&self.prop_reg);
        gestures
    }

    pub fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let gestures = self.chain.handle_timer(now, timeout);
        self.logging.service_triggers(&self.prop_reg);
        gestures
    }

    pub fn clear(&mut self) {
        self.chain.clear();
    }
}

fn build_chain(
    prop_reg: &mut PropRegistry,
    device_class: DeviceClass,
    touchpad_stack_version: u32,
    hwprops: &HardwareProperties,
) -> (Box<dyn Interpreter>, LoggingHandle) {
    match device_class {
        DeviceClass::Touchpad | DeviceClass::Touchscreen => {
            let mut chain: Box<dyn Interpreter> = Box::new(ImmediateInterpreter::new(prop_reg, device_class));
            chain = Box::new(FlingStopFilterInterpreter::new(prop_reg, chain, device_class));
            chain = Box::new(ClickWiggleFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(PalmClassifyingFilterInterpreter::new(prop_reg, chain));
            if touchpad_stack_version == 1 {
                chain = Box::new(IirFilterInterpreter::new(prop_reg, chain));
            }
            chain = Box::new(LookaheadFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(BoxFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(StationaryWiggleFilterInterpreter::new(prop_reg, chain));
            if touchpad_stack_version == 1 {
                chain = Box::new(SensorJumpFilterInterpreter::new(prop_reg, chain));
            }
            chain = Box::new(AccelFilterInterpreter::new(prop_reg, chain));
            if touchpad_stack_version == 1 {
                chain = Box::new(SplitCorrectingFilterInterpreter::new(prop_reg, chain));
            }
            chain = Box::new(TrendClassifyingFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(MetricsFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(ScalingFilterInterpreter::new(prop_reg, chain, device_class));
            chain = Box::new(FingerMergeFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(StuckButtonInhibitorFilterInterpreter::new(chain));
            chain = Box::new(HapticButtonGeneratorFilterInterpreter::new(prop_reg, chain, hwprops.is_haptic_pad));
            if touchpad_stack_version == 1 {
                chain = Box::new(T5R2CorrectingFilterInterpreter::new(prop_reg, chain));
                chain = Box::new(NonLinearityFilterInterpreter::new(prop_reg, chain));
            }
            chain = Box::new(TimestampFilterInterpreter::new(prop_reg, chain));
            let logging = LoggingFilterInterpreter::new(prop_reg, chain);
            let handle = logging.handle();
            (Box::new(logging), handle)
        }
        DeviceClass::Mouse | DeviceClass::PointingStick => {
            let mut chain: Box<dyn Interpreter> = Box::new(MouseInterpreter::new(prop_reg, device_class));
            chain = Box::new(AccelFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(ScalingFilterInterpreter::new(prop_reg, chain, device_class));
            chain = Box::new(MetricsFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(IntegralGestureFilterInterpreter::new(prop_reg, chain));
            let logging = LoggingFilterInterpreter::new(prop_reg, chain);
            let handle = logging.handle();
            (Box::new(logging), handle)
        }
        DeviceClass::MultitouchMouse => {
            let mut chain: Box<dyn Interpreter> = Box::new(MultitouchMouseInterpreter::new(prop_reg));
            chain = Box::new(FlingStopFilterInterpreter::new(prop_reg, chain, device_class));
            chain = Box::new(ClickWiggleFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(LookaheadFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(BoxFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(AccelFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(ScalingFilterInterpreter::new(prop_reg, chain, device_class));
            chain = Box::new(MetricsFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(IntegralGestureFilterInterpreter::new(prop_reg, chain));
            chain = Box::new(StuckButtonInhibitorFilterInterpreter::new(chain));
            chain = Box::new(NonLinearityFilterInterpreter::new(prop_reg, chain));
            let logging = LoggingFilterInterpreter::new(prop_reg, chain);
            let handle = logging.handle();
            (Box::new(logging), handle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FingerState;

    #[test]
    fn touchpad_chain_processes_a_frame_without_panicking() {
        let mut gi = GestureInterpreter::new(DeviceClass::Touchpad, HardwareProperties::default(), 2);
        gi.initialize();
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        let mut timeout = None;
        gi.push_hardware_state(&mut hs, &mut timeout);
    }

    #[test]
    fn touchpad_v1_stack_processes_a_frame_without_panicking() {
        let mut gi = GestureInterpreter::new(DeviceClass::Touchpad, HardwareProperties::default(), 1);
        gi.initialize();
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        let mut timeout = None;
        gi.push_hardware_state(&mut hs, &mut timeout);
    }

    #[test]
    fn mouse_chain_processes_a_frame_without_panicking() {
        let mut gi = GestureInterpreter::new(DeviceClass::Mouse, HardwareProperties::default(), 2);
        gi.initialize();
        let mut hs = HardwareState::new(0.0, Vec::new());
        hs.rel_x = 5.0;
        let mut timeout = None;
        gi.push_hardware_state(&mut hs, &mut timeout);
    }

    #[test]
    fn multitouch_mouse_chain_processes_a_frame_without_panicking() {
        let mut gi = GestureInterpreter::new(DeviceClass::MultitouchMouse, HardwareProperties::default(), 2);
        gi.initialize();
        let mut hs = HardwareState::new(0.0, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
        let mut timeout = None;
        gi.push_hardware_state(&mut hs, &mut timeout);
    }
}
