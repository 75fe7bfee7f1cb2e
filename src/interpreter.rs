//! The pipeline node contract every stage implements.

use crate::metrics::{Metrics, MetricsProperties};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};

/// One node in an interpreter chain.
///
/// A stage is driven by a host (directly, or through a wrapping
/// [`crate::filter_base::FilterBase`]) in this order: `initialize` once,
/// then any interleaving of `sync_interpret` (one call per input frame) and
/// `handle_timer` (one call per requested wake-up that actually fires).
///
/// Gestures flow the opposite direction from frames: a stage returns the
/// gestures *it* produced directly from `sync_interpret`/`handle_timer`, and
/// a wrapping stage runs whatever its wrapped stage returned through its own
/// `consume_gesture` before adding them to what it returns to its own
/// caller. This replaces the source's raw upstream callback pointer (see
/// the design notes on avoiding a back-pointer from consumer to producer)
/// with plain return values threaded back up the call stack — semantically
/// the same chain of transform/suppress decisions, without the
/// self-reference a callback-based "pass `this` to my child" pattern would
/// need in a borrow-checked language.
pub trait Interpreter {
    /// Stage name, used in log lines exactly like the source's `InitName`.
    fn name(&self) -> &'static str;

    /// Called once, top-down, before any frame is processed.
    fn initialize(
        &mut self,
        hwprops: &HardwareProperties,
        metrics: &mut Metrics,
        mprops: &MetricsProperties,
    );

    /// Called once per input frame. `hwstate` may be mutated in place
    /// (rewriting tracking ids, scaling coordinates, dropping fingers)
    /// before being handed to a wrapped downstream stage. `timeout` is set
    /// to `None` for "no callback wanted" or `Some(dt)` for "call
    /// `handle_timer` again in `dt` seconds".
    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture>;

    /// Called when a previously requested timeout fires.
    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture>;

    /// Transforms or suppresses one gesture produced further down the
    /// chain. Default: pass through unchanged.
    fn consume_gesture(&mut self, gesture: Gesture) -> Option<Gesture> {
        Some(gesture)
    }

    /// Resets internal state to as-if-just-constructed, discarding any
    /// buffered frames or in-progress state machines. The façade calls this
    /// on every stage when the host asks for a `clear`.
    fn clear(&mut self) {}
}
