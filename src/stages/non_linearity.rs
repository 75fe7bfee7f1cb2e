//! Corrects sensor non-linearity near the pad edges via a piecewise-linear
//! calibration curve, applied independently on each axis.
//!
//! Grounded on `non_linearity_filter_interpreter.h` (header only). The
//! source keeps a small table of `(raw, corrected)` control points per axis,
//! learned offline per touchpad model, and linearly interpolates between
//! the two bracketing points at runtime; outside the table's range it
//! extrapolates using the nearest segment's slope. This port exposes the
//! control points as two double-array properties (flattened raw/corrected
//! pairs) so a host can load a per-model calibration the same way the
//! source's static table does, defaulting to the identity curve (no
//! correction) when no points are configured.

use crate::filter_base::FilterBase;
use crate::interpreter::Interpreter;
use crate::metrics::{Metrics, MetricsProperties};
use crate::property::{BoundCell, Delegate, PropRegistry, PropValue};
use crate::types::{Gesture, HardwareProperties, HardwareState, Stime, Timeout};
use std::cell::RefCell;
use std::rc::Rc;

/// A sorted table of `(raw, corrected)` points used to linearly interpolate
/// or extrapolate a non-linearity correction.
#[derive(Debug, Clone, Default)]
pub struct CorrectionCurve {
    points: Vec<(f64, f64)>,
}

impl CorrectionCurve {
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Self { points }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        if self.points.len() < 2 {
            return raw;
        }
        if raw <= self.points[0].0 {
            let (x0, y0) = self.points[0];
            let (x1, y1) = self.points[1];
            return interp(raw, x0, y0, x1, y1);
        }
        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if raw <= x1 {
                return interp(raw, x0, y0, x1, y1);
            }
        }
        let n = self.points.len();
        let (x0, y0) = self.points[n - 2];
        let (x1, y1) = self.points[n - 1];
        interp(raw, x0, y0, x1, y1)
    }
}

fn interp(raw: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    y0 + (y1 - y0) * (raw - x0) / (x1 - x0)
}

/// Parses a flattened `"raw,corrected,raw,corrected,..."` property string
/// into control points. Malformed or trailing unpaired values are dropped
/// rather than rejected, since a bad write here must never panic or poison
/// the curve the previous write installed.
fn parse_control_points(raw: &str) -> Vec<(f64, f64)> {
    let nums: Vec<f64> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect();
    nums.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Registers `name` as a string property and attaches a delegate that
/// parses it into a [`CorrectionCurve`] on every write, mirroring
/// [`PropRegistry::bind_double`]'s pattern for a type the registry has no
/// native representation for.
fn bind_curve(prop_reg: &mut PropRegistry, name: &str) -> BoundCell<CorrectionCurve> {
    prop_reg.register_string(name, "");
    let cell: BoundCell<CorrectionCurve> = Rc::new(RefCell::new(CorrectionCurve::default()));
    let write = Rc::clone(&cell);
    let delegate: Delegate = Rc::new(RefCell::new(move |_: &str, v: &PropValue| {
        if let PropValue::String(s) = v {
            *write.borrow_mut() = CorrectionCurve::new(parse_control_points(s));
        }
    }));
    if let Some(prop) = prop_reg.get_mut(name) {
        prop.set_delegate(delegate);
    }
    cell
}

pub struct NonLinearityFilterInterpreter {
    base: FilterBase,
    x_curve: BoundCell<CorrectionCurve>,
    y_curve: BoundCell<CorrectionCurve>,
}

impl NonLinearityFilterInterpreter {
    pub fn new(prop_reg: &mut PropRegistry, next: Box<dyn Interpreter>) -> Self {
        Self {
            base: FilterBase::new(next),
            x_curve: bind_curve(prop_reg, "Non Linearity X Control Points"),
            y_curve: bind_curve(prop_reg, "Non Linearity Y Control Points"),
        }
    }
}

impl Interpreter for NonLinearityFilterInterpreter {
    fn name(&self) -> &'static str {
        "NonLinearityFilterInterpreter"
    }

    fn initialize(&mut self, hwprops: &HardwareProperties, metrics: &mut Metrics, mprops: &MetricsProperties) {
        self.base.next.initialize(hwprops, metrics, mprops);
    }

    fn sync_interpret(&mut self, hwstate: &mut HardwareState, timeout: &mut Timeout) -> Vec<Gesture> {
        for finger in &mut hwstate.fingers {
            finger.x = self.x_curve.borrow().apply(finger.x);
            finger.y = self.y_curve.borrow().apply(finger.y);
        }
        let now = hwstate.timestamp;
        let (gestures, _) = self.base.sync_interpret_next(now, hwstate);
        *timeout = self.base.combine_timeout(now, None);
        gestures
    }

    fn handle_timer(&mut self, now: Stime, timeout: &mut Timeout) -> Vec<Gesture> {
        let (gestures, _) = self.base.handle_timer_next(now);
        *timeout = self.base.combine_timeout(now, None);
        gestures
    }

    fn clear(&mut self) {
        self.base.clear_next();
    }
}
