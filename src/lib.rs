//! **gestures-core** — a cooperative, single-threaded touchpad/mouse/
//! touchscreen gesture interpreter pipeline.
//!
//! A [`gesture_interpreter::GestureInterpreter`] wires together a fixed
//! chain of [`interpreter::Interpreter`] stages chosen by
//! [`gesture_interpreter::DeviceClass`] (§6): each stage wraps the next one
//! down, smoothing, classifying, or filtering `HardwareState` frames on
//! their way up to a final `Vec<types::Gesture>`. Only one timer is ever
//! outstanding per chain — [`filter_base::FilterBase`] multiplexes it
//! across however many stages want a callback.
//!
//! # Architecture
//!
//! * [`types`] — the data model: `HardwareState`, `FingerState`, `Gesture`.
//! * [`interpreter`] and [`filter_base`] — the stage contract and the
//!   chained-timer bookkeeping every stage shares.
//! * [`immediate`], [`mouse`], [`multitouch_mouse`] — the three terminal
//!   stages, one per input shape (multi-touch-only, relative-only, hybrid).
//! * [`stages`] — the filter stages layered above a terminal stage.
//! * [`property`] — the runtime-tunable property registry every stage
//!   registers its knobs into.
//! * [`metrics`] — per-tracking-id timing/history state shared by stages
//!   that need to remember a finger's origin.
//! * [`activity_log`] and [`replay`] — recording a run to JSON and
//!   replaying one back through a fresh chain.
//! * [`config`] — bulk property-default bootstrap from a JSON file.
//! * [`error`] — the one error type that crosses an API boundary.
//! * [`ffi`] — the C ABI façade for embedding hosts.
//! * [`gesture_interpreter`] — chain composition and the top-level façade.

pub mod activity_log;
pub mod config;
pub mod error;
pub mod ffi;
pub mod filter_base;
pub mod gesture_interpreter;
pub mod immediate;
pub mod interpreter;
pub mod metrics;
pub mod mouse;
pub mod multitouch_mouse;
pub mod property;
pub mod replay;
pub mod stages;
pub mod types;
