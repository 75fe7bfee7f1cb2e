//! The one error taxonomy that crosses an API boundary.
//!
//! Most of the failure modes a stage can hit during the data path
//! (`sync_interpret` / `handle_timer`) never propagate: they are logged and
//! the stage self-heals, per the error handling design. [`GestureError`] only
//! shows up at the edges — activity-log replay, property construction, and
//! the C ABI façade's translation of construction failures.

use thiserror::Error;

/// Errors that can cross an API boundary of the gesture pipeline.
///
/// Variants correspond to the error *kinds* named in the design (not
/// identifiers): most internal faults never reach this type and are instead
/// logged at the point of occurrence and absorbed (see `InvariantViolation`
/// handling in individual stages).
#[derive(Debug, Error)]
pub enum GestureError {
    /// The activity-log replay parser rejected a document.
    #[error("malformed log at entry {index}: {reason}")]
    MalformedLog { index: usize, reason: String },

    /// A frame arrived further back in time than `ExtraVariableDelay`
    /// tolerates.
    #[error("bad timestamp: {delta:.6}s before the previous frame")]
    BadTimestamp { delta: f64 },

    /// A property write supplied a value of the wrong kind.
    #[error("property {name:?} type mismatch")]
    PropertyTypeMismatch { name: String },

    /// An internal invariant did not hold; the operation was skipped and
    /// best-effort state retained.
    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },

    /// The C ABI façade was asked for a `version` outside `[1, 1]`.
    #[error("unsupported interpreter version {0}")]
    UnsupportedVersion(u32),
}
