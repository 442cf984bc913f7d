//! Error types surfaced across the crate's public API.

use thiserror::Error;

/// Errors returned by fallible engine operations.
///
/// Degenerate-geometry and numerical (NaN/overflow) conditions are intentionally not part of
/// this enum: those are absorbed internally per-tick (logged and the affected body put to
/// sleep) rather than bubbled up as a hard error, since a single bad body should not abort an
/// entire simulation step.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// A settings value was outside its valid range.
    #[error("invalid setting `{field}`: {reason}")]
    Configuration {
        /// Name of the offending settings field.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },

    /// The fixed-capacity broadphase/overlap-table storage is full.
    #[error("body capacity ({capacity}) exhausted")]
    CapacityExhausted {
        /// Configured capacity that was hit.
        capacity: usize,
    },

    /// A material id referenced a slot that does not exist in the material table.
    #[error("material id {0} is out of range")]
    UnknownMaterial(u32),

    /// A handle was used that does not refer to a live body (removed, or from another engine).
    #[error("body handle is stale or unknown")]
    UnknownBody,
}

/// Convenience alias for `Result<T, PhysicsError>`.
pub type Result<T> = std::result::Result<T, PhysicsError>;
