//! Error types for backend configuration

use std::fmt;

use vfloat_abi::ArgError;
use vfloat_core::FloatType;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors raised while configuring a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Malformed or unknown option
    #[error(transparent)]
    Args(#[from] ArgError),

    /// Unknown `--rounding-mode` value
    #[error(
        "invalid rounding mode `{0}`, must be one of: nearest, upward, downward, toward_zero, random, average, \
         farthest, float, native, ftz"
    )]
    UnknownRoundingMode(String),

    /// Unknown `--mode` value for VPREC
    #[error("invalid VPREC mode `{0}`, must be one of: ieee, full, ib, ob")]
    UnknownVprecMode(String),

    /// Unknown `--error-mode` value for VPREC
    #[error("invalid error mode `{0}`, must be one of: rel, abs, all")]
    UnknownErrorMode(String),

    /// Unknown `--mode` value for MCA
    #[error("invalid MCA mode `{0}`, must be one of: ieee, mca, pb, rr")]
    UnknownMcaMode(String),

    /// MCA sparsity outside `(0, 1]`
    #[error("invalid sparsity `{0}`, must be in (0, 1]")]
    InvalidSparsity(String),

    /// Precision outside the bounds of the emulated type
    #[error("{ty} precision {value} out of range {min}..={max}")]
    PrecisionOutOfRange {
        ty: FloatType,
        value: i64,
        min: u32,
        max: u32,
    },

    /// Exponent range outside the bounds of the emulated type
    #[error("{ty} range {value} out of range {min}..={max}")]
    RangeOutOfRange {
        ty: FloatType,
        value: i64,
        min: u32,
        max: u32,
    },

    /// Negative or otherwise unusable cancellation tolerance
    #[error("invalid cancellation tolerance: {0}")]
    InvalidTolerance(String),

    /// `builtin:<name>` with an unknown name
    #[error("unknown built-in backend `{0}` (expected ieee, stochastic, vprec, cancellation or mca)")]
    UnknownBuiltin(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create a generic error from anything printable
    pub fn other(msg: impl fmt::Display) -> Self {
        Self::Other(msg.to_string())
    }
}
