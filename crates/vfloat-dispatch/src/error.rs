//! Error types for backend loading and dispatch setup

use std::os::raw::c_int;

use vfloat_abi::{InitError, Operation};
use vfloat_core::FloatType;

/// Errors raised while building a dispatch table.
///
/// Every variant is fatal at the C boundary; see [`crate::fatal`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No backend configured.
    #[error("no backend specified (set VFC_BACKENDS or VFC_BACKENDS_FROM_FILE)")]
    EmptyBackendList,

    /// More backends than the table holds.
    #[error("too many backends: {count} (max {max})")]
    TooManyBackends { count: usize, max: usize },

    /// One backend received more arguments than the ABI allows.
    #[error("backend {path}: too many arguments: {count} (max {max})")]
    TooManyArguments { path: String, count: usize, max: usize },

    /// Argument contains an interior NUL.
    #[error("backend {path}: argument contains a NUL byte")]
    NulInArgument { path: String },

    /// The shared object could not be opened.
    #[error("cannot load backend {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// The shared object does not export the entry point.
    #[error("backend {path} does not export interflop_init: {source}")]
    MissingEntrySymbol {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// The backend was built against another ABI revision.
    #[error("backend {path}: ABI version {found}, expected {expected}")]
    AbiVersion { path: String, found: u32, expected: u32 },

    /// No loaded backend implements a mandatory operation.
    #[error("no backend implements {operation} for {ty}")]
    Coverage { operation: Operation, ty: FloatType },

    /// `VFC_BACKENDS_FROM_FILE` could not be read.
    #[error("cannot read backend list from {path}: {source}")]
    BackendFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `builtin:<name>` with an unknown name.
    #[error(transparent)]
    Builtin(#[from] vfloat_backends::BackendError),

    /// A built-in backend rejected its arguments.
    #[error(transparent)]
    BackendInit(#[from] InitError),

    /// Comparison called with a code outside the 16 fcmp predicates.
    #[error("invalid fcmp predicate code {0} (expected 0..=15)")]
    InvalidPredicate(c_int),

    /// `set_active_backends` outside `1..=loaded`.
    #[error("cannot activate {requested} backends: {loaded} loaded")]
    InvalidActiveCount { requested: usize, loaded: usize },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
