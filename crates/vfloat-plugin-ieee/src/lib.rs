//! `libinterflop_ieee`: native arithmetic, optionally traced.
//!
//! ```text
//! VFC_BACKENDS="libinterflop_ieee.so --debug --count-op"
//! ```
//!
//! Options: `--debug`, `--debug-binary`, `--no-backend-name`, `--count-op`.

vfloat_abi::export_backend!(vfloat_backends::IeeeBackend);
