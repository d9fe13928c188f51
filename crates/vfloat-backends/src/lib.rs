//! Floating-point semantics backends for vfloat
//!
//! This crate provides:
//! - **Stochastic**: directed and Monte-Carlo rounding over error-free transformations
//! - **VPREC**: reduced precision and exponent range emulation
//! - **Cancellation**: noise injection on catastrophic cancellations
//! - **MCA**: Monte Carlo Arithmetic noise on operands and/or results
//! - **IEEE**: native pass-through with tracing and operation counts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 vfloat-dispatch (C ABI)                  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  BackendInterface + context
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │          vfloat-abi trampolines (Backend trait)          │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┬──────┴──────┬─────────────┬─────────────┐
//!         ▼             ▼             ▼             ▼             ▼
//!   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!   │   IEEE   │  │Stochastic│  │  VPREC   │  │ Cancell. │  │   MCA    │
//!   └──────────┘  └──────────┘  └──────────┘  └──────────┘  └──────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use vfloat_abi::{Backend, BackendArgs, BinaryOp};
//! use vfloat_backends::{RoundingMode, StochasticBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = BackendArgs::parse(&["builtin:stochastic", "--rounding-mode=upward"])?;
//! let backend = StochasticBackend::configure(&args)?;
//! assert_eq!(backend.config().rounding_mode, RoundingMode::Upward);
//!
//! let third = backend.binary(BinaryOp::Div, 1.0f64, 3.0);
//! assert!(third > 1.0 / 3.0);
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod cancellation;
pub mod error;
pub mod ieee;
pub mod mca;
pub mod stochastic;
pub mod vprec;

// Re-export public API
pub use builtin::{Builtin, BUILTIN_PREFIX};
pub use cancellation::{CancellationBackend, CancellationConfig};
pub use error::{BackendError, Result};
pub use ieee::{IeeeBackend, IeeeConfig};
pub use mca::{McaBackend, McaConfig, McaMode};
pub use stochastic::{RoundingMode, StochasticBackend, StochasticConfig};
pub use vprec::{ErrorMode, PrecisionFormat, VprecBackend, VprecConfig, VprecMode};
