//! # vfloat-dispatch
//!
//! Routes every intercepted floating-point operation to the configured
//! backends.
//!
//! ## Pipeline
//!
//! 1. [`DispatchConfig::from_env`] reads `VFC_BACKENDS` (or the first line
//!    of `VFC_BACKENDS_FROM_FILE`)
//! 2. [`parse_backend_list`] splits it into [`BackendEntry`]s
//! 3. [`load_backend`] opens each shared object and calls its
//!    `interflop_init`, or instantiates a `builtin:<name>` backend
//! 4. [`DispatchTable::check_coverage`] makes sure scalar arithmetic is
//!    implemented for both float types
//! 5. The exported `_floatadd`, `_4xdoublemul`, ... symbols fan each
//!    operation out to the active backends
//!
//! ## Example
//!
//! ```rust
//! use vfloat_abi::BinaryOp;
//! use vfloat_dispatch::{DispatchConfig, DispatchTable};
//!
//! # fn main() -> Result<(), vfloat_dispatch::DispatchError> {
//! let mut config = DispatchConfig::new("builtin:ieee; builtin:vprec --precision-binary64=3 --mode=full");
//! config.silent_load = true;
//! let table = DispatchTable::from_config(&config)?;
//!
//! // The last backend wins: 1 + 1/8 with three mantissa bits.
//! assert_eq!(table.binary(BinaryOp::Add, 1.0f64, 0.125), 1.125);
//! assert_eq!(table.binary(BinaryOp::Add, 1.0f64, 0.03125), 1.0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod backend_list;
pub mod table;
pub mod wrappers;

pub use config::DispatchConfig;
pub use error::{DispatchError, Result};
pub use loader::{load_backend, LoadedBackend};
pub use backend_list::{parse_backend_list, BackendEntry, MAX_BACKENDS};
pub use table::{DispatchTable, Lane};
pub use wrappers::{fatal, global_table};
