//! # vfloat-abi
//!
//! The contract between the vfloat dispatcher and its backends.
//!
//! - [`abi`]: the `#[repr(C)]` operation table and function-pointer types
//! - [`Backend`]: the safe trait a backend implements
//! - [`interface_for`]: generic trampolines building the table from a `Backend`
//! - [`export_backend!`]: emits the `interflop_init` entry point in a `cdylib`
//! - [`BackendArgs`]: `--key=value` option parsing for backend init

pub mod abi;
pub mod args;
pub mod backend;
pub mod export;
pub mod predicate;
pub mod trampoline;
pub mod user_call;

pub use abi::*;
pub use args::{ArgError, BackendArgs};
pub use backend::{Backend, BinaryOp};
pub use export::{init_backend, instantiate, InitError};
pub use predicate::FcmpPredicate;
pub use trampoline::{interface_for, into_context};
pub use user_call::UserCall;
pub use vfloat_core::{Float, FloatType};
