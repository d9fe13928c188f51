//! The safe side of the plugin contract.
//!
//! A type implementing [`Backend`] is turned into a [`BackendInterface`]
//! by [`interface_for`](crate::interface_for): every implemented operation
//! gets a generic `extern "C"` trampoline that recovers `&Self` from the
//! context pointer.
//!
//! [`BackendInterface`]: crate::BackendInterface

use std::error::Error;
use std::ffi::CStr;

use vfloat_core::Float;

use crate::abi::Operation;
use crate::args::BackendArgs;
use crate::predicate::FcmpPredicate;
use crate::user_call::UserCall;

/// The four basic arithmetic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div];

    /// Native IEEE result.
    #[inline(always)]
    pub fn apply<F: Float>(self, a: F, b: F) -> F {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }

    pub const fn operation(self) -> Operation {
        match self {
            BinaryOp::Add => Operation::Add,
            BinaryOp::Sub => Operation::Sub,
            BinaryOp::Mul => Operation::Mul,
            BinaryOp::Div => Operation::Div,
        }
    }

    pub const fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    pub(crate) const fn code(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_code(code: u8) -> Self {
        match code {
            0 => BinaryOp::Add,
            1 => BinaryOp::Sub,
            2 => BinaryOp::Mul,
            _ => BinaryOp::Div,
        }
    }
}

/// A floating-point semantics backend.
///
/// Backends are shared between threads through a raw context pointer, so
/// they must be `Send + Sync` and keep any mutable state in atomics or
/// thread-local storage.
pub trait Backend: Send + Sync + Sized + 'static {
    /// Static name reported through the interface.
    const NAME: &'static CStr;

    type Error: Error + Send + Sync + 'static;

    /// Build the backend from its option list.
    fn configure(args: &BackendArgs) -> Result<Self, Self::Error>;

    /// Which slots to populate. Defaults to the four arithmetic operations.
    fn implements(op: Operation) -> bool {
        matches!(op, Operation::Add | Operation::Sub | Operation::Mul | Operation::Div)
    }

    /// Whether to populate the binary64 to binary32 cast slot.
    fn implements_cast() -> bool {
        false
    }

    fn binary<F: Float>(&self, op: BinaryOp, a: F, b: F) -> F;

    fn fma<F: Float>(&self, a: F, b: F, c: F) -> F {
        a.mul_add(b, c)
    }

    fn compare<F: Float>(&self, predicate: FcmpPredicate, a: F, b: F) -> bool {
        predicate.evaluate(a, b)
    }

    fn cast_to_f32(&self, a: f64) -> f32 {
        a as f32
    }

    fn user_call(&self, _call: UserCall) {}

    fn finalize(&self) {}
}
