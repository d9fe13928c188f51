//! Generic `extern "C"` trampolines turning a [`Backend`] into a vtable.
//!
//! One monomorphised function exists per (backend, type, operation, lane
//! count); operation and lane count are const generics, so each slot is a
//! straight call into the backend with no runtime switch left after
//! inlining.

use std::os::raw::{c_int, c_void};

use tracing::warn;
use vfloat_core::Float;

use crate::abi::{BackendInterface, Operation, TypeSlots, VectorSlots, ABI_VERSION};
use crate::backend::{Backend, BinaryOp};
use crate::predicate::FcmpPredicate;
use crate::user_call::UserCall;

const ADD: u8 = BinaryOp::Add.code();
const SUB: u8 = BinaryOp::Sub.code();
const MUL: u8 = BinaryOp::Mul.code();
const DIV: u8 = BinaryOp::Div.code();

/// Recover the backend behind a context pointer.
///
/// # Safety
///
/// `context` must come from [`into_context::<B>`].
#[inline(always)]
unsafe fn backend<'a, B: Backend>(context: *mut c_void) -> &'a B {
    &*(context as *const B)
}

/// Move a backend to the heap and leak it as an opaque context.
///
/// Contexts live until process exit: finalize runs from `atexit`, after
/// which no thread may call into the backend anyway.
pub fn into_context<B: Backend>(backend: B) -> *mut c_void {
    Box::into_raw(Box::new(backend)) as *mut c_void
}

/// Out-of-range codes compare as `false`; a plugin has no way to abort
/// its host, so it only reports them.
fn predicate_or_false(code: c_int) -> FcmpPredicate {
    FcmpPredicate::from_code(code).unwrap_or_else(|| {
        warn!(code, "invalid fcmp predicate code, comparing as false");
        FcmpPredicate::False
    })
}

unsafe extern "C" fn binary_scalar<B: Backend, F: Float, const OP: u8>(a: F, b: F, res: *mut F, context: *mut c_void) {
    *res = backend::<B>(context).binary(BinaryOp::from_code(OP), a, b);
}

unsafe extern "C" fn cmp_scalar<B: Backend, F: Float>(
    predicate: c_int,
    a: F,
    b: F,
    res: *mut c_int,
    context: *mut c_void,
) {
    *res = backend::<B>(context).compare(predicate_or_false(predicate), a, b) as c_int;
}

unsafe extern "C" fn fma_scalar<B: Backend, F: Float>(a: F, b: F, c: F, res: *mut F, context: *mut c_void) {
    *res = backend::<B>(context).fma(a, b, c);
}

unsafe extern "C" fn binary_vector<B: Backend, F: Float, const OP: u8, const N: usize>(
    a: *const F,
    b: *const F,
    res: *mut F,
    context: *mut c_void,
) {
    let backend = backend::<B>(context);
    let op = BinaryOp::from_code(OP);
    for lane in 0..N {
        *res.add(lane) = backend.binary(op, *a.add(lane), *b.add(lane));
    }
}

unsafe extern "C" fn cmp_vector<B: Backend, F: Float, const N: usize>(
    predicate: c_int,
    a: *const F,
    b: *const F,
    res: *mut c_int,
    context: *mut c_void,
) {
    let backend = backend::<B>(context);
    let predicate = predicate_or_false(predicate);
    for lane in 0..N {
        *res.add(lane) = backend.compare(predicate, *a.add(lane), *b.add(lane)) as c_int;
    }
}

unsafe extern "C" fn fma_vector<B: Backend, F: Float, const N: usize>(
    a: *const F,
    b: *const F,
    c: *const F,
    res: *mut F,
    context: *mut c_void,
) {
    let backend = backend::<B>(context);
    for lane in 0..N {
        *res.add(lane) = backend.fma(*a.add(lane), *b.add(lane), *c.add(lane));
    }
}

unsafe extern "C" fn cast_scalar<B: Backend>(a: f64, res: *mut f32, context: *mut c_void) {
    *res = backend::<B>(context).cast_to_f32(a);
}

unsafe extern "C" fn user_call<B: Backend>(context: *mut c_void, id: c_int, arg: i64) {
    backend::<B>(context).user_call(UserCall::decode(id, arg));
}

unsafe extern "C" fn finalize<B: Backend>(context: *mut c_void) {
    backend::<B>(context).finalize();
}

fn vector_slots<B: Backend, F: Float, const N: usize>() -> VectorSlots<F> {
    let mut slots = VectorSlots::EMPTY;
    if B::implements(Operation::Add) {
        slots.add = Some(binary_vector::<B, F, ADD, N>);
    }
    if B::implements(Operation::Sub) {
        slots.sub = Some(binary_vector::<B, F, SUB, N>);
    }
    if B::implements(Operation::Mul) {
        slots.mul = Some(binary_vector::<B, F, MUL, N>);
    }
    if B::implements(Operation::Div) {
        slots.div = Some(binary_vector::<B, F, DIV, N>);
    }
    if B::implements(Operation::Cmp) {
        slots.cmp = Some(cmp_vector::<B, F, N>);
    }
    if B::implements(Operation::Fma) {
        slots.fma = Some(fma_vector::<B, F, N>);
    }
    slots
}

fn type_slots<B: Backend, F: Float>() -> TypeSlots<F> {
    let mut slots = TypeSlots::EMPTY;
    if B::implements(Operation::Add) {
        slots.add = Some(binary_scalar::<B, F, ADD>);
    }
    if B::implements(Operation::Sub) {
        slots.sub = Some(binary_scalar::<B, F, SUB>);
    }
    if B::implements(Operation::Mul) {
        slots.mul = Some(binary_scalar::<B, F, MUL>);
    }
    if B::implements(Operation::Div) {
        slots.div = Some(binary_scalar::<B, F, DIV>);
    }
    if B::implements(Operation::Cmp) {
        slots.cmp = Some(cmp_scalar::<B, F>);
    }
    if B::implements(Operation::Fma) {
        slots.fma = Some(fma_scalar::<B, F>);
    }
    slots.vectors = [
        vector_slots::<B, F, 2>(),
        vector_slots::<B, F, 4>(),
        vector_slots::<B, F, 8>(),
        vector_slots::<B, F, 16>(),
    ];
    slots
}

/// The vtable for backend type `B`. Pair it with a context from
/// [`into_context`].
pub fn interface_for<B: Backend>() -> BackendInterface {
    BackendInterface {
        abi_version: ABI_VERSION,
        name: B::NAME.as_ptr(),
        binary32: type_slots::<B, f32>(),
        binary64: type_slots::<B, f64>(),
        cast_double_to_float: if B::implements_cast() {
            Some(cast_scalar::<B>)
        } else {
            None
        },
        user_call: Some(user_call::<B>),
        finalize: Some(finalize::<B>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::ffi::CStr;

    use crate::args::BackendArgs;

    struct Native;

    impl Backend for Native {
        const NAME: &'static CStr = c"native";
        type Error = Infallible;

        fn configure(_args: &BackendArgs) -> Result<Self, Infallible> {
            Ok(Native)
        }

        fn implements(op: Operation) -> bool {
            op == Operation::Cmp
        }

        fn binary<F: Float>(&self, op: BinaryOp, a: F, b: F) -> F {
            op.apply(a, b)
        }
    }

    #[test]
    fn unknown_predicate_codes_compare_false() {
        let iface = interface_for::<Native>();
        let context = into_context(Native);
        let cmp = iface.binary64.cmp.unwrap();
        let mut res: c_int = -1;
        unsafe {
            cmp(FcmpPredicate::True.code(), 1.0, 2.0, &mut res, context);
            assert_eq!(res, 1);
            cmp(42, 1.0, 1.0, &mut res, context);
            assert_eq!(res, 0);
            cmp(-3, 1.0, 1.0, &mut res, context);
            assert_eq!(res, 0);
            drop(Box::from_raw(context as *mut Native));
        }
    }
}
