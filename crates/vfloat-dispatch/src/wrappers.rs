//! The C symbols called by instrumented code.
//!
//! The process-wide [`DispatchTable`] is built from the environment on the
//! first call to any of these symbols. A configuration problem at that point
//! is fatal: it is logged and the process exits with status 1.
//!
//! Vector forms take pointers to `N` lanes and write `N` lanes.

use std::os::raw::c_int;
use std::sync::OnceLock;

use tracing::error;
use vfloat_abi::{BinaryOp, FcmpPredicate};

use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::table::{DispatchTable, Lane};

static TABLE: OnceLock<DispatchTable> = OnceLock::new();

extern "C" {
    fn atexit(callback: extern "C" fn()) -> c_int;
}

extern "C" fn finalize_at_exit() {
    if let Some(table) = TABLE.get() {
        table.finalize();
    }
}

/// Log `err` and terminate the process.
pub fn fatal(err: &DispatchError) -> ! {
    error!(%err, "vfloat dispatch failed");
    std::process::exit(1)
}

/// The process-wide table, initialised from the environment on first use.
pub fn global_table() -> &'static DispatchTable {
    TABLE.get_or_init(|| {
        vfloat_tracing::init_from_env();

        let table = match DispatchConfig::from_env().and_then(|config| DispatchTable::from_config(&config)) {
            Ok(table) => table,
            Err(err) => fatal(&err),
        };

        // SAFETY: registering a plain function with the C runtime.
        if unsafe { atexit(finalize_at_exit) } != 0 {
            error!("could not register backend finalization at exit");
        }
        table
    })
}

fn decode_predicate(code: c_int) -> Result<FcmpPredicate> {
    FcmpPredicate::from_code(code).ok_or(DispatchError::InvalidPredicate(code))
}

fn predicate(code: c_int) -> FcmpPredicate {
    decode_predicate(code).unwrap_or_else(|err| fatal(&err))
}

/// # Safety
///
/// `a` and `b` must be readable and `res` writable for `N` lanes.
unsafe fn vector_binary<F: Lane, const N: usize>(op: BinaryOp, a: *const F, b: *const F, res: *mut F) {
    let lanes = global_table().binary_vector::<F, N>(op, &*a.cast::<[F; N]>(), &*b.cast::<[F; N]>());
    res.cast::<[F; N]>().write(lanes);
}

/// # Safety
///
/// As [`vector_binary`], with `res` writable for `N` ints.
unsafe fn vector_compare<F: Lane, const N: usize>(code: c_int, a: *const F, b: *const F, res: *mut c_int) {
    let lanes = global_table().compare_vector::<F, N>(predicate(code), &*a.cast::<[F; N]>(), &*b.cast::<[F; N]>());
    res.cast::<[c_int; N]>().write(lanes);
}

/// # Safety
///
/// As [`vector_binary`], with `c` readable for `N` lanes.
unsafe fn vector_fma<F: Lane, const N: usize>(a: *const F, b: *const F, c: *const F, res: *mut F) {
    let lanes = global_table().fma_vector::<F, N>(&*a.cast::<[F; N]>(), &*b.cast::<[F; N]>(), &*c.cast::<[F; N]>());
    res.cast::<[F; N]>().write(lanes);
}

macro_rules! scalar_symbols {
    ($ty:ty: $add:ident, $sub:ident, $mul:ident, $div:ident, $cmp:ident, $fma:ident) => {
        #[no_mangle]
        pub extern "C" fn $add(a: $ty, b: $ty) -> $ty {
            global_table().binary(BinaryOp::Add, a, b)
        }

        #[no_mangle]
        pub extern "C" fn $sub(a: $ty, b: $ty) -> $ty {
            global_table().binary(BinaryOp::Sub, a, b)
        }

        #[no_mangle]
        pub extern "C" fn $mul(a: $ty, b: $ty) -> $ty {
            global_table().binary(BinaryOp::Mul, a, b)
        }

        #[no_mangle]
        pub extern "C" fn $div(a: $ty, b: $ty) -> $ty {
            global_table().binary(BinaryOp::Div, a, b)
        }

        #[no_mangle]
        pub extern "C" fn $cmp(predicate_code: c_int, a: $ty, b: $ty) -> c_int {
            global_table().compare(predicate(predicate_code), a, b)
        }

        #[no_mangle]
        pub extern "C" fn $fma(a: $ty, b: $ty, c: $ty) -> $ty {
            global_table().fma(a, b, c)
        }
    };
}

macro_rules! vector_symbols {
    ($ty:ty, $lanes:literal: $add:ident, $sub:ident, $mul:ident, $div:ident, $cmp:ident, $fma:ident) => {
        /// # Safety
        ///
        /// `a`, `b` and `res` must each cover the lanes named by the symbol.
        #[no_mangle]
        pub unsafe extern "C" fn $add(a: *const $ty, b: *const $ty, res: *mut $ty) {
            vector_binary::<$ty, $lanes>(BinaryOp::Add, a, b, res)
        }

        /// # Safety
        ///
        /// See the add form.
        #[no_mangle]
        pub unsafe extern "C" fn $sub(a: *const $ty, b: *const $ty, res: *mut $ty) {
            vector_binary::<$ty, $lanes>(BinaryOp::Sub, a, b, res)
        }

        /// # Safety
        ///
        /// See the add form.
        #[no_mangle]
        pub unsafe extern "C" fn $mul(a: *const $ty, b: *const $ty, res: *mut $ty) {
            vector_binary::<$ty, $lanes>(BinaryOp::Mul, a, b, res)
        }

        /// # Safety
        ///
        /// See the add form.
        #[no_mangle]
        pub unsafe extern "C" fn $div(a: *const $ty, b: *const $ty, res: *mut $ty) {
            vector_binary::<$ty, $lanes>(BinaryOp::Div, a, b, res)
        }

        /// # Safety
        ///
        /// See the add form; `res` holds one `int` per lane.
        #[no_mangle]
        pub unsafe extern "C" fn $cmp(predicate_code: c_int, a: *const $ty, b: *const $ty, res: *mut c_int) {
            vector_compare::<$ty, $lanes>(predicate_code, a, b, res)
        }

        /// # Safety
        ///
        /// See the add form.
        #[no_mangle]
        pub unsafe extern "C" fn $fma(a: *const $ty, b: *const $ty, c: *const $ty, res: *mut $ty) {
            vector_fma::<$ty, $lanes>(a, b, c, res)
        }
    };
}

scalar_symbols!(f32: _floatadd, _floatsub, _floatmul, _floatdiv, _floatcmp, _floatfma);
scalar_symbols!(f64: _doubleadd, _doublesub, _doublemul, _doublediv, _doublecmp, _doublefma);

vector_symbols!(f32, 2: _2xfloatadd, _2xfloatsub, _2xfloatmul, _2xfloatdiv, _2xfloatcmp, _2xfloatfma);
vector_symbols!(f32, 4: _4xfloatadd, _4xfloatsub, _4xfloatmul, _4xfloatdiv, _4xfloatcmp, _4xfloatfma);
vector_symbols!(f32, 8: _8xfloatadd, _8xfloatsub, _8xfloatmul, _8xfloatdiv, _8xfloatcmp, _8xfloatfma);
vector_symbols!(f32, 16: _16xfloatadd, _16xfloatsub, _16xfloatmul, _16xfloatdiv, _16xfloatcmp, _16xfloatfma);
vector_symbols!(f64, 2: _2xdoubleadd, _2xdoublesub, _2xdoublemul, _2xdoublediv, _2xdoublecmp, _2xdoublefma);
vector_symbols!(f64, 4: _4xdoubleadd, _4xdoublesub, _4xdoublemul, _4xdoublediv, _4xdoublecmp, _4xdoublefma);
vector_symbols!(f64, 8: _8xdoubleadd, _8xdoublesub, _8xdoublemul, _8xdoublediv, _8xdoublecmp, _8xdoublefma);
vector_symbols!(f64, 16: _16xdoubleadd, _16xdoublesub, _16xdoublemul, _16xdoublediv, _16xdoublecmp, _16xdoublefma);

#[no_mangle]
pub extern "C" fn _doubletofloat(a: f64) -> f32 {
    global_table().cast_to_f32(a)
}

/// Forward a user call to every active backend.
#[no_mangle]
pub extern "C" fn interflop_call(id: c_int, arg: i64) {
    global_table().user_call(id, arg);
}

/// Restrict dispatch to the first `count` backends. Out-of-range counts are fatal.
#[no_mangle]
pub extern "C" fn vfc_set_active_backends(count: c_int) {
    let count = usize::try_from(count).unwrap_or(0);
    if let Err(err) = global_table().set_active_backends(count) {
        fatal(&err);
    }
}

/// Finalize all backends now instead of at exit.
#[no_mangle]
pub extern "C" fn vfc_finalize() {
    global_table().finalize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_codes_outside_fcmp_are_rejected() {
        assert_eq!(decode_predicate(1).ok(), Some(FcmpPredicate::Oeq));
        assert_eq!(decode_predicate(15).ok(), Some(FcmpPredicate::True));
        assert!(matches!(decode_predicate(16), Err(DispatchError::InvalidPredicate(16))));
        assert!(matches!(decode_predicate(-1), Err(DispatchError::InvalidPredicate(-1))));
    }
}
