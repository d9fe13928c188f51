//! C ABI shared by the dispatcher and every backend shared object.
//!
//! A backend exports [`ENTRY_SYMBOL`] with the [`InitFn`] signature. The
//! returned [`BackendInterface`] is a table of nullable function pointers;
//! a null slot means the backend does not implement that operation at that
//! type and width.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

use vfloat_core::FloatType;

/// Current ABI version, checked by the dispatcher at load time.
pub const ABI_VERSION: u32 = 1;

/// Name of the entry point every backend shared object exports.
pub const ENTRY_SYMBOL: &[u8] = b"interflop_init\0";

/// Maximum number of arguments (including `argv[0]`) passed to one backend.
pub const MAX_ARGS: usize = 256;

/// Scalar arithmetic: `*res = a op b`.
pub type BinaryFn<T> = unsafe extern "C" fn(a: T, b: T, res: *mut T, context: *mut c_void);

/// Scalar comparison; `predicate` is an [`FcmpPredicate`](crate::FcmpPredicate) code.
pub type CmpFn<T> = unsafe extern "C" fn(predicate: c_int, a: T, b: T, res: *mut c_int, context: *mut c_void);

/// Scalar fused multiply-add: `*res = a * b + c`.
pub type FmaFn<T> = unsafe extern "C" fn(a: T, b: T, c: T, res: *mut T, context: *mut c_void);

/// Lane-wise arithmetic over `N` lanes, `N` fixed by the slot's width.
pub type VectorBinaryFn<T> = unsafe extern "C" fn(a: *const T, b: *const T, res: *mut T, context: *mut c_void);

/// Lane-wise comparison writing one `int` per lane.
pub type VectorCmpFn<T> =
    unsafe extern "C" fn(predicate: c_int, a: *const T, b: *const T, res: *mut c_int, context: *mut c_void);

/// Lane-wise fused multiply-add.
pub type VectorFmaFn<T> =
    unsafe extern "C" fn(a: *const T, b: *const T, c: *const T, res: *mut T, context: *mut c_void);

/// Narrowing conversion from binary64 to binary32.
pub type CastFn = unsafe extern "C" fn(a: f64, res: *mut f32, context: *mut c_void);

/// Out-of-band request from the instrumented program.
pub type UserCallFn = unsafe extern "C" fn(context: *mut c_void, id: c_int, arg: i64);

/// Called once at process exit.
pub type FinalizeFn = unsafe extern "C" fn(context: *mut c_void);

/// Signature of [`ENTRY_SYMBOL`]. The backend stores its context through
/// `context` and returns its interface by value.
pub type InitFn =
    unsafe extern "C" fn(argc: c_int, argv: *mut *mut c_char, context: *mut *mut c_void) -> BackendInterface;

/// Supported vector widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    X2,
    X4,
    X8,
    X16,
}

impl Width {
    pub const ALL: [Width; 4] = [Width::X2, Width::X4, Width::X8, Width::X16];

    pub const fn lanes(self) -> usize {
        match self {
            Width::X2 => 2,
            Width::X4 => 4,
            Width::X8 => 8,
            Width::X16 => 16,
        }
    }

    /// Position in [`TypeSlots::vectors`].
    pub const fn index(self) -> usize {
        match self {
            Width::X2 => 0,
            Width::X4 => 1,
            Width::X8 => 2,
            Width::X16 => 3,
        }
    }

    pub const fn from_lanes(lanes: usize) -> Option<Self> {
        match lanes {
            2 => Some(Width::X2),
            4 => Some(Width::X4),
            8 => Some(Width::X8),
            16 => Some(Width::X16),
            _ => None,
        }
    }
}

/// Operations that own a slot in a [`TypeSlots`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
    Cmp,
    Fma,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Add,
        Operation::Sub,
        Operation::Mul,
        Operation::Div,
        Operation::Cmp,
        Operation::Fma,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
            Operation::Cmp => "cmp",
            Operation::Fma => "fma",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Vector slots for one width.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VectorSlots<T: 'static> {
    pub add: Option<VectorBinaryFn<T>>,
    pub sub: Option<VectorBinaryFn<T>>,
    pub mul: Option<VectorBinaryFn<T>>,
    pub div: Option<VectorBinaryFn<T>>,
    pub cmp: Option<VectorCmpFn<T>>,
    pub fma: Option<VectorFmaFn<T>>,
}

impl<T: 'static> VectorSlots<T> {
    pub const EMPTY: Self = Self {
        add: None,
        sub: None,
        mul: None,
        div: None,
        cmp: None,
        fma: None,
    };

    pub fn has(&self, op: Operation) -> bool {
        match op {
            Operation::Add => self.add.is_some(),
            Operation::Sub => self.sub.is_some(),
            Operation::Mul => self.mul.is_some(),
            Operation::Div => self.div.is_some(),
            Operation::Cmp => self.cmp.is_some(),
            Operation::Fma => self.fma.is_some(),
        }
    }

    pub fn binary(&self, op: Operation) -> Option<VectorBinaryFn<T>> {
        match op {
            Operation::Add => self.add,
            Operation::Sub => self.sub,
            Operation::Mul => self.mul,
            Operation::Div => self.div,
            Operation::Cmp | Operation::Fma => None,
        }
    }
}

/// Scalar and vector slots for one numeric type.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TypeSlots<T: 'static> {
    pub add: Option<BinaryFn<T>>,
    pub sub: Option<BinaryFn<T>>,
    pub mul: Option<BinaryFn<T>>,
    pub div: Option<BinaryFn<T>>,
    pub cmp: Option<CmpFn<T>>,
    pub fma: Option<FmaFn<T>>,
    /// Indexed by [`Width::index`].
    pub vectors: [VectorSlots<T>; 4],
}

impl<T: 'static> TypeSlots<T> {
    pub const EMPTY: Self = Self {
        add: None,
        sub: None,
        mul: None,
        div: None,
        cmp: None,
        fma: None,
        vectors: [VectorSlots::EMPTY; 4],
    };

    /// `true` when the scalar (`width == None`) or vector slot is present.
    pub fn has(&self, op: Operation, width: Option<Width>) -> bool {
        match width {
            Some(width) => self.vectors[width.index()].has(op),
            None => match op {
                Operation::Add => self.add.is_some(),
                Operation::Sub => self.sub.is_some(),
                Operation::Mul => self.mul.is_some(),
                Operation::Div => self.div.is_some(),
                Operation::Cmp => self.cmp.is_some(),
                Operation::Fma => self.fma.is_some(),
            },
        }
    }

    pub fn binary(&self, op: Operation) -> Option<BinaryFn<T>> {
        match op {
            Operation::Add => self.add,
            Operation::Sub => self.sub,
            Operation::Mul => self.mul,
            Operation::Div => self.div,
            Operation::Cmp | Operation::Fma => None,
        }
    }

    pub fn vector(&self, width: Width) -> &VectorSlots<T> {
        &self.vectors[width.index()]
    }
}

/// Operation table returned by a backend's entry point.
///
/// Created once and never mutated afterwards.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BackendInterface {
    pub abi_version: u32,
    /// NUL-terminated static name used in log messages; may be null.
    pub name: *const c_char,
    pub binary32: TypeSlots<f32>,
    pub binary64: TypeSlots<f64>,
    pub cast_double_to_float: Option<CastFn>,
    pub user_call: Option<UserCallFn>,
    pub finalize: Option<FinalizeFn>,
}

// SAFETY: every field is either plain data, a function pointer, or `name`,
// which points at immutable static storage for the life of the library.
unsafe impl Send for BackendInterface {}
unsafe impl Sync for BackendInterface {}

impl BackendInterface {
    /// An interface with every slot empty.
    pub const EMPTY: Self = Self {
        abi_version: ABI_VERSION,
        name: std::ptr::null(),
        binary32: TypeSlots::EMPTY,
        binary64: TypeSlots::EMPTY,
        cast_double_to_float: None,
        user_call: None,
        finalize: None,
    };

    /// Does this backend implement `op` for `ty` at `width` (`None` is scalar)?
    pub fn implements(&self, op: Operation, ty: FloatType, width: Option<Width>) -> bool {
        match ty {
            FloatType::Binary32 => self.binary32.has(op, width),
            FloatType::Binary64 => self.binary64.has(op, width),
        }
    }

    /// Backend name, or `"<unnamed>"` when the slot is null or not UTF-8.
    pub fn name(&self) -> &str {
        if self.name.is_null() {
            return "<unnamed>";
        }
        // SAFETY: non-null names are NUL-terminated static strings per the ABI.
        unsafe { CStr::from_ptr(self.name) }.to_str().unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn add64(a: f64, b: f64, res: *mut f64, _ctx: *mut c_void) {
        *res = a + b;
    }

    #[test]
    fn empty_interface_implements_nothing() {
        let iface = BackendInterface::EMPTY;
        for op in Operation::ALL {
            for ty in [FloatType::Binary32, FloatType::Binary64] {
                assert!(!iface.implements(op, ty, None));
                for w in Width::ALL {
                    assert!(!iface.implements(op, ty, Some(w)));
                }
            }
        }
        assert_eq!(iface.name(), "<unnamed>");
    }

    #[test]
    fn slot_lookup_is_per_type_and_width() {
        let mut iface = BackendInterface::EMPTY;
        iface.binary64.add = Some(add64);
        iface.name = c"adder".as_ptr();
        assert!(iface.implements(Operation::Add, FloatType::Binary64, None));
        assert!(!iface.implements(Operation::Add, FloatType::Binary32, None));
        assert!(!iface.implements(Operation::Add, FloatType::Binary64, Some(Width::X4)));
        assert_eq!(iface.name(), "adder");
    }

    #[test]
    fn widths_round_trip_lane_counts() {
        for w in Width::ALL {
            assert_eq!(Width::from_lanes(w.lanes()), Some(w));
        }
        assert_eq!(Width::from_lanes(3), None);
    }
}
