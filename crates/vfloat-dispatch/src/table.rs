//! The dispatch table and the fan-out of every operation to its backends.
//!
//! Backends are independent observers: each one that implements an
//! operation receives the original operands and writes into the same output
//! slot, so when several implement it the last registered one wins.

use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, info};
use vfloat_abi::{BackendInterface, BinaryOp, FcmpPredicate, Operation, TypeSlots, Width};
use vfloat_core::{Float, FloatType};

use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::loader::{load_backend, LoadedBackend};
use crate::backend_list::parse_backend_list;

/// A float type with a slot table in [`BackendInterface`].
pub trait Lane: Float {
    fn slots(interface: &BackendInterface) -> &TypeSlots<Self>;
}

impl Lane for f32 {
    #[inline(always)]
    fn slots(interface: &BackendInterface) -> &TypeSlots<f32> {
        &interface.binary32
    }
}

impl Lane for f64 {
    #[inline(always)]
    fn slots(interface: &BackendInterface) -> &TypeSlots<f64> {
        &interface.binary64
    }
}

/// Scalar operations every configuration must cover.
const MANDATORY: [Operation; 4] = [Operation::Add, Operation::Sub, Operation::Mul, Operation::Div];

/// Registered backends plus the number currently receiving operations.
#[derive(Debug)]
pub struct DispatchTable {
    backends: Vec<LoadedBackend>,
    active: AtomicUsize,
    finalized: AtomicBool,
}

impl DispatchTable {
    /// Build a table over already-created backends, all active.
    pub fn new(backends: Vec<LoadedBackend>) -> Self {
        let active = AtomicUsize::new(backends.len());
        Self {
            backends,
            active,
            finalized: AtomicBool::new(false),
        }
    }

    /// Parse, load and coverage-check the configured backends.
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        let entries = parse_backend_list(&config.backends)?;
        let backends = entries
            .iter()
            .map(|entry| load_backend(entry, config.silent_load))
            .collect::<Result<Vec<_>>>()?;

        let table = Self::new(backends);
        table.check_coverage(config.instrument_fcmp)?;
        debug!(backends = table.len(), "dispatch table ready");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backends currently receiving operations, in registration order.
    pub fn active(&self) -> &[LoadedBackend] {
        let count = self.active.load(Ordering::Acquire).min(self.backends.len());
        &self.backends[..count]
    }

    /// Restrict dispatch to the first `count` registered backends.
    pub fn set_active_backends(&self, count: usize) -> Result<()> {
        if count == 0 || count > self.backends.len() {
            return Err(DispatchError::InvalidActiveCount {
                requested: count,
                loaded: self.backends.len(),
            });
        }
        self.active.store(count, Ordering::Release);
        debug!(count, "active backends changed");
        Ok(())
    }

    /// Fail unless every mandatory scalar operation has an implementation.
    pub fn check_coverage(&self, instrument_fcmp: bool) -> Result<()> {
        let compare: &[Operation] = if instrument_fcmp { &[Operation::Cmp] } else { &[] };

        for &operation in MANDATORY.iter().chain(compare) {
            for ty in [FloatType::Binary32, FloatType::Binary64] {
                let covered = self
                    .backends
                    .iter()
                    .any(|backend| backend.interface().implements(operation, ty, None));
                if !covered {
                    return Err(DispatchError::Coverage { operation, ty });
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn binary<F: Lane>(&self, op: BinaryOp, a: F, b: F) -> F {
        let mut res = F::NAN;
        for backend in self.active() {
            if let Some(slot) = F::slots(backend.interface()).binary(op.operation()) {
                // SAFETY: the slot and context come from the same backend.
                unsafe { slot(a, b, &mut res, backend.context()) };
            }
        }
        res
    }

    #[inline]
    pub fn compare<F: Lane>(&self, predicate: FcmpPredicate, a: F, b: F) -> c_int {
        let mut res = 0;
        for backend in self.active() {
            if let Some(slot) = F::slots(backend.interface()).cmp {
                // SAFETY: as above.
                unsafe { slot(predicate.code(), a, b, &mut res, backend.context()) };
            }
        }
        res
    }

    #[inline]
    pub fn fma<F: Lane>(&self, a: F, b: F, c: F) -> F {
        let mut res = F::NAN;
        for backend in self.active() {
            if let Some(slot) = F::slots(backend.interface()).fma {
                // SAFETY: as above.
                unsafe { slot(a, b, c, &mut res, backend.context()) };
            }
        }
        res
    }

    /// Lane-wise operation. Backends without a slot for this width but with
    /// the scalar slot are called once per lane.
    pub fn binary_vector<F: Lane, const N: usize>(&self, op: BinaryOp, a: &[F; N], b: &[F; N]) -> [F; N] {
        let operation = op.operation();
        let width = Width::from_lanes(N);
        let mut res = [F::NAN; N];

        for backend in self.active() {
            let slots = F::slots(backend.interface());
            let context = backend.context();
            if let Some(slot) = width.and_then(|w| slots.vector(w).binary(operation)) {
                // SAFETY: the slot reads and writes exactly N lanes.
                unsafe { slot(a.as_ptr(), b.as_ptr(), res.as_mut_ptr(), context) };
            } else if let Some(slot) = slots.binary(operation) {
                for lane in 0..N {
                    // SAFETY: scalar slot of the same backend.
                    unsafe { slot(a[lane], b[lane], &mut res[lane], context) };
                }
            }
        }
        res
    }

    pub fn compare_vector<F: Lane, const N: usize>(&self, predicate: FcmpPredicate, a: &[F; N], b: &[F; N]) -> [c_int; N] {
        let width = Width::from_lanes(N);
        let mut res = [0; N];

        for backend in self.active() {
            let slots = F::slots(backend.interface());
            let context = backend.context();
            if let Some(slot) = width.and_then(|w| slots.vector(w).cmp) {
                // SAFETY: the slot reads N lanes and writes N ints.
                unsafe { slot(predicate.code(), a.as_ptr(), b.as_ptr(), res.as_mut_ptr(), context) };
            } else if let Some(slot) = slots.cmp {
                for lane in 0..N {
                    // SAFETY: scalar slot of the same backend.
                    unsafe { slot(predicate.code(), a[lane], b[lane], &mut res[lane], context) };
                }
            }
        }
        res
    }

    pub fn fma_vector<F: Lane, const N: usize>(&self, a: &[F; N], b: &[F; N], c: &[F; N]) -> [F; N] {
        let width = Width::from_lanes(N);
        let mut res = [F::NAN; N];

        for backend in self.active() {
            let slots = F::slots(backend.interface());
            let context = backend.context();
            if let Some(slot) = width.and_then(|w| slots.vector(w).fma) {
                // SAFETY: the slot reads and writes exactly N lanes.
                unsafe { slot(a.as_ptr(), b.as_ptr(), c.as_ptr(), res.as_mut_ptr(), context) };
            } else if let Some(slot) = slots.fma {
                for lane in 0..N {
                    // SAFETY: scalar slot of the same backend.
                    unsafe { slot(a[lane], b[lane], c[lane], &mut res[lane], context) };
                }
            }
        }
        res
    }

    pub fn cast_to_f32(&self, a: f64) -> f32 {
        let mut res = f32::NAN;
        for backend in self.active() {
            if let Some(slot) = backend.interface().cast_double_to_float {
                // SAFETY: as above.
                unsafe { slot(a, &mut res, backend.context()) };
            }
        }
        res
    }

    /// Forward `(id, arg)` to every active backend with a user-call slot.
    pub fn user_call(&self, id: c_int, arg: i64) {
        for backend in self.active() {
            if let Some(slot) = backend.interface().user_call {
                // SAFETY: as above.
                unsafe { slot(backend.context(), id, arg) };
            }
        }
    }

    /// Finalize every loaded backend. Only the first call has an effect.
    pub fn finalize(&self) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        for backend in &self.backends {
            if let Some(slot) = backend.interface().finalize {
                // SAFETY: as above.
                unsafe { slot(backend.context()) };
            }
        }
        info!(backends = self.backends.len(), "backends finalized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use vfloat_abi::{interface_for, into_context, ArgError, Backend, BackendArgs};

    /// Answers every arithmetic operation with `T`.
    struct Tag<const T: u32>;

    impl<const T: u32> Backend for Tag<T> {
        const NAME: &'static CStr = c"tag";
        type Error = ArgError;

        fn configure(_: &BackendArgs) -> std::result::Result<Self, ArgError> {
            Ok(Tag)
        }

        fn binary<F: Float>(&self, _: BinaryOp, _: F, _: F) -> F {
            F::from_f64(f64::from(T))
        }
    }

    fn tag<const T: u32>() -> LoadedBackend {
        LoadedBackend::from_parts(interface_for::<Tag<T>>(), into_context(Tag::<T>))
    }

    #[test]
    fn last_registered_backend_wins() {
        let table = DispatchTable::new(vec![tag::<1>(), tag::<2>()]);
        assert_eq!(table.binary(BinaryOp::Add, 0.5f64, 0.25), 2.0);
        assert_eq!(table.binary(BinaryOp::Div, 0.5f32, 0.25), 2.0);

        table.set_active_backends(1).unwrap();
        assert_eq!(table.binary(BinaryOp::Add, 0.5f64, 0.25), 1.0);
    }

    #[test]
    fn unimplemented_operations_leave_the_initial_value() {
        let table = DispatchTable::new(vec![tag::<1>()]);
        assert!(table.fma(1.0f64, 2.0, 3.0).is_nan());
        assert!(table.cast_to_f32(1.0).is_nan());
        assert_eq!(table.compare(FcmpPredicate::True, 1.0f64, 2.0), 0);
    }

    #[test]
    fn active_count_is_bounded_by_loaded_backends() {
        let table = DispatchTable::new(vec![tag::<1>(), tag::<2>()]);
        for bad in [0, 3] {
            assert!(matches!(
                table.set_active_backends(bad),
                Err(DispatchError::InvalidActiveCount { requested, loaded: 2 }) if requested == bad
            ));
        }
        assert_eq!(table.active().len(), 2);
    }

    #[test]
    fn coverage_requires_every_scalar_arithmetic_op() {
        let mut partial = interface_for::<Tag<1>>();
        partial.binary64.add = None;
        let table = DispatchTable::new(vec![LoadedBackend::from_parts(partial, into_context(Tag::<1>))]);
        assert!(matches!(
            table.check_coverage(false),
            Err(DispatchError::Coverage { operation: Operation::Add, ty: FloatType::Binary64 })
        ));

        let table = DispatchTable::new(vec![tag::<1>()]);
        table.check_coverage(false).unwrap();
        assert!(matches!(
            table.check_coverage(true),
            Err(DispatchError::Coverage { operation: Operation::Cmp, ty: FloatType::Binary32 })
        ));
    }

    #[test]
    fn vectors_fall_back_to_scalar_slots() {
        let mut scalar_only = interface_for::<Tag<5>>();
        scalar_only.binary32.vectors = [vfloat_abi::VectorSlots::EMPTY; 4];
        let table = DispatchTable::new(vec![LoadedBackend::from_parts(scalar_only, into_context(Tag::<5>))]);
        assert_eq!(table.binary_vector(BinaryOp::Mul, &[1.0f32; 4], &[2.0; 4]), [5.0; 4]);
        // Lane counts without a vector slot go lane by lane too.
        assert_eq!(table.binary_vector(BinaryOp::Mul, &[1.0f64; 3], &[2.0; 3]), [5.0; 3]);
    }

    struct Counting(AtomicUsize);

    impl Backend for Counting {
        const NAME: &'static CStr = c"counting";
        type Error = ArgError;

        fn configure(_: &BackendArgs) -> std::result::Result<Self, ArgError> {
            Ok(Counting(AtomicUsize::new(0)))
        }

        fn binary<F: Float>(&self, op: BinaryOp, a: F, b: F) -> F {
            op.apply(a, b)
        }

        fn finalize(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn finalize_runs_once() {
        let context = into_context(Counting(AtomicUsize::new(0)));
        let table = DispatchTable::new(vec![LoadedBackend::from_parts(interface_for::<Counting>(), context)]);
        table.finalize();
        table.finalize();
        // SAFETY: the context was created from a `Counting` above.
        let counting = unsafe { &*(context as *const Counting) };
        assert_eq!(counting.0.load(Ordering::Relaxed), 1);
    }
}
