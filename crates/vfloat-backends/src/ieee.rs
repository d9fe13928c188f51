//! Pass-through IEEE-754 backend.
//!
//! Computes every operation natively. Useful as a reference run, as a
//! tracer (`--debug`, `--debug-binary`) and as an operation counter
//! (`--count-op`).

use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info};

use vfloat_abi::{Backend, BackendArgs, BinaryOp, FcmpPredicate, Operation, UserCall};
use vfloat_core::Float;

use crate::error::{BackendError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IeeeConfig {
    /// Trace every operation with decimal operands.
    pub debug: bool,
    /// Trace every operation with raw bit patterns.
    pub debug_binary: bool,
    /// Omit the backend name from traces.
    pub no_backend_name: bool,
    pub count_op: bool,
}

impl IeeeConfig {
    pub const OPTIONS: &'static [&'static str] = &["debug", "debug-binary", "no-backend-name", "count-op"];

    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        args.reject_unknown(Self::OPTIONS)?;
        Ok(Self {
            debug: args.flag("debug")?,
            debug_binary: args.flag("debug-binary")?,
            no_backend_name: args.flag("no-backend-name")?,
            count_op: args.flag("count-op")?,
        })
    }

    fn traces(&self) -> bool {
        self.debug || self.debug_binary
    }
}

/// Per-operation counters, shared by all threads.
#[derive(Debug, Default)]
pub struct OperationCounts {
    add: AtomicU64,
    sub: AtomicU64,
    mul: AtomicU64,
    div: AtomicU64,
    cmp: AtomicU64,
    fma: AtomicU64,
    cast: AtomicU64,
}

/// Point-in-time copy of [`OperationCounts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountSnapshot {
    pub add: u64,
    pub sub: u64,
    pub mul: u64,
    pub div: u64,
    pub cmp: u64,
    pub fma: u64,
    pub cast: u64,
}

impl OperationCounts {
    fn counter(&self, op: Operation) -> &AtomicU64 {
        match op {
            Operation::Add => &self.add,
            Operation::Sub => &self.sub,
            Operation::Mul => &self.mul,
            Operation::Div => &self.div,
            Operation::Cmp => &self.cmp,
            Operation::Fma => &self.fma,
        }
    }

    #[inline]
    pub fn record(&self, op: Operation) {
        self.counter(op).fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cast(&self) {
        self.cast.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountSnapshot {
            add: load(&self.add),
            sub: load(&self.sub),
            mul: load(&self.mul),
            div: load(&self.div),
            cmp: load(&self.cmp),
            fma: load(&self.fma),
            cast: load(&self.cast),
        }
    }
}

pub struct IeeeBackend {
    config: IeeeConfig,
    counts: OperationCounts,
}

impl IeeeBackend {
    pub fn new(config: IeeeConfig) -> Self {
        Self {
            config,
            counts: OperationCounts::default(),
        }
    }

    pub fn config(&self) -> &IeeeConfig {
        &self.config
    }

    pub fn counts(&self) -> CountSnapshot {
        self.counts.snapshot()
    }

    fn header(&self) -> &'static str {
        match (self.config.no_backend_name, self.config.debug) {
            (true, _) => "",
            (false, true) => "ieee",
            (false, false) => "ieee_bin",
        }
    }

    fn render<F: Float>(&self, x: F) -> String {
        if self.config.debug {
            format!("{x}")
        } else {
            format!("{:#x}", x.to_raw())
        }
    }

    fn trace_arithmetic<F: Float>(&self, op: &str, operands: &[F], result: F) {
        if !self.config.traces() {
            return;
        }
        let operands: Vec<String> = operands.iter().map(|&x| self.render(x)).collect();
        debug!(
            target: "vfloat::ieee",
            backend = self.header(),
            ty = %F::TYPE,
            "{} {} -> {}",
            op,
            operands.join(" "),
            self.render(result)
        );
    }
}

impl Backend for IeeeBackend {
    const NAME: &'static CStr = c"ieee";
    type Error = BackendError;

    fn configure(args: &BackendArgs) -> Result<Self> {
        let config = IeeeConfig::from_args(args)?;
        if let Ok(json) = serde_json::to_string(&config) {
            debug!(config = %json, "ieee backend configured");
        }
        Ok(Self::new(config))
    }

    fn implements(_op: Operation) -> bool {
        true
    }

    fn implements_cast() -> bool {
        true
    }

    #[inline]
    fn binary<F: Float>(&self, op: BinaryOp, a: F, b: F) -> F {
        let res = op.apply(a, b);
        if self.config.count_op {
            self.counts.record(op.operation());
        }
        self.trace_arithmetic(op.operation().name(), &[a, b], res);
        res
    }

    fn fma<F: Float>(&self, a: F, b: F, c: F) -> F {
        let res = a.mul_add(b, c);
        if self.config.count_op {
            self.counts.record(Operation::Fma);
        }
        self.trace_arithmetic("fma", &[a, b, c], res);
        res
    }

    fn compare<F: Float>(&self, predicate: FcmpPredicate, a: F, b: F) -> bool {
        let res = predicate.evaluate(a, b);
        if self.config.count_op {
            self.counts.record(Operation::Cmp);
        }
        if self.config.traces() {
            debug!(
                target: "vfloat::ieee",
                backend = self.header(),
                ty = %F::TYPE,
                "{} [{:?}] {} -> {}",
                self.render(a),
                predicate,
                self.render(b),
                res
            );
        }
        res
    }

    fn cast_to_f32(&self, a: f64) -> f32 {
        let res = a as f32;
        if self.config.count_op {
            self.counts.record_cast();
        }
        if self.config.traces() {
            debug!(
                target: "vfloat::ieee",
                backend = self.header(),
                "cast {} -> {}",
                self.render(a),
                self.render(res)
            );
        }
        res
    }

    fn user_call(&self, call: UserCall) {
        debug!(?call, "ieee backend ignores user call");
    }

    fn finalize(&self) {
        if !self.config.count_op {
            return;
        }
        let counts = self.counts();
        match serde_json::to_string(&counts) {
            Ok(json) => info!(counts = %json, "operations count"),
            Err(_) => info!(?counts, "operations count"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(argv: &[&str]) -> IeeeBackend {
        IeeeBackend::configure(&BackendArgs::parse(argv).unwrap()).unwrap()
    }

    #[test]
    fn results_are_native() {
        let b = backend(&["builtin:ieee", "--debug"]);
        assert_eq!(b.binary(BinaryOp::Div, 1.0f64, 3.0).to_bits(), (1.0f64 / 3.0).to_bits());
        assert_eq!(b.fma(2.0f32, 3.0, 1.0), 7.0);
        assert_eq!(b.cast_to_f32(0.1), 0.1f32);
        assert!(b.compare(FcmpPredicate::Une, f64::NAN, 1.0));
        assert!(!b.compare(FcmpPredicate::Oeq, f64::NAN, f64::NAN));
    }

    #[test]
    fn counts_only_when_asked() {
        let b = backend(&["builtin:ieee", "--count-op"]);
        b.binary(BinaryOp::Add, 1.0f32, 2.0);
        b.binary(BinaryOp::Add, 1.0f64, 2.0);
        b.binary(BinaryOp::Mul, 1.0f64, 2.0);
        b.compare(FcmpPredicate::Olt, 1.0f32, 2.0);
        b.fma(1.0f64, 1.0, 1.0);
        b.cast_to_f32(1.0);
        assert_eq!(
            b.counts(),
            CountSnapshot {
                add: 2,
                mul: 1,
                cmp: 1,
                fma: 1,
                cast: 1,
                ..CountSnapshot::default()
            }
        );

        let quiet = backend(&["builtin:ieee"]);
        quiet.binary(BinaryOp::Sub, 1.0f64, 2.0);
        assert_eq!(quiet.counts(), CountSnapshot::default());
    }

    #[test]
    fn rejects_values_on_flags() {
        let err = IeeeConfig::from_args(&BackendArgs::parse(&["i", "--debug=yes"]).unwrap());
        assert!(matches!(err, Err(BackendError::Args(_))));
    }
}
