//! Cancellation detection backend.
//!
//! Additions and subtractions whose result lost at least `--tolerance`
//! leading bits relative to the larger operand are perturbed with a
//! Monte-Carlo noise of the magnitude of the cancelled bits. Products,
//! quotients, FMAs and binary64 to binary32 casts are computed natively.

use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use vfloat_abi::{Backend, BackendArgs, BinaryOp, Operation, UserCall};
use vfloat_core::bits::{normalized_exponent, scale_by_pow2};
use vfloat_core::{Float, RandomSource};

use crate::error::{BackendError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationConfig {
    /// Smallest cancellation, in bits, that triggers the noise.
    pub tolerance: u32,
    /// Log every detected cancellation.
    pub warning: bool,
    pub seed: Option<u64>,
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            tolerance: 1,
            warning: false,
            seed: None,
        }
    }
}

impl CancellationConfig {
    pub const OPTIONS: &'static [&'static str] = &["tolerance", "warning", "seed"];

    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        args.reject_unknown(Self::OPTIONS)?;
        let tolerance = match args.raw("tolerance")? {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| BackendError::InvalidTolerance(raw.to_string()))?,
        };
        Ok(Self {
            tolerance,
            warning: args.flag("warning")?,
            seed: args.value("seed")?,
        })
    }
}

/// Number of leading bits lost by `res = a ± b`.
pub fn cancellation_size<F: Float>(a: F, b: F, res: F) -> i32 {
    normalized_exponent(a).max(normalized_exponent(b)) - normalized_exponent(res)
}

pub struct CancellationBackend {
    config: CancellationConfig,
    rng: RandomSource,
    detected: AtomicU64,
}

impl CancellationBackend {
    pub fn new(config: CancellationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => RandomSource::fixed(seed),
            None => RandomSource::entropy(),
        };
        Self {
            config,
            rng,
            detected: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CancellationConfig {
        &self.config
    }

    /// Cancellations seen so far, across threads.
    pub fn detected(&self) -> u64 {
        self.detected.load(Ordering::Relaxed)
    }

    fn perturb<F: Float>(&self, a: F, b: F, res: F) -> F {
        if res == F::ZERO || !res.is_finite() || !a.is_finite() || !b.is_finite() {
            return res;
        }
        let cancellation = cancellation_size(a, b, res);
        if cancellation < self.config.tolerance as i32 {
            return res;
        }
        self.detected.fetch_add(1, Ordering::Relaxed);
        if self.config.warning {
            warn!(size = cancellation, "cancellation of size {} detected", cancellation);
        }
        let noise_exponent = normalized_exponent(res) - (cancellation - 1);
        let draw = self.rng.with_state(|s| s.next_f64()) - 0.5;
        F::from_f64(res.to_f64() + scale_by_pow2(draw, noise_exponent))
    }
}

impl Backend for CancellationBackend {
    const NAME: &'static CStr = c"cancellation";
    type Error = BackendError;

    fn configure(args: &BackendArgs) -> Result<Self> {
        let config = CancellationConfig::from_args(args)?;
        info!(tolerance = config.tolerance, warning = config.warning, "cancellation backend configured");
        if let Ok(json) = serde_json::to_string(&config) {
            debug!(config = %json, "cancellation configuration");
        }
        Ok(Self::new(config))
    }

    fn implements(op: Operation) -> bool {
        op != Operation::Cmp
    }

    fn implements_cast() -> bool {
        true
    }

    #[inline]
    fn binary<F: Float>(&self, op: BinaryOp, a: F, b: F) -> F {
        let res = op.apply(a, b);
        match op {
            BinaryOp::Add | BinaryOp::Sub => self.perturb(a, b, res),
            BinaryOp::Mul | BinaryOp::Div => res,
        }
    }

    fn user_call(&self, call: UserCall) {
        match call {
            UserCall::SetSeed(seed) => self.rng.reseed_current_thread(seed),
            other => debug!(?other, "cancellation backend ignores user call"),
        }
    }

    fn finalize(&self) {
        info!(detected = self.detected(), "cancellation backend finalized");
    }
}
