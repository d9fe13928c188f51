//! Monte Carlo Arithmetic backend.
//!
//! Values are perturbed with a uniform noise `(u - 0.5) * 2^(e - t + 1)`,
//! where `e` is the exponent of the value and `t` the virtual precision of
//! its type. The mode decides which values get the noise: the operands
//! (precision bounding), the result (random rounding) or both.
//!
//! Binary32 operations are evaluated in binary64. Results keep their
//! rounding error next to them, so the output noise is applied to the exact
//! result and the final rounding sees both.

use std::ffi::CStr;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tracing::{debug, error, info};

use vfloat_abi::{Backend, BackendArgs, BinaryOp, Operation, UserCall};
use vfloat_core::bits::{biased_exponent, normalized_exponent, scale_by_pow2, significant_bits};
use vfloat_core::{eft, Float, FloatType, RandomSource};

use crate::error::{BackendError, Result};
use crate::vprec::{ErrorMode, DEFAULT_ABS_ERROR_EXPONENT};

/// Which values receive the noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McaMode {
    /// No noise at all.
    Ieee,
    /// Operands and result.
    #[default]
    Mca,
    /// Precision bounding: operands only.
    Pb,
    /// Random rounding: results only, and only inexact ones.
    Rr,
}

impl McaMode {
    pub const ALL: [McaMode; 4] = [McaMode::Ieee, McaMode::Mca, McaMode::Pb, McaMode::Rr];

    pub const fn name(self) -> &'static str {
        match self {
            McaMode::Ieee => "ieee",
            McaMode::Mca => "mca",
            McaMode::Pb => "pb",
            McaMode::Rr => "rr",
        }
    }

    #[inline]
    pub const fn perturbs_inputs(self) -> bool {
        matches!(self, McaMode::Mca | McaMode::Pb)
    }

    #[inline]
    pub const fn perturbs_output(self) -> bool {
        matches!(self, McaMode::Mca | McaMode::Rr)
    }
}

impl fmt::Display for McaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for McaMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        McaMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownMcaMode(s.to_string()))
    }
}

pub const PRECISION_MIN: u32 = 1;
/// Binary32 is evaluated in binary64, whose mantissa field bounds it.
pub const PRECISION_BINARY32_MAX: u32 = 52;
pub const PRECISION_BINARY64_MAX: u32 = 53;

/// Validate a virtual precision for `ty`.
pub fn check_precision(ty: FloatType, value: i64) -> Result<u32> {
    let max = match ty {
        FloatType::Binary32 => PRECISION_BINARY32_MAX,
        FloatType::Binary64 => PRECISION_BINARY64_MAX,
    };
    match u32::try_from(value) {
        Ok(precision) if (PRECISION_MIN..=max).contains(&precision) => Ok(precision),
        _ => Err(BackendError::PrecisionOutOfRange {
            ty,
            value,
            min: PRECISION_MIN,
            max,
        }),
    }
}

/// Options accepted by the MCA backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McaConfig {
    pub precision_binary32: u32,
    pub precision_binary64: u32,
    pub mode: McaMode,
    pub error_mode: ErrorMode,
    pub max_abs_error_exponent: i32,
    pub seed: Option<u64>,
    /// Probability that an eligible value is perturbed, in `(0, 1]`.
    pub sparsity: f64,
    pub daz: bool,
    pub ftz: bool,
}

impl Default for McaConfig {
    fn default() -> Self {
        Self {
            precision_binary32: f32::MANTISSA_DIGITS,
            precision_binary64: f64::MANTISSA_DIGITS,
            mode: McaMode::default(),
            error_mode: ErrorMode::default(),
            max_abs_error_exponent: DEFAULT_ABS_ERROR_EXPONENT,
            seed: None,
            sparsity: 1.0,
            daz: false,
            ftz: false,
        }
    }
}

impl McaConfig {
    pub const OPTIONS: &'static [&'static str] = &[
        "precision-binary32",
        "precision-binary64",
        "mode",
        "error-mode",
        "max-abs-error-exponent",
        "seed",
        "sparsity",
        "daz",
        "ftz",
    ];

    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        args.reject_unknown(Self::OPTIONS)?;
        let mut config = Self::default();

        if let Some(p) = args.value::<i64>("precision-binary32")? {
            config.precision_binary32 = check_precision(FloatType::Binary32, p)?;
        }
        if let Some(p) = args.value::<i64>("precision-binary64")? {
            config.precision_binary64 = check_precision(FloatType::Binary64, p)?;
        }
        if let Some(mode) = args.raw("mode")? {
            config.mode = mode.parse()?;
        }
        if let Some(mode) = args.raw("error-mode")? {
            config.error_mode = mode.parse()?;
        }
        if let Some(exp) = args.value("max-abs-error-exponent")? {
            config.max_abs_error_exponent = exp;
        }
        if let Some(raw) = args.raw("sparsity")? {
            config.sparsity = parse_sparsity(raw)?;
        }
        config.seed = args.value("seed")?;
        config.daz = args.flag("daz")?;
        config.ftz = args.flag("ftz")?;
        Ok(config)
    }

    fn relative_noise(&self) -> bool {
        matches!(self.error_mode, ErrorMode::Rel | ErrorMode::All)
    }

    fn absolute_noise(&self) -> bool {
        matches!(self.error_mode, ErrorMode::Abs | ErrorMode::All)
    }
}

fn parse_sparsity(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(s) if s > 0.0 && s <= 1.0 => Ok(s),
        _ => Err(BackendError::InvalidSparsity(raw.to_string())),
    }
}

/// Subnormals become a zero of the same sign.
#[inline]
fn flush_subnormal<F: Float>(x: F) -> F {
    if biased_exponent(x) == 0 {
        F::ZERO.copysign(x)
    } else {
        x
    }
}

#[inline]
fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// `op(a, b)` as a rounded result and its rounding error.
#[inline]
fn exact_binary(op: BinaryOp, a: f64, b: f64) -> (f64, f64) {
    let hi = op.apply(a, b);
    if !hi.is_finite() {
        return (hi, 0.0);
    }
    let lo = match op {
        BinaryOp::Add => eft::two_sum_error(a, b, hi),
        BinaryOp::Sub => eft::two_sum_error(a, -b, hi),
        BinaryOp::Mul => eft::product_error(a, b, hi),
        BinaryOp::Div => eft::quotient_residual(a, b, hi) / b,
    };
    (hi, finite_or_zero(lo))
}

pub struct McaBackend {
    config: McaConfig,
    binary32: AtomicU32,
    binary64: AtomicU32,
    rng: RandomSource,
}

impl McaBackend {
    pub fn new(config: McaConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => RandomSource::fixed(seed),
            None => RandomSource::entropy(),
        };
        Self {
            binary32: AtomicU32::new(config.precision_binary32),
            binary64: AtomicU32::new(config.precision_binary64),
            rng,
            config,
        }
    }

    pub fn config(&self) -> &McaConfig {
        &self.config
    }

    pub fn random_source(&self) -> &RandomSource {
        &self.rng
    }

    fn slot(&self, ty: FloatType) -> &AtomicU32 {
        match ty {
            FloatType::Binary32 => &self.binary32,
            FloatType::Binary64 => &self.binary64,
        }
    }

    /// Virtual precision currently in effect for `ty`.
    pub fn precision(&self, ty: FloatType) -> u32 {
        self.slot(ty).load(Ordering::Relaxed)
    }

    pub fn set_precision(&self, ty: FloatType, value: i64) -> Result<u32> {
        let precision = check_precision(ty, value)?;
        self.slot(ty).store(precision, Ordering::Relaxed);
        Ok(precision)
    }

    /// `(u - 0.5) * 2^exponent` with `u` uniform in `[0, 1)`.
    #[inline]
    fn noise(&self, exponent: i32) -> f64 {
        let centered = self.rng.with_state(|s| s.next_f64()) - 0.5;
        scale_by_pow2(centered, exponent)
    }

    /// One draw deciding whether sparsity skips this value.
    #[inline]
    fn skips(&self) -> bool {
        self.config.sparsity < 1.0 && self.rng.with_state(|s| s.next_f64()) > self.config.sparsity
    }

    /// Perturb `hi + lo`, where `lo` is the rounding error of `hi`, and
    /// round the sum back to binary64.
    fn inexact(&self, hi: f64, lo: f64, precision: u32) -> f64 {
        if hi == 0.0 || !hi.is_finite() {
            return hi;
        }
        if self.config.mode == McaMode::Rr && lo == 0.0 && significant_bits(hi) <= precision {
            return hi;
        }
        if self.skips() {
            return hi;
        }
        let mut noise = 0.0;
        if self.config.relative_noise() {
            noise += self.noise(normalized_exponent(hi) - (precision as i32 - 1));
        }
        if self.config.absolute_noise() {
            noise += self.noise(self.config.max_abs_error_exponent);
        }
        hi + (lo + noise)
    }

    #[inline]
    fn input<F: Float>(&self, x: F, precision: u32) -> f64 {
        let x = if self.config.daz { flush_subnormal(x) } else { x };
        if self.config.mode.perturbs_inputs() {
            self.inexact(x.to_f64(), 0.0, precision)
        } else {
            x.to_f64()
        }
    }

    #[inline]
    fn output<F: Float>(&self, hi: f64, lo: f64, precision: u32) -> F {
        let res = if self.config.mode.perturbs_output() {
            F::from_f64(self.inexact(hi, lo, precision))
        } else {
            F::from_f64(hi)
        };
        if self.config.ftz {
            flush_subnormal(res)
        } else {
            res
        }
    }

    fn apply_user_call(&self, call: UserCall) -> Result<()> {
        match call {
            UserCall::SetPrecision(ty, value) => {
                let precision = self.set_precision(ty, value)?;
                debug!(%ty, precision, "mca precision changed");
            }
            UserCall::SetSeed(seed) => self.rng.reseed_current_thread(seed),
            other => debug!(?other, "mca backend ignores user call"),
        }
        Ok(())
    }
}

impl Backend for McaBackend {
    const NAME: &'static CStr = c"mca";
    type Error = BackendError;

    fn configure(args: &BackendArgs) -> Result<Self> {
        let config = McaConfig::from_args(args)?;
        info!(
            precision_binary32 = config.precision_binary32,
            precision_binary64 = config.precision_binary64,
            mode = %config.mode,
            error_mode = %config.error_mode,
            sparsity = config.sparsity,
            seed = ?config.seed,
            daz = config.daz,
            ftz = config.ftz,
            "mca backend configured"
        );
        if let Ok(json) = serde_json::to_string(&config) {
            debug!(config = %json, "mca configuration");
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
        let precision = self.precision(F::TYPE);
        let a = self.input(a, precision);
        let b = self.input(b, precision);
        let (hi, lo) = exact_binary(op, a, b);
        self.output(hi, lo, precision)
    }

    fn fma<F: Float>(&self, a: F, b: F, c: F) -> F {
        let precision = self.precision(F::TYPE);
        let a = self.input(a, precision);
        let b = self.input(b, precision);
        let c = self.input(c, precision);
        let hi = a.mul_add(b, c);
        let lo = if hi.is_finite() && (a * b).is_finite() {
            finite_or_zero(eft::fma_error(a, b, c, hi))
        } else {
            0.0
        };
        self.output(hi, lo, precision)
    }

    fn cast_to_f32(&self, a: f64) -> f32 {
        let a = self.input(a, self.precision(FloatType::Binary64));
        let narrowed = a as f32;
        let lo = if narrowed.is_finite() {
            eft::cast_residual(a, narrowed)
        } else {
            0.0
        };
        self.output(f64::from(narrowed), lo, self.precision(FloatType::Binary32))
    }

    fn user_call(&self, call: UserCall) {
        if let Err(err) = self.apply_user_call(call) {
            error!(%err, "rejected mca user call");
        }
    }

    fn finalize(&self) {
        debug!(
            binary32 = self.precision(FloatType::Binary32),
            binary64 = self.precision(FloatType::Binary64),
            threads = self.rng.threads_seen(),
            "mca backend finalized"
        );
    }
}
