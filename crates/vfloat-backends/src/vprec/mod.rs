//! Variable-precision (VPREC) backend.
//!
//! Emulates a floating-point format with fewer exponent and mantissa bits
//! than the native one. Operands may be rounded to the simulated format
//! before the native operation (inbound) and the result after it
//! (outbound).

pub mod format;
pub mod round;

use std::ffi::CStr;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, error, info};

use vfloat_abi::{Backend, BackendArgs, BinaryOp, Operation, UserCall};
use vfloat_core::{Float, FloatType};

use crate::error::{BackendError, Result};
pub use format::{AtomicFormat, PrecisionFormat};
pub use round::{round_to_format, ErrorMode, RoundingParams, Side};

/// Which values get rounded to the simulated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VprecMode {
    /// Plain native arithmetic.
    Ieee,
    /// Operands and results.
    Full,
    /// Operands only.
    #[serde(rename = "ib")]
    Inbound,
    /// Results only.
    #[default]
    #[serde(rename = "ob")]
    Outbound,
}

impl VprecMode {
    pub const ALL: [VprecMode; 4] = [VprecMode::Ieee, VprecMode::Full, VprecMode::Inbound, VprecMode::Outbound];

    pub const fn name(self) -> &'static str {
        match self {
            VprecMode::Ieee => "ieee",
            VprecMode::Full => "full",
            VprecMode::Inbound => "ib",
            VprecMode::Outbound => "ob",
        }
    }

    #[inline]
    pub const fn rounds_inputs(self) -> bool {
        matches!(self, VprecMode::Full | VprecMode::Inbound)
    }

    #[inline]
    pub const fn rounds_outputs(self) -> bool {
        matches!(self, VprecMode::Full | VprecMode::Outbound)
    }
}

impl fmt::Display for VprecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VprecMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        VprecMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownVprecMode(s.to_string()))
    }
}

/// Smallest normal binary64 exponent; the default absolute-error threshold.
pub const DEFAULT_ABS_ERROR_EXPONENT: i32 = -1022;

/// Options accepted by the VPREC backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VprecConfig {
    pub binary32: PrecisionFormat,
    pub binary64: PrecisionFormat,
    pub mode: VprecMode,
    pub error_mode: ErrorMode,
    pub max_abs_error_exponent: i32,
    pub daz: bool,
    pub ftz: bool,
}

impl Default for VprecConfig {
    fn default() -> Self {
        Self {
            binary32: PrecisionFormat::native(FloatType::Binary32),
            binary64: PrecisionFormat::native(FloatType::Binary64),
            mode: VprecMode::default(),
            error_mode: ErrorMode::default(),
            max_abs_error_exponent: DEFAULT_ABS_ERROR_EXPONENT,
            daz: false,
            ftz: false,
        }
    }
}

impl VprecConfig {
    pub const OPTIONS: &'static [&'static str] = &[
        "precision-binary32",
        "range-binary32",
        "precision-binary64",
        "range-binary64",
        "mode",
        "error-mode",
        "max-abs-error-exponent",
        "daz",
        "ftz",
    ];

    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        args.reject_unknown(Self::OPTIONS)?;
        let mut config = Self::default();

        let b32 = FloatType::Binary32;
        if let Some(p) = args.value::<i64>("precision-binary32")? {
            config.binary32 = config.binary32.with_precision(b32, p)?;
        }
        if let Some(r) = args.value::<i64>("range-binary32")? {
            config.binary32 = config.binary32.with_range(b32, r)?;
        }
        let b64 = FloatType::Binary64;
        if let Some(p) = args.value::<i64>("precision-binary64")? {
            config.binary64 = config.binary64.with_precision(b64, p)?;
        }
        if let Some(r) = args.value::<i64>("range-binary64")? {
            config.binary64 = config.binary64.with_range(b64, r)?;
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
        config.daz = args.flag("daz")?;
        config.ftz = args.flag("ftz")?;
        Ok(config)
    }
}

pub struct VprecBackend {
    config: VprecConfig,
    binary32: AtomicFormat,
    binary64: AtomicFormat,
}

impl VprecBackend {
    pub fn new(config: VprecConfig) -> Self {
        Self {
            binary32: AtomicFormat::new(FloatType::Binary32, config.binary32),
            binary64: AtomicFormat::new(FloatType::Binary64, config.binary64),
            config,
        }
    }

    pub fn config(&self) -> &VprecConfig {
        &self.config
    }

    fn slot(&self, ty: FloatType) -> &AtomicFormat {
        match ty {
            FloatType::Binary32 => &self.binary32,
            FloatType::Binary64 => &self.binary64,
        }
    }

    /// Format currently in effect for `ty`.
    pub fn format(&self, ty: FloatType) -> PrecisionFormat {
        self.slot(ty).load()
    }

    pub fn set_precision(&self, ty: FloatType, precision: i64) -> Result<PrecisionFormat> {
        self.slot(ty).set_precision(precision)
    }

    pub fn set_range(&self, ty: FloatType, range: i64) -> Result<PrecisionFormat> {
        self.slot(ty).set_range(range)
    }

    #[inline]
    pub fn params(&self, ty: FloatType) -> RoundingParams {
        RoundingParams {
            format: self.format(ty),
            error_mode: self.config.error_mode,
            abs_error_exponent: self.config.max_abs_error_exponent,
            daz: self.config.daz,
            ftz: self.config.ftz,
        }
    }

    #[inline]
    fn round_input<F: Float>(&self, x: F, params: &RoundingParams) -> F {
        if self.config.mode.rounds_inputs() {
            round_to_format(x, Side::Input, params)
        } else {
            x
        }
    }

    #[inline]
    fn round_output<F: Float>(&self, x: F, params: &RoundingParams) -> F {
        if self.config.mode.rounds_outputs() {
            round_to_format(x, Side::Output, params)
        } else {
            x
        }
    }

    fn apply_user_call(&self, call: UserCall) -> Result<()> {
        match call {
            UserCall::SetPrecision(ty, value) => {
                let format = self.set_precision(ty, value)?;
                debug!(%ty, precision = format.precision, "vprec precision changed");
            }
            UserCall::SetRange(ty, value) => {
                let format = self.set_range(ty, value)?;
                debug!(%ty, range = format.range, "vprec range changed");
            }
            other => debug!(?other, "vprec backend ignores user call"),
        }
        Ok(())
    }
}

impl Backend for VprecBackend {
    const NAME: &'static CStr = c"vprec";
    type Error = BackendError;

    fn configure(args: &BackendArgs) -> Result<Self> {
        let config = VprecConfig::from_args(args)?;
        info!(
            precision_binary32 = config.binary32.precision,
            range_binary32 = config.binary32.range,
            precision_binary64 = config.binary64.precision,
            range_binary64 = config.binary64.range,
            mode = %config.mode,
            error_mode = %config.error_mode,
            max_abs_error_exponent = config.max_abs_error_exponent,
            daz = config.daz,
            ftz = config.ftz,
            "vprec backend configured"
        );
        if let Ok(json) = serde_json::to_string(&config) {
            debug!(config = %json, "vprec configuration");
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
        if self.config.mode == VprecMode::Ieee {
            return op.apply(a, b);
        }
        let params = self.params(F::TYPE);
        let a = self.round_input(a, &params);
        let b = self.round_input(b, &params);
        self.round_output(op.apply(a, b), &params)
    }

    fn fma<F: Float>(&self, a: F, b: F, c: F) -> F {
        if self.config.mode == VprecMode::Ieee {
            return a.mul_add(b, c);
        }
        let params = self.params(F::TYPE);
        let a = self.round_input(a, &params);
        let b = self.round_input(b, &params);
        let c = self.round_input(c, &params);
        self.round_output(a.mul_add(b, c), &params)
    }

    fn cast_to_f32(&self, a: f64) -> f32 {
        if self.config.mode == VprecMode::Ieee {
            return a as f32;
        }
        let a = self.round_input(a, &self.params(FloatType::Binary64));
        self.round_output(a as f32, &self.params(FloatType::Binary32))
    }

    fn user_call(&self, call: UserCall) {
        if let Err(err) = self.apply_user_call(call) {
            error!(%err, "rejected vprec user call");
        }
    }

    fn finalize(&self) {
        debug!(
            binary32 = ?self.format(FloatType::Binary32),
            binary64 = ?self.format(FloatType::Binary64),
            "vprec backend finalized"
        );
    }
}
