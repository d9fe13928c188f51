//! Bit-level rounding of native values to a simulated format.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use vfloat_core::bits::{biased_exponent, normalized_exponent, pow2};
use vfloat_core::Float;

use super::format::PrecisionFormat;
use crate::error::BackendError;

/// How the error bound of a simulated format is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// `precision` mantissa bits relative to each value.
    #[default]
    Rel,
    /// Absolute error bounded by `2^max_abs_error_exponent`.
    Abs,
    /// Both bounds at once.
    All,
}

impl ErrorMode {
    pub const ALL: [ErrorMode; 3] = [ErrorMode::Rel, ErrorMode::Abs, ErrorMode::All];

    pub const fn name(self) -> &'static str {
        match self {
            ErrorMode::Rel => "rel",
            ErrorMode::Abs => "abs",
            ErrorMode::All => "all",
        }
    }
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ErrorMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownErrorMode(s.to_string()))
    }
}

/// Whether a value is an operand or a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
}

/// Everything `round_to_format` needs besides the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundingParams {
    pub format: PrecisionFormat,
    pub error_mode: ErrorMode,
    pub abs_error_exponent: i32,
    /// Denormals-are-zero for inputs.
    pub daz: bool,
    /// Flush-to-zero for outputs.
    pub ftz: bool,
}

impl RoundingParams {
    pub fn relative(format: PrecisionFormat) -> Self {
        Self {
            format,
            error_mode: ErrorMode::Rel,
            abs_error_exponent: 0,
            daz: false,
            ftz: false,
        }
    }
}

enum Precision {
    /// Below the absolute threshold by more than one binade.
    Flush,
    /// One binade below the threshold: rounds to `±2^threshold`.
    Threshold,
    Bits(u32),
}

fn effective_precision<F: Float>(exp: i32, params: &RoundingParams) -> Precision {
    let cap = params.format.precision.min(F::MANTISSA_BITS);
    if params.error_mode == ErrorMode::Rel {
        return Precision::Bits(cap);
    }
    let diff = exp - params.abs_error_exponent;
    if diff < -1 {
        return Precision::Flush;
    }
    if diff == -1 {
        return Precision::Threshold;
    }
    let cap = match params.error_mode {
        ErrorMode::All => cap,
        _ => F::MANTISSA_BITS,
    };
    Precision::Bits((diff as u32).min(cap))
}

/// `2^e`, saturating to infinity above the range and to zero below the
/// smallest subnormal.
fn exp2<F: Float>(e: i32) -> F {
    let min_normal = 1 - F::EXPONENT_BIAS;
    let min_subnormal = min_normal - F::MANTISSA_BITS as i32;
    if e > F::EXPONENT_BIAS {
        F::INFINITY
    } else if e >= min_normal {
        pow2(e)
    } else if e >= min_subnormal {
        F::from_raw(1u64 << (e - min_subnormal))
    } else {
        F::ZERO
    }
}

/// Round to nearest, dropping the `shift` lowest bits of the encoding.
///
/// A half-ULP of the target precision is added with a native addition so
/// that a carry reaches the exponent field, then the tail is masked off.
#[inline]
fn round_dropping<F: Float>(x: F, shift: u32) -> F {
    if shift == 0 {
        return x;
    }
    let head = x.to_raw() & (F::SIGN_MASK | F::EXPONENT_MASK);
    let truncated = F::from_raw(head);
    let half = F::from_raw(head | (1u64 << (shift - 1)));
    let rounded = x + (half - truncated);
    F::from_raw(rounded.to_raw() & (!0u64 << shift))
}

/// Round a value lying below the simulated `emin`, where only
/// `precision - (emin - exp)` bits survive.
fn round_subnormal<F: Float>(x: F, exp: i32, emin: i32, precision: u32) -> F {
    if exp < emin - precision as i32 {
        return x * F::ZERO;
    }
    let pman = F::MANTISSA_BITS as i32;
    let p = precision as i32;
    let shift = if biased_exponent(x) == 0 {
        // Native subnormal: the encoding is anchored at the native emin.
        pman - p + (emin - (1 - F::EXPONENT_BIAS))
    } else {
        pman - p + (emin - exp)
    };
    round_dropping(x, shift.clamp(0, pman) as u32)
}

/// Round `x` to the simulated format described by `params`.
///
/// NaN and infinities pass through; values above `emax` saturate to signed
/// infinity; values below `emin` are rounded as simulated subnormals or
/// flushed when DAZ (inputs) or FTZ (outputs) is set.
pub fn round_to_format<F: Float>(x: F, side: Side, params: &RoundingParams) -> F {
    if !x.is_finite() {
        return x;
    }
    let format = params.format;
    let exp = normalized_exponent(x);

    if exp > format.emax() {
        return x * F::INFINITY;
    }

    let emin = format.emin();
    if exp < emin {
        let flush = match side {
            Side::Input => params.daz,
            Side::Output => params.ftz,
        };
        if flush {
            return x * F::ZERO;
        }
        if x == F::ZERO {
            return x;
        }
        return match effective_precision::<F>(exp, params) {
            Precision::Flush => x * F::ZERO,
            Precision::Threshold => exp2::<F>(params.abs_error_exponent).copysign(x),
            Precision::Bits(p) => round_subnormal(x, exp, emin, p),
        };
    }

    match effective_precision::<F>(exp, params) {
        Precision::Flush => x * F::ZERO,
        Precision::Threshold => exp2::<F>(params.abs_error_exponent).copysign(x),
        Precision::Bits(p) => {
            let rounded = round_dropping(x, F::MANTISSA_BITS - p);
            // A carry out of the top binade overflows the simulated range.
            if normalized_exponent(rounded) > format.emax() {
                rounded * F::INFINITY
            } else {
                rounded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfloat_core::FloatType;

    fn rel(range: u32, precision: u32) -> RoundingParams {
        RoundingParams::relative(PrecisionFormat { range, precision })
    }

    #[test]
    fn rounds_mantissa_to_nearest() {
        let p = rel(11, 2);
        // Ties round up: 1.011b -> 1.10b, 1.001b -> 1.01b.
        assert_eq!(round_to_format(1.375f64, Side::Output, &p), 1.5);
        assert_eq!(round_to_format(1.125f64, Side::Output, &p), 1.25);
        assert_eq!(round_to_format(1.1f64, Side::Output, &p), 1.0);
        // Carry into the exponent.
        assert_eq!(round_to_format(1.9f32, Side::Output, &rel(8, 2)), 2.0);
        assert_eq!(round_to_format(-1.9f32, Side::Output, &rel(8, 2)), -2.0);
    }

    #[test]
    fn native_format_is_identity() {
        let p = RoundingParams::relative(PrecisionFormat::native(FloatType::Binary64));
        for x in [0.1f64, -3.7e-310, 1.0e300, f64::MIN_POSITIVE, 5e-324] {
            assert_eq!(round_to_format(x, Side::Output, &p).to_bits(), x.to_bits());
        }
    }

    #[test]
    fn exponent_range_saturates() {
        // range 5: emax = 15, emin = -14.
        let p = rel(5, 10);
        assert_eq!(round_to_format(65536.0f32, Side::Output, &p), f32::INFINITY);
        assert_eq!(round_to_format(-65536.0f32, Side::Output, &p), f32::NEG_INFINITY);
        assert_eq!(round_to_format(32768.0f32, Side::Output, &p), 32768.0);
        // Rounds up past 2^15 * (2 - 2^-10).
        assert_eq!(round_to_format(65535.9f32, Side::Output, &p), f32::INFINITY);
        // Far below emin - precision.
        let tiny = round_to_format(-1.0e-10f32, Side::Output, &p);
        assert_eq!(tiny.to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn simulated_subnormals_lose_bits() {
        // range 5, precision 10: 1.5 * 2^-15 still fits in the 9 bits left.
        let p = rel(5, 10);
        let x = 1.5 * 2f64.powi(-15);
        assert_eq!(round_to_format(x, Side::Output, &p), x);
        // At 2^-20 only 4 bits remain, so the 2^-8 tail is dropped.
        let y = 2f64.powi(-20) * (1.0 + 2f64.powi(-8));
        assert_eq!(round_to_format(y, Side::Output, &p), 2f64.powi(-20));
        // Smallest simulated subnormal survives.
        let s = 2f64.powi(-24);
        assert_eq!(round_to_format(s, Side::Output, &p), s);
    }

    #[test]
    fn daz_and_ftz_flush_by_side() {
        let mut p = rel(5, 10);
        p.daz = true;
        let x = -2f32.powi(-16);
        assert_eq!(round_to_format(x, Side::Input, &p).to_bits(), (-0.0f32).to_bits());
        assert_eq!(round_to_format(x, Side::Output, &p), x);
        p.daz = false;
        p.ftz = true;
        assert_eq!(round_to_format(x, Side::Output, &p), -0.0);
        assert_eq!(round_to_format(x, Side::Input, &p), x);
    }

    #[test]
    fn native_subnormals_round_against_native_emin() {
        // Lowest simulated bit is 2^-1072, two above the native one.
        let p = rel(11, 50);
        let x = f64::from_bits(0b1011);
        assert_eq!(round_to_format(x, Side::Output, &p).to_bits(), 0b1100);
    }

    #[test]
    fn absolute_error_mode() {
        let p = RoundingParams {
            format: PrecisionFormat { range: 11, precision: 52 },
            error_mode: ErrorMode::Abs,
            abs_error_exponent: -4,
            daz: false,
            ftz: false,
        };
        // 2^-6 is two binades below the threshold.
        assert_eq!(round_to_format(-0.015625f64, Side::Output, &p).to_bits(), (-0.0f64).to_bits());
        // One binade below rounds to the threshold itself.
        assert_eq!(round_to_format(0.04f64, Side::Output, &p), 0.0625);
        // 1.3 keeps 4 fractional bits: 1.3125.
        assert_eq!(round_to_format(1.3f64, Side::Output, &p), 1.3125);
        // `all` additionally caps at the relative precision.
        let all = RoundingParams {
            format: PrecisionFormat { range: 11, precision: 2 },
            error_mode: ErrorMode::All,
            ..p
        };
        assert_eq!(round_to_format(1.3f64, Side::Output, &all), 1.25);
    }

    #[test]
    fn special_values_pass_through() {
        let p = rel(3, 1);
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        assert_eq!(round_to_format(nan, Side::Input, &p).to_bits(), nan.to_bits());
        assert_eq!(round_to_format(f32::NEG_INFINITY, Side::Output, &rel(3, 1)), f32::NEG_INFINITY);
        assert_eq!(round_to_format(-0.0f64, Side::Output, &p).to_bits(), (-0.0f64).to_bits());
        assert_eq!(round_to_format(0.0f64, Side::Input, &p).to_bits(), 0);
    }

    #[test]
    fn exp2_covers_subnormals() {
        assert_eq!(exp2::<f64>(-1074), 5e-324);
        assert_eq!(exp2::<f64>(-1075), 0.0);
        assert_eq!(exp2::<f32>(128), f32::INFINITY);
        assert_eq!(exp2::<f32>(-3), 0.125);
    }
}
