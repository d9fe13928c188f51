//! Bit-level access to IEEE-754 binary32 and binary64 values.
//!
//! Everything above this module is written once, generically over [`Float`],
//! instead of once per precision. The trait is sealed: the runtime only ever
//! emulates the two native formats.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// The two emulated floating-point formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatType {
    Binary32,
    Binary64,
}

impl FloatType {
    /// Short name used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            FloatType::Binary32 => "binary32",
            FloatType::Binary64 => "binary64",
        }
    }

    /// Width of the explicit mantissa field.
    pub const fn mantissa_bits(self) -> u32 {
        match self {
            FloatType::Binary32 => f32::MANTISSA_BITS,
            FloatType::Binary64 => f64::MANTISSA_BITS,
        }
    }

    /// Width of the exponent field.
    pub const fn exponent_bits(self) -> u32 {
        match self {
            FloatType::Binary32 => f32::EXPONENT_BITS,
            FloatType::Binary64 => f64::EXPONENT_BITS,
        }
    }
}

impl fmt::Display for FloatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A native IEEE-754 binary format.
///
/// Bit patterns are exchanged as `u64` so that mask arithmetic can be shared;
/// for `f32` only the low 32 bits are meaningful.
pub trait Float:
    sealed::Sealed
    + Copy
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    const TYPE: FloatType;
    /// Explicit mantissa bits (23 or 52).
    const MANTISSA_BITS: u32;
    /// Exponent field bits (8 or 11).
    const EXPONENT_BITS: u32;
    /// Exponent bias (127 or 1023).
    const EXPONENT_BIAS: i32;
    const SIGN_MASK: u64;
    const EXPONENT_MASK: u64;
    const MANTISSA_MASK: u64;

    const ZERO: Self;
    const ONE: Self;
    const INFINITY: Self;
    const NEG_INFINITY: Self;
    const NAN: Self;
    /// Largest finite value.
    const MAX: Self;
    /// Smallest positive subnormal.
    const DENORM_MIN: Self;
    /// Veltkamp splitting constant `2^ceil(p/2) + 1`.
    const SPLIT_FACTOR: Self;

    fn to_raw(self) -> u64;
    fn from_raw(bits: u64) -> Self;

    fn is_nan(self) -> bool;
    fn is_infinite(self) -> bool;
    fn is_finite(self) -> bool;
    fn is_sign_negative(self) -> bool;
    fn abs(self) -> Self;
    fn copysign(self, sign: Self) -> Self;
    /// Fused multiply-add with a single rounding.
    fn mul_add(self, b: Self, c: Self) -> Self;
    fn to_f64(self) -> f64;
    /// Rounds to nearest when narrowing.
    fn from_f64(value: f64) -> Self;
    fn from_f32(value: f32) -> Self;
    fn to_f32(self) -> f32;
}

macro_rules! impl_float {
    ($ty:ty, $bits:ty, $ftype:expr, $man:expr, $exp:expr, $split:expr) => {
        impl Float for $ty {
            const TYPE: FloatType = $ftype;
            const MANTISSA_BITS: u32 = $man;
            const EXPONENT_BITS: u32 = $exp;
            const EXPONENT_BIAS: i32 = (1 << ($exp - 1)) - 1;
            const SIGN_MASK: u64 = 1 << ($man + $exp);
            const EXPONENT_MASK: u64 = ((1 << $exp) - 1) << $man;
            const MANTISSA_MASK: u64 = (1 << $man) - 1;

            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const INFINITY: Self = <$ty>::INFINITY;
            const NEG_INFINITY: Self = <$ty>::NEG_INFINITY;
            const NAN: Self = <$ty>::NAN;
            const MAX: Self = <$ty>::MAX;
            const DENORM_MIN: Self = <$ty>::from_bits(1);
            const SPLIT_FACTOR: Self = $split;

            #[inline(always)]
            fn to_raw(self) -> u64 {
                self.to_bits() as u64
            }

            #[inline(always)]
            fn from_raw(bits: u64) -> Self {
                <$ty>::from_bits(bits as $bits)
            }

            #[inline(always)]
            fn is_nan(self) -> bool {
                <$ty>::is_nan(self)
            }

            #[inline(always)]
            fn is_infinite(self) -> bool {
                <$ty>::is_infinite(self)
            }

            #[inline(always)]
            fn is_finite(self) -> bool {
                <$ty>::is_finite(self)
            }

            #[inline(always)]
            fn is_sign_negative(self) -> bool {
                <$ty>::is_sign_negative(self)
            }

            #[inline(always)]
            fn abs(self) -> Self {
                <$ty>::abs(self)
            }

            #[inline(always)]
            fn copysign(self, sign: Self) -> Self {
                <$ty>::copysign(self, sign)
            }

            #[inline(always)]
            fn mul_add(self, b: Self, c: Self) -> Self {
                <$ty>::mul_add(self, b, c)
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline(always)]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline(always)]
            fn from_f32(value: f32) -> Self {
                value as $ty
            }

            #[inline(always)]
            fn to_f32(self) -> f32 {
                self as f32
            }
        }
    };
}

impl_float!(f32, u32, FloatType::Binary32, 23, 8, 4097.0);
impl_float!(f64, u64, FloatType::Binary64, 52, 11, 134_217_729.0);

/// `true` for NaN and both infinities.
#[inline]
pub fn is_nan_or_inf<F: Float>(x: F) -> bool {
    !x.is_finite()
}

/// Raw (biased) exponent field.
#[inline]
pub fn biased_exponent<F: Float>(x: F) -> i32 {
    ((x.to_raw() & F::EXPONENT_MASK) >> F::MANTISSA_BITS) as i32
}

/// Unbiased exponent as stored in the encoding.
///
/// Subnormals and zero report `-bias`; use [`normalized_exponent`] when the
/// position of the leading one matters.
#[inline]
pub fn exponent<F: Float>(x: F) -> i32 {
    biased_exponent(x) - F::EXPONENT_BIAS
}

/// Exponent `e` such that `2^e <= |x| < 2^(e+1)`, subnormals included.
///
/// Zero has no such exponent and reports `-bias`.
#[inline]
pub fn normalized_exponent<F: Float>(x: F) -> i32 {
    let biased = biased_exponent(x);
    if biased != 0 {
        return biased - F::EXPONENT_BIAS;
    }
    let mantissa = x.to_raw() & F::MANTISSA_MASK;
    if mantissa == 0 {
        return -F::EXPONENT_BIAS;
    }
    // Leading one position within the mantissa field.
    let lead = 63 - mantissa.leading_zeros() as i32;
    1 - F::EXPONENT_BIAS - (F::MANTISSA_BITS as i32 - lead)
}

/// `2^e` for exponents within the normal range of `F`.
#[inline]
pub fn pow2<F: Float>(e: i32) -> F {
    let biased = (e + F::EXPONENT_BIAS) as u64;
    F::from_raw(biased << F::MANTISSA_BITS)
}

/// Increments the magnitude bit pattern. No special-case handling.
#[inline]
pub fn next_away_from_zero<F: Float>(a: F) -> F {
    let bits = a.to_raw();
    let width_mask = F::SIGN_MASK | (F::SIGN_MASK - 1);
    F::from_raw(bits.wrapping_add(1) & width_mask)
}

/// Decrements the magnitude bit pattern. No special-case handling.
#[inline]
pub fn next_toward_zero<F: Float>(a: F) -> F {
    let bits = a.to_raw();
    let width_mask = F::SIGN_MASK | (F::SIGN_MASK - 1);
    F::from_raw(bits.wrapping_sub(1) & width_mask)
}

/// Smallest representable value strictly greater than finite `a`.
///
/// Both zeros step to the smallest positive subnormal.
#[inline]
pub fn next_up<F: Float>(a: F) -> F {
    if a == F::ZERO {
        F::DENORM_MIN
    } else if a > F::ZERO {
        next_away_from_zero(a)
    } else {
        next_toward_zero(a)
    }
}

/// Largest representable value strictly less than finite `a`.
///
/// Both zeros step to the smallest negative subnormal.
#[inline]
pub fn next_down<F: Float>(a: F) -> F {
    if a == F::ZERO {
        -F::DENORM_MIN
    } else if a > F::ZERO {
        next_toward_zero(a)
    } else {
        next_away_from_zero(a)
    }
}

/// `x * 2^e` without intermediate overflow for exponents far outside the
/// binary64 range.
pub fn scale_by_pow2(mut x: f64, mut e: i32) -> f64 {
    const STEP: i32 = 1000;
    while e > STEP {
        x *= 2f64.powi(STEP);
        e -= STEP;
    }
    while e < -STEP {
        x *= 2f64.powi(-STEP);
        e += STEP;
    }
    x * 2f64.powi(e)
}

/// Number of bits between the leading and the trailing one of the
/// significand of `x`. Zero and non-finite values report 0.
#[inline]
pub fn significant_bits<F: Float>(x: F) -> u32 {
    if x == F::ZERO || !x.is_finite() {
        return 0;
    }
    let mut significand = x.to_raw() & F::MANTISSA_MASK;
    if biased_exponent(x) != 0 {
        significand |= 1 << F::MANTISSA_BITS;
    }
    64 - significand.leading_zeros() - significand.trailing_zeros()
}
