//! Error-free transformations.
//!
//! Each function returns the rounded result of an operation together with the
//! rounding error it committed, so that `result + error` equals the exact
//! value (exactly for sums and products, to within one rounding for the FMA
//! and division residuals). All of them assume round-to-nearest hardware
//! arithmetic and finite inputs whose result does not overflow.

use crate::bits::{normalized_exponent, Float};

/// Knuth's TwoSum: `s = fl(a + b)` and `e = (a + b) - s` exactly.
#[inline]
pub fn two_sum<F: Float>(a: F, b: F) -> (F, F) {
    let s = a + b;
    (s, two_sum_error(a, b, s))
}

/// Error term of TwoSum for an already computed `s = fl(a + b)`.
#[inline]
pub fn two_sum_error<F: Float>(a: F, b: F, s: F) -> F {
    let z = s - a;
    (a - (s - z)) + (b - z)
}

/// Veltkamp split of `a` into two halves of at most `p/2` significant bits.
#[inline]
pub fn split<F: Float>(a: F) -> (F, F) {
    let c = F::SPLIT_FACTOR * a;
    let hi = c - (c - a);
    (hi, a - hi)
}

/// Dekker's TwoProduct without FMA.
#[inline]
pub fn two_prod<F: Float>(a: F, b: F) -> (F, F) {
    let p = a * b;
    (p, two_prod_error(a, b, p))
}

/// Dekker error term for an already computed `p = fl(a * b)`.
#[inline]
pub fn two_prod_error<F: Float>(a: F, b: F, p: F) -> F {
    let (a1, a2) = split(a);
    let (b1, b2) = split(b);
    (((a1 * b1 - p) + a1 * b2) + a2 * b1) + a2 * b2
}

/// Whether Dekker's product of `a` and `b` is error-free: splitting must not
/// overflow and the partial products must stay above the subnormal range.
#[inline]
pub fn dekker_in_range<F: Float>(a: F, b: F) -> bool {
    let (ea, eb) = (normalized_exponent(a), normalized_exponent(b));
    let split_exponent = normalized_exponent(F::SPLIT_FACTOR) + 1;
    let max = F::EXPONENT_BIAS - split_exponent;
    let min_product = 1 - F::EXPONENT_BIAS + F::MANTISSA_BITS as i32 + 1;
    ea < max && eb < max && ea + eb >= min_product
}

/// TwoProduct using a fused multiply-add: `e = fma(a, b, -p)`.
#[inline]
pub fn two_prod_fma<F: Float>(a: F, b: F) -> (F, F) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

/// Approximate error of `r = fma(a, x, b)` (Boldo and Muller, ErrFmaApprox).
///
/// The returned term is the exact error rounded at most twice, which is
/// enough to decide its sign and compare it against an ULP.
#[inline]
pub fn fma_error<F: Float>(a: F, x: F, b: F, r: F) -> F {
    let (ph, pl) = two_prod_fma(a, x);
    let (uh, ul) = two_sum(b, ph);
    let t = uh - r;
    t + (pl + ul)
}

/// Residual `x - q*y` of the quotient `q = fl(x / y)`, computed exactly with
/// one FMA.
#[inline]
pub fn div_residual<F: Float>(x: F, y: F, q: F) -> F {
    -(q.mul_add(y, -x))
}

/// [`div_residual`] without FMA, from Dekker's product `q*y = p + e`.
///
/// `x - p` is exact since `p` is within a few ULPs of `x`; exact overall
/// when [`dekker_in_range`] holds for `q` and `y`.
#[inline]
pub fn div_residual_dekker<F: Float>(x: F, y: F, q: F) -> F {
    let (p, e) = two_prod(q, y);
    (x - p) - e
}

/// `a*b - p` for `p = fl(a * b)`. Dekker's split replaces the software
/// `mul_add` on targets without a hardware FMA.
#[inline]
pub fn product_error<F: Float>(a: F, b: F, p: F) -> F {
    #[cfg(not(target_feature = "fma"))]
    {
        if dekker_in_range(a, b) {
            return two_prod_error(a, b, p);
        }
    }
    a.mul_add(b, -p)
}

/// `x - q*y` for `q = fl(x / y)`, FMA-free where [`product_error`] is.
#[inline]
pub fn quotient_residual<F: Float>(x: F, y: F, q: F) -> F {
    #[cfg(not(target_feature = "fma"))]
    {
        if dekker_in_range(q, y) {
            return div_residual_dekker(x, y, q);
        }
    }
    div_residual(x, y, q)
}

/// Error `(x - q*y) / y` of the quotient `q = fl(x / y)`.
#[inline]
pub fn div_error<F: Float>(x: F, y: F, q: F) -> F {
    div_residual(x, y, q) / y
}

/// Residual of narrowing `a` to binary32: `a - (f64)(f32)a`, exact.
#[inline]
pub fn cast_residual(a: f64, narrowed: f32) -> f64 {
    a - narrowed as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn finite_f64() -> impl Strategy<Value = f64> {
        (-1.0e150f64..1.0e150).prop_filter("non-zero", |x| *x != 0.0)
    }

    #[test]
    fn two_sum_recovers_lost_bits() {
        let (s, e) = two_sum(1.0f64, 1.0e-20);
        assert_eq!(s, 1.0);
        assert_eq!(e, 1.0e-20);
    }

    #[test]
    fn split_halves_are_narrow() {
        let a = 1.0f64 / 3.0;
        let (hi, lo) = split(a);
        assert_eq!(hi + lo, a);
        assert!(hi.to_bits().trailing_zeros() >= 26);
    }

    #[test]
    fn dekker_range_excludes_split_overflow_and_underflow() {
        assert!(dekker_in_range(1.0f64, 3.0));
        assert!(!dekker_in_range(1.0e300f64, 1.0));
        assert!(!dekker_in_range(1.0e-200f64, 1.0e-200));
        assert!(!dekker_in_range(0.0f64, 1.0));
        assert!(dekker_in_range(1.0e30f32, 1.0e-30));
        assert!(!dekker_in_range(1.0e37f32, 1.0));
    }

    #[test]
    fn fma_error_of_exact_fma_is_zero() {
        let r = 2.0f64.mul_add(3.0, 1.0);
        assert_eq!(fma_error(2.0, 3.0, 1.0, r), 0.0);
    }

    #[test]
    fn division_residual_sign() {
        let q = 1.0f64 / 3.0;
        // 1/3 rounds down in binary64, so the exact quotient lies above q.
        assert!(div_error(1.0, 3.0, q) > 0.0);
        // ...and up in binary32.
        let q32 = 1.0f32 / 3.0;
        assert!(div_error(1.0f32, 3.0, q32) < 0.0);
    }

    #[test]
    fn cast_residual_is_exact() {
        let a = 0.1f64;
        let n = a as f32;
        assert_eq!(cast_residual(a, n), a - n as f64);
        assert_eq!(cast_residual(0.5, 0.5), 0.0);
    }

    proptest! {
        #[test]
        fn two_sum_is_error_free(a in finite_f64(), b in finite_f64()) {
            let (s, e) = two_sum(a, b);
            prop_assert_eq!(s, a + b);
            // The error is itself representable and smaller than half an ULP of s.
            prop_assert!(e.abs() <= s.abs() * f64::EPSILON);
            let (s2, e2) = two_sum(s, e);
            prop_assert_eq!(s2, s);
            prop_assert_eq!(e2, e);
        }

        #[test]
        fn dekker_matches_fma_product(a in -1.0e100f64..1.0e100, b in -1.0e100f64..1.0e100) {
            let (p1, e1) = two_prod(a, b);
            let (p2, e2) = two_prod_fma(a, b);
            prop_assert_eq!(p1, p2);
            prop_assert_eq!(e1, e2);
        }

        #[test]
        fn dekker_residual_matches_fma(x in finite_f64(), y in finite_f64()) {
            let q = x / y;
            prop_assume!(q.is_finite() && q != 0.0 && dekker_in_range(q, y));
            prop_assert_eq!(div_residual_dekker(x, y, q), div_residual(x, y, q));
        }

        #[test]
        fn binary32_product_error_is_exact(a in -1.0e15f32..1.0e15, b in -1.0e15f32..1.0e15) {
            let (p, e) = two_prod_fma(a, b);
            let exact = a as f64 * b as f64;
            prop_assert_eq!(p as f64 + e as f64, exact);
        }
    }
}
