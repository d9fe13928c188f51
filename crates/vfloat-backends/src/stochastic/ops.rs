//! Operations paired with their exact rounding error.
//!
//! Every operation exposes the hardware result, the signed error committed
//! by round-to-nearest (`exact - nearest`), and a cheaper quantity with only
//! the sign of that error guaranteed. The rounding policies only ever look
//! at these three.

use std::marker::PhantomData;

use vfloat_core::eft;
use vfloat_core::{Float, FloatType};

/// An operation the stochastic engine can round.
pub trait ExactOp {
    type Real: Float;
    type Args: Copy;

    fn nearest(args: Self::Args) -> Self::Real;

    /// `exact - nearest`, accurate enough to compare against an ULP.
    fn error(args: Self::Args, nearest: Self::Real) -> Self::Real;

    /// A value with the sign of `exact - nearest` (zero iff exact).
    fn same_sign_of_error(args: Self::Args, nearest: Self::Real) -> Self::Real {
        Self::error(args, nearest)
    }

    /// Demote the operands to binary32, evaluate in `Real`, and round the
    /// result to binary32 as well.
    fn float_only(args: Self::Args) -> Self::Real;
}

/// `+1`, `-1` or `0` following the sign of `x`.
#[inline]
fn sign_of<F: Float>(x: f64) -> F {
    if x > 0.0 {
        F::ONE
    } else if x < 0.0 {
        -F::ONE
    } else {
        F::ZERO
    }
}

/// Round to binary32 but keep the wider type.
#[inline]
fn demote<F: Float>(x: F) -> F {
    F::from_f32(x.to_f32())
}

pub struct AddOp<F>(PhantomData<F>);
pub struct SubOp<F>(PhantomData<F>);
pub struct MulOp<F>(PhantomData<F>);
pub struct DivOp<F>(PhantomData<F>);
pub struct FmaOp<F>(PhantomData<F>);
/// Binary64 to binary32 conversion.
pub struct CastOp;

impl<F: Float> ExactOp for AddOp<F> {
    type Real = F;
    type Args = (F, F);

    #[inline]
    fn nearest((a, b): (F, F)) -> F {
        a + b
    }

    #[inline]
    fn error((a, b): (F, F), x: F) -> F {
        eft::two_sum_error(a, b, x)
    }

    fn float_only((a, b): (F, F)) -> F {
        demote(Self::nearest((demote(a), demote(b))))
    }
}

impl<F: Float> ExactOp for SubOp<F> {
    type Real = F;
    type Args = (F, F);

    #[inline]
    fn nearest((a, b): (F, F)) -> F {
        a - b
    }

    #[inline]
    fn error((a, b): (F, F), x: F) -> F {
        eft::two_sum_error(a, -b, x)
    }

    fn float_only((a, b): (F, F)) -> F {
        demote(Self::nearest((demote(a), demote(b))))
    }
}

impl<F: Float> ExactOp for MulOp<F> {
    type Real = F;
    type Args = (F, F);

    #[inline]
    fn nearest((a, b): (F, F)) -> F {
        a * b
    }

    #[inline]
    fn error((a, b): (F, F), x: F) -> F {
        eft::product_error(a, b, x)
    }

    #[inline]
    fn same_sign_of_error((a, b): (F, F), x: F) -> F {
        if F::TYPE == FloatType::Binary32 {
            // Binary32 products are exact in binary64.
            return sign_of(a.to_f64().mul_add(b.to_f64(), -x.to_f64()));
        }
        if x != F::ZERO {
            return Self::error((a, b), x);
        }
        // Underflowed product: the error is the whole exact product.
        if a == F::ZERO || b == F::ZERO {
            F::ZERO
        } else if a > F::ZERO {
            b
        } else {
            -b
        }
    }

    fn float_only((a, b): (F, F)) -> F {
        demote(Self::nearest((demote(a), demote(b))))
    }
}

impl<F: Float> ExactOp for DivOp<F> {
    type Real = F;
    type Args = (F, F);

    #[inline]
    fn nearest((x, y): (F, F)) -> F {
        x / y
    }

    #[inline]
    fn error((x, y): (F, F), q: F) -> F {
        eft::quotient_residual(x, y, q) / y
    }

    #[inline]
    fn same_sign_of_error((x, y): (F, F), q: F) -> F {
        // Sign of residual * y, without the product that could underflow.
        let r = if F::TYPE == FloatType::Binary32 {
            eft::div_residual(x.to_f64(), y.to_f64(), q.to_f64())
        } else {
            eft::quotient_residual(x, y, q).to_f64()
        };
        if y.is_sign_negative() {
            sign_of(-r)
        } else {
            sign_of(r)
        }
    }

    fn float_only((x, y): (F, F)) -> F {
        demote(Self::nearest((demote(x), demote(y))))
    }
}

impl<F: Float> ExactOp for FmaOp<F> {
    type Real = F;
    type Args = (F, F, F);

    #[inline]
    fn nearest((a, b, c): (F, F, F)) -> F {
        a.mul_add(b, c)
    }

    #[inline]
    fn error((a, b, c): (F, F, F), r: F) -> F {
        eft::fma_error(a, b, c, r)
    }

    fn float_only((a, b, c): (F, F, F)) -> F {
        demote(Self::nearest((demote(a), demote(b), demote(c))))
    }
}

impl ExactOp for CastOp {
    type Real = f32;
    type Args = f64;

    #[inline]
    fn nearest(a: f64) -> f32 {
        a as f32
    }

    #[inline]
    fn error(a: f64, z: f32) -> f32 {
        eft::cast_residual(a, z) as f32
    }

    #[inline]
    fn same_sign_of_error(a: f64, z: f32) -> f32 {
        sign_of(eft::cast_residual(a, z))
    }

    fn float_only(a: f64) -> f32 {
        a as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn errors_of_exact_operations_vanish() {
        assert_eq!(MulOp::<f64>::error((1.5, 4.0), 6.0), 0.0);
        assert_eq!(DivOp::<f32>::error((1.0, 4.0), 0.25), 0.0);
    }

    #[test]
    fn huge_operands_fall_back_to_fma() {
        let (a, b) = (1.0e300f64, 1.0e-300 / 3.0);
        let p = a * b;
        assert_eq!(MulOp::<f64>::error((a, b), p), a.mul_add(b, -p));
    }

    proptest! {
        #[test]
        fn product_error_agrees_with_fma(a in -1.0e200f64..1.0e200, b in -1.0e100f64..1.0e100) {
            let p = a * b;
            prop_assume!(p.is_finite());
            prop_assert_eq!(MulOp::<f64>::error((a, b), p), a.mul_add(b, -p));
        }

        #[test]
        fn quotient_error_agrees_with_fma(x in -1.0e30f32..1.0e30, y in -1.0e30f32..1.0e30) {
            let q = x / y;
            prop_assume!(q.is_finite() && y != 0.0);
            prop_assert_eq!(DivOp::<f32>::error((x, y), q), eft::div_error(x, y, q));
        }
    }
}
