//! Rounding policies applied to a (nearest, error) pair.
//!
//! Shared rules:
//! - a NaN or infinite hardware result is returned untouched;
//! - a step never leaves the finite range: from `±MAX` outward the result
//!   stays at `±MAX`.

use vfloat_core::bits::{next_down, next_toward_zero, next_up};
use vfloat_core::{Float, RngState, RAND_MAX};

use super::mode::RoundingMode;
use super::ops::ExactOp;

#[inline]
fn step_up<F: Float>(x: F) -> F {
    if x == F::MAX {
        x
    } else if x == -F::DENORM_MIN {
        F::ZERO
    } else {
        next_up(x)
    }
}

#[inline]
fn step_down<F: Float>(x: F) -> F {
    if x == -F::MAX {
        x
    } else if x == F::DENORM_MIN {
        F::ZERO
    } else {
        next_down(x)
    }
}

/// Round `args` with a deterministic or stochastic `mode`.
///
/// `FlushToZero` is not handled here and falls back to nearest; the caller
/// is expected to report it.
#[inline]
pub fn apply<O: ExactOp>(mode: RoundingMode, args: O::Args, rng: impl FnOnce() -> Draws) -> O::Real {
    match mode {
        RoundingMode::Nearest | RoundingMode::Native | RoundingMode::FlushToZero => O::nearest(args),
        RoundingMode::Upward => upward::<O>(args),
        RoundingMode::Downward => downward::<O>(args),
        RoundingMode::TowardZero => toward_zero::<O>(args),
        RoundingMode::Farthest => farthest::<O>(args),
        RoundingMode::FloatOnly => O::float_only(args),
        RoundingMode::Random => random::<O>(args, rng),
        RoundingMode::Average => average::<O>(args, rng),
    }
}

/// Random draws prepared for a single stochastic rounding.
#[derive(Debug, Clone, Copy)]
pub struct Draws {
    pub coin: bool,
    pub uniform: u32,
}

impl Draws {
    /// Take one coin flip and one 31-bit integer from `state`.
    pub fn from_state(state: &mut RngState, mode: RoundingMode) -> Self {
        match mode {
            RoundingMode::Random => Draws {
                coin: state.next_bool(),
                uniform: 0,
            },
            _ => Draws {
                coin: false,
                uniform: state.next_u31(),
            },
        }
    }
}

pub fn upward<O: ExactOp>(args: O::Args) -> O::Real {
    let res = O::nearest(args);
    if !res.is_finite() {
        return res;
    }
    if O::same_sign_of_error(args, res) > O::Real::ZERO {
        step_up(res)
    } else {
        res
    }
}

pub fn downward<O: ExactOp>(args: O::Args) -> O::Real {
    let res = O::nearest(args);
    if !res.is_finite() {
        return res;
    }
    if O::same_sign_of_error(args, res) < O::Real::ZERO {
        step_down(res)
    } else {
        res
    }
}

pub fn toward_zero<O: ExactOp>(args: O::Args) -> O::Real {
    let res = O::nearest(args);
    if !res.is_finite() {
        return res;
    }
    let sign = O::same_sign_of_error(args, res);
    let zero = O::Real::ZERO;
    if (sign > zero && res < zero) || (sign < zero && res > zero) {
        next_toward_zero(res)
    } else {
        res
    }
}

/// Step toward the exact value with probability 1/2 whenever inexact.
///
/// Draws are only taken for inexact results.
pub fn random<O: ExactOp>(args: O::Args, rng: impl FnOnce() -> Draws) -> O::Real {
    let res = O::nearest(args);
    if !res.is_finite() {
        return res;
    }
    let sign = O::same_sign_of_error(args, res);
    if sign == O::Real::ZERO {
        return res;
    }
    // Heads keeps nearest.
    if rng().coin {
        return res;
    }
    if sign > O::Real::ZERO {
        step_up(res)
    } else {
        step_down(res)
    }
}

/// Step toward the exact value with probability `|error| / ulp`.
pub fn average<O: ExactOp>(args: O::Args, rng: impl FnOnce() -> Draws) -> O::Real {
    let res = O::nearest(args);
    if !res.is_finite() {
        return res;
    }
    let error = O::error(args, res);
    if error == O::Real::ZERO {
        return res;
    }
    let (neighbour, ulp, magnitude) = if error > O::Real::ZERO {
        let up = step_up(res);
        (up, up - res, error)
    } else {
        let down = step_down(res);
        (down, res - down, -error)
    };
    if neighbour == res {
        return res;
    }
    // rand * ulp > RAND_MAX * |error| keeps nearest; binary64 avoids
    // overflowing binary32 near its largest binade.
    let keep = f64::from(rng().uniform) * ulp.to_f64() > f64::from(RAND_MAX) * magnitude.to_f64();
    if keep {
        res
    } else {
        neighbour
    }
}

/// Pick the neighbour farther from the exact value.
pub fn farthest<O: ExactOp>(args: O::Args) -> O::Real {
    let res = O::nearest(args);
    if !res.is_finite() {
        return res;
    }
    let error = O::error(args, res);
    if error == O::Real::ZERO {
        return res;
    }
    let (neighbour, ulp, magnitude) = if error > O::Real::ZERO {
        let up = step_up(res);
        (up, up - res, error)
    } else {
        let down = step_down(res);
        (down, res - down, -error)
    };
    // The neighbour is farther exactly when the error is under half an ULP.
    if neighbour != res && magnitude + magnitude < ulp {
        neighbour
    } else {
        res
    }
}
