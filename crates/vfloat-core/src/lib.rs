//! # vfloat-core
//!
//! Numeric building blocks shared by every vfloat backend:
//!
//! - [`bits`]: the sealed [`Float`] trait over binary32/binary64, exponent
//!   extraction and ULP stepping
//! - [`eft`]: error-free transformations (TwoSum, TwoProd, FMA and division
//!   residuals)
//! - [`rng`]: SplitMix64-seeded xoroshiro128++ streams, one per thread

pub mod bits;
pub mod eft;
pub mod rng;

pub use bits::{Float, FloatType};
pub use rng::{RandomSource, RngState, SeedChoice, RAND_MAX};
