//! Simulated floating-point formats.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use vfloat_core::FloatType;

use crate::error::{BackendError, Result};

/// A reduced format: `range` exponent bits and `precision` explicit
/// mantissa bits, emulated inside a native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrecisionFormat {
    pub range: u32,
    pub precision: u32,
}

pub const MIN_RANGE: u32 = 2;
pub const MIN_PRECISION: u32 = 1;

impl PrecisionFormat {
    /// The native format of `ty`; rounding to it is the identity.
    pub const fn native(ty: FloatType) -> Self {
        Self {
            range: ty.exponent_bits(),
            precision: ty.mantissa_bits(),
        }
    }

    /// Build a format for `ty`, checking both fields against its bounds.
    pub fn new(ty: FloatType, range: i64, precision: i64) -> Result<Self> {
        Ok(Self {
            range: check_range(ty, range)?,
            precision: check_precision(ty, precision)?,
        })
    }

    pub fn with_range(self, ty: FloatType, range: i64) -> Result<Self> {
        Ok(Self {
            range: check_range(ty, range)?,
            ..self
        })
    }

    pub fn with_precision(self, ty: FloatType, precision: i64) -> Result<Self> {
        Ok(Self {
            precision: check_precision(ty, precision)?,
            ..self
        })
    }

    /// Largest unbiased exponent of a normal value.
    #[inline]
    pub const fn emax(self) -> i32 {
        (1 << (self.range - 1)) - 1
    }

    /// Smallest unbiased exponent of a normal value.
    #[inline]
    pub const fn emin(self) -> i32 {
        1 - self.emax()
    }

    const fn pack(self) -> u64 {
        ((self.range as u64) << 32) | self.precision as u64
    }

    const fn unpack(packed: u64) -> Self {
        Self {
            range: (packed >> 32) as u32,
            precision: packed as u32,
        }
    }
}

fn check_range(ty: FloatType, value: i64) -> Result<u32> {
    let max = ty.exponent_bits();
    match u32::try_from(value) {
        Ok(range) if (MIN_RANGE..=max).contains(&range) => Ok(range),
        _ => Err(BackendError::RangeOutOfRange {
            ty,
            value,
            min: MIN_RANGE,
            max,
        }),
    }
}

fn check_precision(ty: FloatType, value: i64) -> Result<u32> {
    let max = ty.mantissa_bits();
    match u32::try_from(value) {
        Ok(precision) if (MIN_PRECISION..=max).contains(&precision) => Ok(precision),
        _ => Err(BackendError::PrecisionOutOfRange {
            ty,
            value,
            min: MIN_PRECISION,
            max,
        }),
    }
}

/// A format that can be swapped at runtime while other threads round with
/// it. Readers always see a consistent (range, precision) pair.
#[derive(Debug)]
pub struct AtomicFormat {
    ty: FloatType,
    packed: AtomicU64,
}

impl AtomicFormat {
    pub fn new(ty: FloatType, format: PrecisionFormat) -> Self {
        Self {
            ty,
            packed: AtomicU64::new(format.pack()),
        }
    }

    #[inline]
    pub fn load(&self) -> PrecisionFormat {
        PrecisionFormat::unpack(self.packed.load(Ordering::Acquire))
    }

    pub fn set_range(&self, range: i64) -> Result<PrecisionFormat> {
        self.update(|f| f.with_range(self.ty, range))
    }

    pub fn set_precision(&self, precision: i64) -> Result<PrecisionFormat> {
        self.update(|f| f.with_precision(self.ty, precision))
    }

    fn update(&self, f: impl Fn(PrecisionFormat) -> Result<PrecisionFormat>) -> Result<PrecisionFormat> {
        let mut current = self.packed.load(Ordering::Acquire);
        loop {
            let next = f(PrecisionFormat::unpack(current))?;
            match self
                .packed
                .compare_exchange_weak(current, next.pack(), Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_formats_match_ieee() {
        let b32 = PrecisionFormat::native(FloatType::Binary32);
        assert_eq!((b32.range, b32.precision), (8, 23));
        assert_eq!((b32.emin(), b32.emax()), (-126, 127));
        let b64 = PrecisionFormat::native(FloatType::Binary64);
        assert_eq!((b64.emin(), b64.emax()), (-1022, 1023));
    }

    #[test]
    fn bounds_are_enforced() {
        assert!(PrecisionFormat::new(FloatType::Binary32, 8, 23).is_ok());
        assert!(matches!(
            PrecisionFormat::new(FloatType::Binary32, 9, 10),
            Err(BackendError::RangeOutOfRange { value: 9, max: 8, .. })
        ));
        assert!(matches!(
            PrecisionFormat::new(FloatType::Binary64, 11, 0),
            Err(BackendError::PrecisionOutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            PrecisionFormat::new(FloatType::Binary64, -3, 10),
            Err(BackendError::RangeOutOfRange { .. })
        ));
    }

    #[test]
    fn atomic_updates_keep_the_other_field() {
        let fmt = AtomicFormat::new(FloatType::Binary64, PrecisionFormat::native(FloatType::Binary64));
        fmt.set_precision(10).unwrap();
        fmt.set_range(5).unwrap();
        assert_eq!(fmt.load(), PrecisionFormat { range: 5, precision: 10 });

        assert!(fmt.set_precision(53).is_err());
        assert_eq!(fmt.load().precision, 10);
    }
}
