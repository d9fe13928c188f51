//! Floating-point comparison predicates, numbered as LLVM's `fcmp`.

use std::os::raw::c_int;

use vfloat_core::Float;

/// `O*` predicates are false when either operand is NaN; `U*` predicates
/// are true.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FcmpPredicate {
    False = 0,
    Oeq = 1,
    Ogt = 2,
    Oge = 3,
    Olt = 4,
    Ole = 5,
    One = 6,
    Ord = 7,
    Uno = 8,
    Ueq = 9,
    Ugt = 10,
    Uge = 11,
    Ult = 12,
    Ule = 13,
    Une = 14,
    True = 15,
}

impl FcmpPredicate {
    pub const ALL: [FcmpPredicate; 16] = [
        FcmpPredicate::False,
        FcmpPredicate::Oeq,
        FcmpPredicate::Ogt,
        FcmpPredicate::Oge,
        FcmpPredicate::Olt,
        FcmpPredicate::Ole,
        FcmpPredicate::One,
        FcmpPredicate::Ord,
        FcmpPredicate::Uno,
        FcmpPredicate::Ueq,
        FcmpPredicate::Ugt,
        FcmpPredicate::Uge,
        FcmpPredicate::Ult,
        FcmpPredicate::Ule,
        FcmpPredicate::Une,
        FcmpPredicate::True,
    ];

    pub fn from_code(code: c_int) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn code(self) -> c_int {
        self as c_int
    }

    /// Evaluate the predicate with native IEEE comparisons.
    pub fn evaluate<F: Float>(self, a: F, b: F) -> bool {
        let unordered = a.is_nan() || b.is_nan();
        match self {
            FcmpPredicate::False => false,
            FcmpPredicate::Oeq => !unordered && a == b,
            FcmpPredicate::Ogt => !unordered && a > b,
            FcmpPredicate::Oge => !unordered && a >= b,
            FcmpPredicate::Olt => !unordered && a < b,
            FcmpPredicate::Ole => !unordered && a <= b,
            FcmpPredicate::One => !unordered && a != b,
            FcmpPredicate::Ord => !unordered,
            FcmpPredicate::Uno => unordered,
            FcmpPredicate::Ueq => unordered || a == b,
            FcmpPredicate::Ugt => unordered || a > b,
            FcmpPredicate::Uge => unordered || a >= b,
            FcmpPredicate::Ult => unordered || a < b,
            FcmpPredicate::Ule => unordered || a <= b,
            FcmpPredicate::Une => unordered || a != b,
            FcmpPredicate::True => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_llvm_numbering() {
        for (i, p) in FcmpPredicate::ALL.iter().enumerate() {
            assert_eq!(p.code() as usize, i);
            assert_eq!(FcmpPredicate::from_code(i as c_int), Some(*p));
        }
        assert_eq!(FcmpPredicate::from_code(16), None);
        assert_eq!(FcmpPredicate::from_code(-1), None);
    }

    #[test]
    fn ordered_and_unordered_disagree_only_on_nan() {
        let nan = f64::NAN;
        assert!(!FcmpPredicate::Oeq.evaluate(nan, 1.0));
        assert!(FcmpPredicate::Ueq.evaluate(nan, 1.0));
        assert!(!FcmpPredicate::One.evaluate(nan, nan));
        assert!(FcmpPredicate::Une.evaluate(nan, nan));
        assert!(FcmpPredicate::Uno.evaluate(1.0f32, f32::NAN));
        assert!(!FcmpPredicate::Ord.evaluate(1.0f32, f32::NAN));

        assert!(FcmpPredicate::Olt.evaluate(1.0f64, 2.0));
        assert!(FcmpPredicate::Ult.evaluate(1.0f64, 2.0));
        assert!(!FcmpPredicate::One.evaluate(0.0f64, -0.0));
        assert!(FcmpPredicate::Oge.evaluate(f64::INFINITY, f64::MAX));
    }
}
