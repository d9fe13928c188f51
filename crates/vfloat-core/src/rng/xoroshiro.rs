//! xoroshiro128++ 1.0 (Blackman and Vigna).

use super::splitmix::SplitMix64;

/// All-purpose 128-bit state generator.
///
/// The state is seeded from two successive SplitMix64 outputs, which also
/// guarantees it is never all zero in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Xoroshiro128PlusPlus {
    s: [u64; 2],
}

impl Xoroshiro128PlusPlus {
    /// Seed the generator through SplitMix64.
    pub fn from_seed(seed: u64) -> Self {
        let mut sm = SplitMix64::new(seed);
        let s0 = sm.next_u64();
        let s1 = sm.next_u64();
        Self { s: [s0, s1] }
    }

    /// Build from raw state words.
    pub const fn from_state(s0: u64, s1: u64) -> Self {
        Self { s: [s0, s1] }
    }

    pub const fn state(&self) -> [u64; 2] {
        self.s
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.s[0];
        let mut s1 = self.s[1];
        let result = s0.wrapping_add(s1).rotate_left(17).wrapping_add(s0);
        s1 ^= s0;
        self.s[0] = s0.rotate_left(49) ^ s1 ^ (s1 << 21);
        self.s[1] = s1.rotate_left(28);
        result
    }

    /// Low half of a draw.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    /// Uniform dyadic rational in `[0, 1)` with 52 random bits.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        to_unit_f64(self.next_u64())
    }
}

/// Maps the top 52 bits of `x` into `[1, 2)` and subtracts one.
#[inline]
pub fn to_unit_f64(x: u64) -> f64 {
    f64::from_bits((0x3ff << 52) | (x >> 12)) - 1.0
}
