//! Out-of-band requests sent by the instrumented program through
//! `interflop_call(id, arg)`.

use std::os::raw::c_int;

use vfloat_core::FloatType;

/// Decoded `(id, arg)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCall {
    /// Id 1. Reserved; backends ignore it.
    Inexact,
    /// Ids 2 (binary32) and 3 (binary64).
    SetPrecision(FloatType, i64),
    /// Ids 4 (binary32) and 5 (binary64).
    SetRange(FloatType, i64),
    /// Id 6. Leave native mode.
    BeginInstrumentation,
    /// Id 7. Enter native mode.
    EndInstrumentation,
    /// Id 8. Reseed the calling thread's stream.
    SetSeed(u64),
    /// Id 9. Restore the stream saved by the last `SetSeed`.
    SetRandomSeed,
    /// Anything else, passed through untouched.
    Unknown(c_int, i64),
}

impl UserCall {
    pub fn decode(id: c_int, arg: i64) -> Self {
        match id {
            1 => UserCall::Inexact,
            2 => UserCall::SetPrecision(FloatType::Binary32, arg),
            3 => UserCall::SetPrecision(FloatType::Binary64, arg),
            4 => UserCall::SetRange(FloatType::Binary32, arg),
            5 => UserCall::SetRange(FloatType::Binary64, arg),
            6 => UserCall::BeginInstrumentation,
            7 => UserCall::EndInstrumentation,
            8 => UserCall::SetSeed(arg as u64),
            9 => UserCall::SetRandomSeed,
            other => UserCall::Unknown(other, arg),
        }
    }

    pub fn encode(self) -> (c_int, i64) {
        match self {
            UserCall::Inexact => (1, 0),
            UserCall::SetPrecision(FloatType::Binary32, p) => (2, p),
            UserCall::SetPrecision(FloatType::Binary64, p) => (3, p),
            UserCall::SetRange(FloatType::Binary32, r) => (4, r),
            UserCall::SetRange(FloatType::Binary64, r) => (5, r),
            UserCall::BeginInstrumentation => (6, 0),
            UserCall::EndInstrumentation => (7, 0),
            UserCall::SetSeed(seed) => (8, seed as i64),
            UserCall::SetRandomSeed => (9, 0),
            UserCall::Unknown(id, arg) => (id, arg),
        }
    }
}
