//! Rounding modes understood by the stochastic backend.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Hardware round-to-nearest.
    #[default]
    Nearest,
    Upward,
    Downward,
    TowardZero,
    /// Step to either neighbour with probability 1/2.
    Random,
    /// Step with probability proportional to the error; unbiased on average.
    Average,
    /// Pick the neighbour farther from the exact result.
    Farthest,
    /// Evaluate in binary32 and widen.
    #[serde(rename = "float")]
    FloatOnly,
    /// Same as nearest; kept distinct for reporting.
    Native,
    /// Flush to zero; not implemented, triggers the panic hook.
    #[serde(rename = "ftz")]
    FlushToZero,
}

impl RoundingMode {
    pub const ALL: [RoundingMode; 10] = [
        RoundingMode::Nearest,
        RoundingMode::Upward,
        RoundingMode::Downward,
        RoundingMode::TowardZero,
        RoundingMode::Random,
        RoundingMode::Average,
        RoundingMode::Farthest,
        RoundingMode::FloatOnly,
        RoundingMode::Native,
        RoundingMode::FlushToZero,
    ];

    /// Name accepted by `--rounding-mode`.
    pub const fn name(self) -> &'static str {
        match self {
            RoundingMode::Nearest => "nearest",
            RoundingMode::Upward => "upward",
            RoundingMode::Downward => "downward",
            RoundingMode::TowardZero => "toward_zero",
            RoundingMode::Random => "random",
            RoundingMode::Average => "average",
            RoundingMode::Farthest => "farthest",
            RoundingMode::FloatOnly => "float",
            RoundingMode::Native => "native",
            RoundingMode::FlushToZero => "ftz",
        }
    }

    /// Modes whose result depends on the random stream.
    pub const fn is_stochastic(self) -> bool {
        matches!(self, RoundingMode::Random | RoundingMode::Average)
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoundingMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        RoundingMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownRoundingMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("RANDOM".parse::<RoundingMode>().unwrap(), RoundingMode::Random);
        assert_eq!("Toward_Zero".parse::<RoundingMode>().unwrap(), RoundingMode::TowardZero);
        assert_eq!("float".parse::<RoundingMode>().unwrap(), RoundingMode::FloatOnly);
        for mode in RoundingMode::ALL {
            assert_eq!(mode.name().parse::<RoundingMode>().unwrap(), mode);
        }
    }

    #[test]
    fn rejects_unknown_modes() {
        let err = "stochastic".parse::<RoundingMode>().unwrap_err();
        assert!(matches!(err, BackendError::UnknownRoundingMode(ref s) if s == "stochastic"));
    }

    #[test]
    fn serializes_with_option_names() {
        assert_eq!(serde_json::to_string(&RoundingMode::FlushToZero).unwrap(), "\"ftz\"");
        assert_eq!(serde_json::to_string(&RoundingMode::TowardZero).unwrap(), "\"toward_zero\"");
    }
}
