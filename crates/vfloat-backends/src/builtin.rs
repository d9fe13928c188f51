//! Statically linked backends, selected by name.

use std::fmt;
use std::os::raw::c_void;
use std::str::FromStr;

use vfloat_abi::{instantiate, BackendArgs, BackendInterface, InitError};

use crate::cancellation::CancellationBackend;
use crate::error::BackendError;
use crate::ieee::IeeeBackend;
use crate::mca::McaBackend;
use crate::stochastic::StochasticBackend;
use crate::vprec::VprecBackend;

/// Backend path prefix that selects a built-in instead of a shared object.
pub const BUILTIN_PREFIX: &str = "builtin:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Ieee,
    Stochastic,
    Vprec,
    Cancellation,
    Mca,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Ieee,
        Builtin::Stochastic,
        Builtin::Vprec,
        Builtin::Cancellation,
        Builtin::Mca,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Ieee => "ieee",
            Builtin::Stochastic => "stochastic",
            Builtin::Vprec => "vprec",
            Builtin::Cancellation => "cancellation",
            Builtin::Mca => "mca",
        }
    }

    /// Parse `builtin:<name>`. Returns `None` for anything that is not a
    /// built-in path.
    pub fn from_path(path: &str) -> Option<Result<Self, BackendError>> {
        path.strip_prefix(BUILTIN_PREFIX).map(str::parse)
    }

    /// Configure the backend from `args` and hand out its interface and
    /// context, exactly as a shared object's entry point would.
    pub fn instantiate(self, args: &BackendArgs) -> Result<(BackendInterface, *mut c_void), InitError> {
        match self {
            Builtin::Ieee => instantiate::<IeeeBackend>(args),
            Builtin::Stochastic => instantiate::<StochasticBackend>(args),
            Builtin::Vprec => instantiate::<VprecBackend>(args),
            Builtin::Cancellation => instantiate::<CancellationBackend>(args),
            Builtin::Mca => instantiate::<McaBackend>(args),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Builtin {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Builtin::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| BackendError::UnknownBuiltin(s.to_string()))
    }
}
