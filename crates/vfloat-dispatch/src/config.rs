//! Dispatcher configuration read from the environment.

use std::env;
use std::fs;

use crate::error::{DispatchError, Result};

/// `;`-separated backend list.
pub const BACKENDS_ENV: &str = "VFC_BACKENDS";
/// File whose first line is the backend list, used when [`BACKENDS_ENV`] is unset.
pub const BACKENDS_FROM_FILE_ENV: &str = "VFC_BACKENDS_FROM_FILE";
/// `True` (any case) suppresses the per-backend "loaded backend" message.
pub const SILENT_LOAD_ENV: &str = "VFC_BACKENDS_SILENT_LOAD";
/// `True` (any case) makes comparisons part of the coverage check.
pub const INSTRUMENT_FCMP_ENV: &str = "VFC_INSTRUMENT_FCMP";

/// Everything the dispatcher needs before loading backends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Raw backend list, parsed by [`crate::parse_backend_list`].
    pub backends: String,
    pub silent_load: bool,
    pub instrument_fcmp: bool,
}

impl DispatchConfig {
    pub fn new(backends: impl Into<String>) -> Self {
        Self {
            backends: backends.into(),
            ..Self::default()
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// `VFC_BACKENDS` takes precedence over `VFC_BACKENDS_FROM_FILE`. A
    /// missing list is not an error here; loading reports it.
    pub fn from_env() -> Result<Self> {
        let backends = match env::var(BACKENDS_ENV) {
            Ok(list) => list,
            Err(_) => match env::var(BACKENDS_FROM_FILE_ENV) {
                Ok(path) => first_line(&path)?,
                Err(_) => String::new(),
            },
        };

        Ok(Self {
            backends,
            silent_load: is_true(SILENT_LOAD_ENV),
            instrument_fcmp: is_true(INSTRUMENT_FCMP_ENV),
        })
    }
}

fn is_true(key: &str) -> bool {
    env::var(key).is_ok_and(|value| value.eq_ignore_ascii_case("true"))
}

fn first_line(path: &str) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|source| DispatchError::BackendFile {
        path: path.to_string(),
        source,
    })?;
    Ok(contents.lines().next().unwrap_or_default().to_string())
}
