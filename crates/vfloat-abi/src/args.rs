//! Command-line style options handed to a backend at init.
//!
//! Options take the forms `--key=value`, `--key value` or a bare `--flag`.
//! Values are unpacked on demand into any `FromStr` type; the last occurrence
//! of an option wins.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::str::FromStr;

use crate::abi::MAX_ARGS;

/// Errors raised while reading backend options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    /// Option not understood by the backend.
    #[error("unknown option `--{0}`")]
    UnknownOption(String),

    /// Token that is not an option and not the value of one.
    #[error("unexpected argument `{0}`")]
    Unexpected(String),

    /// `--key` given without the value it requires.
    #[error("option `--{0}` expects a value")]
    MissingValue(String),

    /// A flag was given a value.
    #[error("option `--{0}` does not take a value")]
    UnexpectedValue(String),

    /// Value could not be parsed or is out of range.
    #[error("invalid value `{value}` for `--{option}`: {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },

    /// More than [`MAX_ARGS`] tokens.
    #[error("too many arguments: {count} (max {max})")]
    TooMany { count: usize, max: usize },
}

impl ArgError {
    pub fn invalid(option: &str, value: impl Into<String>, reason: impl ToString) -> Self {
        ArgError::InvalidValue {
            option: option.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArgError>;

/// Parsed option list for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendArgs {
    program: String,
    options: Vec<(String, Option<String>)>,
}

impl BackendArgs {
    /// Parse an argument vector whose first element is the backend path.
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        if argv.len() > MAX_ARGS {
            return Err(ArgError::TooMany {
                count: argv.len(),
                max: MAX_ARGS,
            });
        }

        let mut tokens = argv.iter().map(AsRef::as_ref);
        let program = tokens.next().unwrap_or_default().to_string();
        let mut options: Vec<(String, Option<String>)> = Vec::new();

        for token in tokens {
            if let Some(option) = token.strip_prefix("--") {
                match option.split_once('=') {
                    Some((key, value)) => options.push((key.to_string(), Some(value.to_string()))),
                    None => options.push((option.to_string(), None)),
                }
                continue;
            }
            // A bare token is the value of the preceding valueless option.
            match options.last_mut() {
                Some((_, value @ None)) => *value = Some(token.to_string()),
                _ => return Err(ArgError::Unexpected(token.to_string())),
            }
        }

        Ok(Self { program, options })
    }

    /// Parse the `argc`/`argv` pair received by the entry point.
    ///
    /// # Safety
    ///
    /// `argv` must point to `argc` valid NUL-terminated strings (or be null
    /// with `argc == 0`).
    pub unsafe fn from_raw(argc: c_int, argv: *const *const c_char) -> Result<Self> {
        let count = usize::try_from(argc).unwrap_or(0);
        if argv.is_null() || count == 0 {
            return Ok(Self::default());
        }
        let mut owned = Vec::with_capacity(count);
        for i in 0..count {
            let ptr = *argv.add(i);
            if ptr.is_null() {
                break;
            }
            owned.push(CStr::from_ptr(ptr).to_string_lossy().into_owned());
        }
        Self::parse(&owned)
    }

    /// `argv[0]`, normally the backend path or `builtin:<name>`.
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Fail on the first option not listed in `known`.
    pub fn reject_unknown(&self, known: &[&str]) -> Result<()> {
        match self.options.iter().find(|(key, _)| !known.contains(&key.as_str())) {
            Some((key, _)) => Err(ArgError::UnknownOption(key.clone())),
            None => Ok(()),
        }
    }

    fn last(&self, name: &str) -> Option<&Option<String>> {
        self.options.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// `true` if `--name` is present. A flag never carries a value.
    pub fn flag(&self, name: &str) -> Result<bool> {
        match self.last(name) {
            None => Ok(false),
            Some(None) => Ok(true),
            Some(Some(_)) => Err(ArgError::UnexpectedValue(name.to_string())),
        }
    }

    /// Raw string value of `--name`.
    pub fn raw(&self, name: &str) -> Result<Option<&str>> {
        match self.last(name) {
            None => Ok(None),
            Some(None) => Err(ArgError::MissingValue(name.to_string())),
            Some(Some(value)) => Ok(Some(value.as_str())),
        }
    }

    /// Value of `--name` parsed as `T`.
    pub fn value<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: ToString,
    {
        match self.raw(name)? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|err| ArgError::invalid(name, raw, err)),
        }
    }
}
