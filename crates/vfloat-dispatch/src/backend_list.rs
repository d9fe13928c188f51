//! Parsing of the backend list.
//!
//! The list is a `;`-separated sequence of entries. Each entry is a
//! whitespace-separated token list whose first token is the backend path
//! (or `builtin:<name>`) and whose remaining tokens are that backend's
//! arguments. Blank entries, such as the one after a trailing `;`, are
//! skipped.

use std::fmt;

use vfloat_abi::MAX_ARGS;

use crate::error::{DispatchError, Result};

/// Capacity of the dispatch table.
pub const MAX_BACKENDS: usize = 16;

/// One backend to load and the arguments it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEntry {
    pub path: String,
    pub args: Vec<String>,
}

impl BackendEntry {
    /// The argument vector handed to the entry point; `argv[0]` is the path.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.path.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for BackendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Split a backend list into its entries.
pub fn parse_backend_list(list: &str) -> Result<Vec<BackendEntry>> {
    let mut entries = Vec::new();

    for entry in list.split(';') {
        let mut tokens = entry.split_whitespace();
        let Some(path) = tokens.next() else {
            continue;
        };
        let args: Vec<String> = tokens.map(str::to_string).collect();

        if args.len() + 1 > MAX_ARGS {
            return Err(DispatchError::TooManyArguments {
                path: path.to_string(),
                count: args.len() + 1,
                max: MAX_ARGS,
            });
        }

        entries.push(BackendEntry {
            path: path.to_string(),
            args,
        });
    }

    if entries.is_empty() {
        return Err(DispatchError::EmptyBackendList);
    }
    if entries.len() > MAX_BACKENDS {
        return Err(DispatchError::TooManyBackends {
            count: entries.len(),
            max: MAX_BACKENDS,
        });
    }

    Ok(entries)
}
