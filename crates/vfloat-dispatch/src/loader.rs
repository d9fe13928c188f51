//! Turning a [`BackendEntry`] into a live backend.
//!
//! Shared objects are opened with `libloading` and initialised through
//! their `interflop_init` symbol; `builtin:<name>` paths are served from
//! `vfloat-backends` without touching the dynamic loader.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use libloading::{Library, Symbol};
use tracing::{debug, info};
use vfloat_abi::{BackendArgs, BackendInterface, InitError, InitFn, ABI_VERSION, ENTRY_SYMBOL};
use vfloat_backends::Builtin;

use crate::error::{DispatchError, Result};
use crate::backend_list::BackendEntry;

/// A backend ready for dispatch.
///
/// Owns the library it came from so that its function pointers stay valid,
/// and the argument strings it was initialised with, which a backend may
/// keep pointers into.
pub struct LoadedBackend {
    interface: BackendInterface,
    context: *mut c_void,
    _argv: Vec<CString>,
    _library: Option<Library>,
}

// SAFETY: the interface is immutable, and contexts are shared across
// threads by contract; backends keep mutable state in atomics or TLS.
unsafe impl Send for LoadedBackend {}
unsafe impl Sync for LoadedBackend {}

impl LoadedBackend {
    /// Wrap an interface and context created in-process.
    pub fn from_parts(interface: BackendInterface, context: *mut c_void) -> Self {
        Self {
            interface,
            context,
            _argv: Vec::new(),
            _library: None,
        }
    }

    pub fn interface(&self) -> &BackendInterface {
        &self.interface
    }

    pub fn context(&self) -> *mut c_void {
        self.context
    }

    pub fn name(&self) -> &str {
        self.interface.name()
    }
}

impl std::fmt::Debug for LoadedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedBackend")
            .field("name", &self.name())
            .field("shared_object", &self._library.is_some())
            .finish()
    }
}

/// Load one backend.
pub fn load_backend(entry: &BackendEntry, silent: bool) -> Result<LoadedBackend> {
    let loaded = match Builtin::from_path(&entry.path) {
        Some(builtin) => load_builtin(builtin?, entry)?,
        None => load_shared_object(entry)?,
    };

    if !silent {
        info!(backend = %loaded.name(), path = %entry.path, "loaded backend");
    }
    Ok(loaded)
}

fn load_builtin(builtin: Builtin, entry: &BackendEntry) -> Result<LoadedBackend> {
    let args = BackendArgs::parse(&entry.argv()).map_err(InitError::from)?;
    let (interface, context) = builtin.instantiate(&args)?;
    debug!(%builtin, "instantiated builtin backend");
    Ok(LoadedBackend::from_parts(interface, context))
}

fn load_shared_object(entry: &BackendEntry) -> Result<LoadedBackend> {
    debug!(path = %entry.path, "opening backend shared object");

    // SAFETY: loading runs the library's initialisers; backends are trusted
    // code named explicitly by the user.
    let library = unsafe { Library::new(&entry.path) }.map_err(|source| DispatchError::Load {
        path: entry.path.clone(),
        source,
    })?;

    // SAFETY: the ABI fixes the signature of the entry point.
    let init: InitFn = unsafe {
        let symbol: Symbol<InitFn> = library
            .get(ENTRY_SYMBOL)
            .map_err(|source| DispatchError::MissingEntrySymbol {
                path: entry.path.clone(),
                source,
            })?;
        *symbol
    };

    let argv = entry
        .argv()
        .into_iter()
        .map(CString::new)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| DispatchError::NulInArgument {
            path: entry.path.clone(),
        })?;
    let mut raw: Vec<*mut c_char> = argv.iter().map(|arg| arg.as_ptr() as *mut c_char).collect();
    raw.push(ptr::null_mut());

    let mut context = ptr::null_mut();
    // SAFETY: `raw` holds `argv.len()` valid strings followed by a null.
    let interface = unsafe { init(argv.len() as c_int, raw.as_mut_ptr(), &mut context) };

    if interface.abi_version != ABI_VERSION {
        return Err(DispatchError::AbiVersion {
            path: entry.path.clone(),
            found: interface.abi_version,
            expected: ABI_VERSION,
        });
    }

    Ok(LoadedBackend {
        interface,
        context,
        _argv: argv,
        _library: Some(library),
    })
}
