//! Backend instantiation and the shared-object entry point.

use std::os::raw::{c_char, c_int, c_void};

use tracing::{debug, error};

use crate::abi::BackendInterface;
use crate::args::{ArgError, BackendArgs};
use crate::backend::Backend;
use crate::trampoline::{interface_for, into_context};

/// Why a backend could not be created.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The option vector itself was malformed.
    #[error(transparent)]
    Args(#[from] ArgError),

    /// The backend rejected its configuration.
    #[error("backend {backend}: {source}")]
    Configure {
        backend: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Configure `B` from `args` and return its interface and leaked context.
pub fn instantiate<B: Backend>(args: &BackendArgs) -> Result<(BackendInterface, *mut c_void), InitError> {
    let backend = B::configure(args).map_err(|err| InitError::Configure {
        backend: B::NAME.to_string_lossy().into_owned(),
        source: Box::new(err),
    })?;
    debug!(backend = %B::NAME.to_string_lossy(), "backend configured");
    Ok((interface_for::<B>(), into_context(backend)))
}

/// Body of the `interflop_init` symbol generated by [`export_backend!`].
///
/// Configuration errors are fatal: they are logged and the process exits
/// with status 1.
///
/// # Safety
///
/// `argv` must hold `argc` valid C strings and `context` must be writable.
pub unsafe fn init_backend<B: Backend>(
    argc: c_int,
    argv: *mut *mut c_char,
    context: *mut *mut c_void,
) -> BackendInterface {
    vfloat_tracing::init_from_env();

    let result = BackendArgs::from_raw(argc, argv as *const *const c_char)
        .map_err(InitError::from)
        .and_then(|args| instantiate::<B>(&args));

    match result {
        Ok((interface, ctx)) => {
            if !context.is_null() {
                *context = ctx;
            }
            interface
        }
        Err(err) => {
            error!(%err, "backend initialization failed");
            std::process::exit(1);
        }
    }
}

/// Export `interflop_init` for a [`Backend`] type from a `cdylib`.
///
/// ```ignore
/// vfloat_abi::export_backend!(vfloat_backends::ieee::IeeeBackend);
/// ```
#[macro_export]
macro_rules! export_backend {
    ($backend:ty) => {
        /// Entry point resolved by the vfloat dispatcher.
        ///
        /// # Safety
        ///
        /// Called by the dispatcher with a valid argument vector.
        #[no_mangle]
        pub unsafe extern "C" fn interflop_init(
            argc: ::std::os::raw::c_int,
            argv: *mut *mut ::std::os::raw::c_char,
            context: *mut *mut ::std::os::raw::c_void,
        ) -> $crate::BackendInterface {
            $crate::init_backend::<$backend>(argc, argv, context)
        }
    };
}
