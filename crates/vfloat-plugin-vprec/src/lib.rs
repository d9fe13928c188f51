//! `libinterflop_vprec`: the vprec backend as a shared object.
//!
//! Load it with `VFC_BACKENDS="/path/to/libinterflop_vprec.so [options]"`.

vfloat_abi::export_backend!(vfloat_backends::VprecBackend);
