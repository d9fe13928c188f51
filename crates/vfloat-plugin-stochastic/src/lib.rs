//! `libinterflop_stochastic`: directed and stochastic rounding.

vfloat_abi::export_backend!(vfloat_backends::StochasticBackend);
