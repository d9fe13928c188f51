//! `libinterflop_cancellation`: noise on catastrophic cancellations in
//! additions and subtractions (`--tolerance=<bits>`, `--warning`, `--seed=<n>`).

vfloat_abi::export_backend!(vfloat_backends::CancellationBackend);
