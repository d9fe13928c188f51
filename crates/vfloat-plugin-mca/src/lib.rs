//! `libinterflop_mca`: Monte Carlo Arithmetic.
//!
//! Options: `--precision-binary32=<t>`, `--precision-binary64=<t>`,
//! `--mode=ieee|mca|pb|rr`, `--error-mode=rel|abs|all`,
//! `--max-abs-error-exponent=<e>`, `--seed=<n>`, `--sparsity=<p>`,
//! `--daz`, `--ftz`.

vfloat_abi::export_backend!(vfloat_backends::McaBackend);
