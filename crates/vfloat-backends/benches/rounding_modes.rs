//! Rounding throughput per backend mode
//!
//! Benchmarks:
//! - Stochastic backend across every rounding mode (add, div, fma)
//! - VPREC backend across precisions
//! - MCA backend across modes
//! - Native baseline for reference

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vfloat_abi::{Backend, BackendArgs, BinaryOp};
use vfloat_backends::{McaBackend, McaMode, RoundingMode, StochasticBackend, VprecBackend};

const SIZE: usize = 4_096;

fn operands() -> (Vec<f64>, Vec<f64>) {
    let a = (0..SIZE).map(|i| 1.0 + i as f64 / 7.0).collect();
    let b = (0..SIZE).map(|i| 0.1 + i as f64 / 13.0).collect();
    (a, b)
}

fn stochastic(mode: RoundingMode) -> StochasticBackend {
    let argv = ["builtin:stochastic".to_string(), format!("--rounding-mode={mode}"), "--seed=1".to_string()];
    StochasticBackend::configure(&BackendArgs::parse(&argv).unwrap()).unwrap()
}

fn benchmark_stochastic(c: &mut Criterion) {
    let (a, b) = operands();

    for op in [BinaryOp::Add, BinaryOp::Div] {
        let mut group = c.benchmark_group(format!("stochastic_{}", op.operation()));

        group.bench_function("native", |bench| {
            bench.iter(|| {
                let mut acc = 0.0;
                for i in 0..SIZE {
                    acc += op.apply(black_box(a[i]), black_box(b[i]));
                }
                black_box(acc)
            });
        });

        // FTZ aborts through the panic hook.
        for mode in RoundingMode::ALL.into_iter().filter(|m| *m != RoundingMode::FlushToZero) {
            let backend = stochastic(mode);
            group.bench_with_input(BenchmarkId::from_parameter(mode), &backend, |bench, backend| {
                bench.iter(|| {
                    let mut acc = 0.0;
                    for i in 0..SIZE {
                        acc += backend.binary(op, black_box(a[i]), black_box(b[i]));
                    }
                    black_box(acc)
                });
            });
        }

        group.finish();
    }
}

fn benchmark_stochastic_fma(c: &mut Criterion) {
    let (a, b) = operands();
    let mut group = c.benchmark_group("stochastic_fma");

    for mode in [RoundingMode::Nearest, RoundingMode::Random, RoundingMode::Average] {
        let backend = stochastic(mode);
        group.bench_with_input(BenchmarkId::from_parameter(mode), &backend, |bench, backend| {
            bench.iter(|| {
                let mut acc = 0.0f64;
                for i in 0..SIZE {
                    acc = backend.fma(black_box(a[i]), black_box(b[i]), acc);
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

fn benchmark_vprec(c: &mut Criterion) {
    let (a, b) = operands();
    let mut group = c.benchmark_group("vprec_mul");

    for precision in [52, 23, 10, 3] {
        let argv = ["builtin:vprec".to_string(), format!("--precision-binary64={precision}"), "--mode=full".to_string()];
        let backend = VprecBackend::configure(&BackendArgs::parse(&argv).unwrap()).unwrap();
        group.bench_with_input(BenchmarkId::new("full", precision), &backend, |bench, backend| {
            bench.iter(|| {
                let mut acc = 0.0;
                for i in 0..SIZE {
                    acc += backend.binary(BinaryOp::Mul, black_box(a[i]), black_box(b[i]));
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

fn benchmark_mca(c: &mut Criterion) {
    let (a, b) = operands();
    let mut group = c.benchmark_group("mca_div");

    for mode in McaMode::ALL {
        let argv = ["builtin:mca".to_string(), format!("--mode={mode}"), "--seed=1".to_string()];
        let backend = McaBackend::configure(&BackendArgs::parse(&argv).unwrap()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(mode), &backend, |bench, backend| {
            bench.iter(|| {
                let mut acc = 0.0;
                for i in 0..SIZE {
                    acc += backend.binary(BinaryOp::Div, black_box(a[i]), black_box(b[i]));
                }
                black_box(acc)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_stochastic, benchmark_stochastic_fma, benchmark_vprec, benchmark_mca);
criterion_main!(benches);
