//! Statistical and bit-exactness properties of the stochastic backend.

use proptest::prelude::*;
use vfloat_abi::{Backend, BackendArgs, BinaryOp};
use vfloat_backends::StochasticBackend;
use vfloat_core::bits::{next_down, next_up};

fn backend(mode: &str, seed: Option<u64>) -> StochasticBackend {
    let mut argv = vec!["builtin:stochastic".to_string(), format!("--rounding-mode={mode}")];
    if let Some(seed) = seed {
        argv.push(format!("--seed={seed}"));
    }
    StochasticBackend::configure(&BackendArgs::parse(&argv).unwrap()).unwrap()
}

fn finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
}

fn binary_op() -> impl Strategy<Value = BinaryOp> {
    prop::sample::select(BinaryOp::ALL.to_vec())
}

/// `down <= nearest <= up`, each at most one ULP away.
fn assert_brackets(nearest: f64, up: f64, down: f64) -> Result<(), TestCaseError> {
    prop_assert!(down <= nearest && nearest <= up, "{down:e} <= {nearest:e} <= {up:e}");
    prop_assert!(up == nearest || up == next_up(nearest));
    prop_assert!(down == nearest || down == next_down(nearest));
    Ok(())
}

proptest! {
    #[test]
    fn nearest_and_native_match_hardware(a in finite_f64(), b in finite_f64(), op in binary_op()) {
        let native = op.apply(a, b);
        for mode in ["nearest", "native"] {
            let got = backend(mode, Some(1)).binary(op, a, b);
            if native.is_nan() {
                prop_assert!(got.is_nan());
            } else {
                prop_assert_eq!(got.to_bits(), native.to_bits());
            }
        }
    }

    #[test]
    fn directed_modes_bracket_nearest(a in finite_f64(), b in finite_f64(), op in binary_op()) {
        let nearest = op.apply(a, b);
        prop_assume!(nearest.is_finite());
        let up = backend("upward", None).binary(op, a, b);
        let down = backend("downward", None).binary(op, a, b);
        assert_brackets(nearest, up, down)?;
    }

    #[test]
    fn directed_fma_brackets_nearest(a in finite_f64(), b in finite_f64(), c in finite_f64()) {
        let nearest = a.mul_add(b, c);
        prop_assume!(nearest.is_finite() && (a * b).is_finite());
        let up = backend("upward", None).fma(a, b, c);
        let down = backend("downward", None).fma(a, b, c);
        assert_brackets(nearest, up, down)?;
    }

    #[test]
    fn f32_nearest_matches_hardware(a in prop::num::f32::NORMAL, b in prop::num::f32::NORMAL) {
        let got = backend("nearest", None).binary(BinaryOp::Mul, a, b);
        prop_assert_eq!(got.to_bits(), (a * b).to_bits());
    }
}

#[test]
fn random_steps_half_of_the_time() {
    let b = backend("random", Some(2024));
    let nearest = 1.0f64 / 3.0;
    let above = next_up(nearest);
    let trials = 20_000;
    let mut stepped = 0;
    for _ in 0..trials {
        let r = b.binary(BinaryOp::Div, 1.0f64, 3.0);
        assert!(r == nearest || r == above, "{r:e}");
        if r == above {
            stepped += 1;
        }
    }
    let fraction = stepped as f64 / trials as f64;
    assert!((fraction - 0.5).abs() < 0.02, "fraction {fraction}");
}

#[test]
fn random_keeps_exact_results() {
    let b = backend("random", Some(3));
    for _ in 0..1_000 {
        assert_eq!(b.binary(BinaryOp::Add, 1.5f32, 0.25), 1.75);
        assert_eq!(b.fma(2.0f64, 3.0, 0.5), 6.5);
    }
}

#[test]
fn average_converges_to_the_exact_value() {
    let b = backend("average", Some(99));
    // 1 + 2^-54 lies a quarter ULP above 1.
    let x = 2f64.powi(-54);
    let trials = 20_000;
    let mut ulps = 0.0;
    for _ in 0..trials {
        let r = b.binary(BinaryOp::Add, 1.0f64, x);
        ulps += (r - 1.0) / f64::EPSILON;
    }
    let mean = ulps / trials as f64;
    assert!((mean - 0.25).abs() < 0.02, "mean {mean}");
}

#[test]
fn fixed_seed_is_reproducible() {
    let run = |mode: &str| {
        let b = backend(mode, Some(7));
        (1..200).map(|i| b.binary(BinaryOp::Div, 1.0f64, i as f64).to_bits()).collect::<Vec<_>>()
    };
    for mode in ["random", "average"] {
        assert_eq!(run(mode), run(mode), "{mode}");
    }
}

#[test]
fn float_only_rounds_through_binary32() {
    let b = backend("float", None);
    let r = b.binary(BinaryOp::Add, 0.1f64, 0.2);
    assert_eq!(r, f64::from(0.1f32 + 0.2f32));
}
