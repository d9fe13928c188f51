//! Statistical properties of the Monte Carlo Arithmetic backend.

use proptest::prelude::*;
use vfloat_abi::{Backend, BackendArgs, BinaryOp};
use vfloat_backends::McaBackend;
use vfloat_core::bits::{next_up, normalized_exponent};

fn backend(argv: &[String]) -> McaBackend {
    McaBackend::configure(&BackendArgs::parse(argv).unwrap()).unwrap()
}

fn random_rounding(precision: u32, seed: u64) -> McaBackend {
    backend(&[
        "builtin:mca".to_string(),
        "--mode=rr".to_string(),
        format!("--precision-binary64={precision}"),
        format!("--seed={seed}"),
    ])
}

fn moderate_f64() -> impl Strategy<Value = f64> {
    (1.0e-100f64..1.0e100, any::<bool>()).prop_map(|(x, negative)| if negative { -x } else { x })
}

fn binary_op() -> impl Strategy<Value = BinaryOp> {
    prop::sample::select(BinaryOp::ALL.to_vec())
}

/// `-log2(std / |mean|)` over `n` draws of `sample`.
fn significant_bits(n: usize, mut sample: impl FnMut() -> f64) -> f64 {
    let draws: Vec<f64> = (0..n).map(|_| sample()).collect();
    let mean = draws.iter().sum::<f64>() / n as f64;
    let variance = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    -(variance.sqrt() / mean.abs()).log2()
}

#[test]
fn significant_bits_track_the_virtual_precision() {
    // Uniform noise of width 2^(e - t + 1) around 1/3 (e = -2) has a
    // relative deviation of 2^-(t + 1) * sqrt(3) / 2.
    let offset = 1.0 - (3f64.sqrt() / 2.0).log2();
    for precision in [8u32, 16, 24, 40] {
        let b = random_rounding(precision, u64::from(precision));
        let bits = significant_bits(4_000, || b.binary(BinaryOp::Div, 1.0f64, 3.0));
        let expected = precision as f64 + offset;
        assert!((bits - expected).abs() < 0.2, "t={precision}: {bits:.3} vs {expected:.3}");
    }
}

#[test]
fn full_precision_random_rounding_is_stochastic_rounding() {
    // 1/3 rounds down in binary64, a third of an ULP below the exact value.
    let b = random_rounding(53, 2024);
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
    assert!((fraction - 1.0 / 3.0).abs() < 0.02, "fraction {fraction}");
}

#[test]
fn mean_of_mca_samples_is_unbiased() {
    let b = backend(&["m".to_string(), "--precision-binary64=20".to_string(), "--seed=5".to_string()]);
    let trials = 10_000;
    let mean = (0..trials).map(|_| b.binary(BinaryOp::Add, 0.1f64, 0.2)).sum::<f64>() / trials as f64;
    // Three noises, the widest 2^-21 across; averaging shrinks them by sqrt(n).
    assert!((mean - 0.3).abs() < 2f64.powi(-26), "{mean:e}");
}

proptest! {
    #[test]
    fn random_rounding_stays_within_the_noise(
        a in moderate_f64(),
        b in moderate_f64(),
        op in binary_op(),
        precision in 2u32..=52,
    ) {
        let nearest = op.apply(a, b);
        prop_assume!(nearest.is_finite() && nearest.abs() >= f64::MIN_POSITIVE);
        let got = random_rounding(precision, 1).binary(op, a, b);
        let e = normalized_exponent(nearest);
        let bound = 2f64.powi(e - precision as i32) + 2f64.powi(e - 51);
        prop_assert!((got - nearest).abs() <= bound, "{got:e} vs {nearest:e}");
    }
}
