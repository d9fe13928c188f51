//! Dispatch tables assembled from built-in backends.

use proptest::prelude::*;
use vfloat_abi::{BinaryOp, FcmpPredicate, Operation};
use vfloat_core::bits::next_up;
use vfloat_core::FloatType;
use vfloat_dispatch::{DispatchConfig, DispatchError, DispatchTable};

fn table(list: &str) -> DispatchTable {
    let mut config = DispatchConfig::new(list);
    config.silent_load = true;
    DispatchTable::from_config(&config).unwrap()
}

#[test]
fn later_backend_overrides_earlier_result() {
    let both = table("builtin:stochastic --rounding-mode=upward; builtin:ieee");
    assert_eq!(both.binary(BinaryOp::Div, 1.0f64, 3.0), 1.0 / 3.0);

    let reversed = table("builtin:ieee; builtin:stochastic --rounding-mode=upward");
    assert_eq!(reversed.binary(BinaryOp::Div, 1.0f64, 3.0), next_up(1.0f64 / 3.0));

    reversed.set_active_backends(1).unwrap();
    assert_eq!(reversed.binary(BinaryOp::Div, 1.0f64, 3.0), 1.0 / 3.0);
}

#[test]
fn comparison_coverage_is_opt_in() {
    let mut config = DispatchConfig::new("builtin:vprec");
    config.silent_load = true;
    DispatchTable::from_config(&config).unwrap();

    config.instrument_fcmp = true;
    assert!(matches!(
        DispatchTable::from_config(&config),
        Err(DispatchError::Coverage { operation: Operation::Cmp, ty: FloatType::Binary32 })
    ));

    config.backends.push_str("; builtin:ieee");
    let table = DispatchTable::from_config(&config).unwrap();
    assert_eq!(table.compare(FcmpPredicate::Ult, f64::NAN, 1.0), 1);
    assert_eq!(table.compare(FcmpPredicate::Olt, f64::NAN, 1.0), 0);
}

#[test]
fn load_errors_abort_table_creation() {
    let mut config = DispatchConfig::new("builtin:ieee; builtin:stochastic --rounding-mode=sideways");
    config.silent_load = true;
    assert!(matches!(DispatchTable::from_config(&config), Err(DispatchError::BackendInit(_))));

    config.backends = "builtin:ieee; /nonexistent/libinterflop_ghost.so".to_string();
    assert!(matches!(DispatchTable::from_config(&config), Err(DispatchError::Load { .. })));

    config.backends.clear();
    assert!(matches!(DispatchTable::from_config(&config), Err(DispatchError::EmptyBackendList)));
}

#[test]
fn user_calls_reach_active_backends() {
    let table = table("builtin:vprec --mode=full");
    table.user_call(3, 3);
    assert_eq!(table.binary(BinaryOp::Add, 1.0f64, 0.125), 1.125);
    assert_eq!(table.binary(BinaryOp::Add, 1.0f64, 0.03125), 1.0);

    // Out-of-range precision is rejected by the backend and leaves the format alone.
    table.user_call(3, 400);
    assert_eq!(table.binary(BinaryOp::Add, 1.0f64, 0.03125), 1.0);
}

#[test]
fn mca_precision_follows_user_calls() {
    let table = table("builtin:mca --mode=rr --seed=21");
    let third = 1.0f64 / 3.0;
    let spread = |table: &DispatchTable| {
        (0..200)
            .map(|_| (table.binary(BinaryOp::Div, 1.0f64, 3.0) - third).abs())
            .fold(0.0, f64::max)
    };
    // Full precision only moves 1/3 to a neighbour.
    assert!(spread(&table) <= f64::EPSILON);

    table.user_call(3, 8);
    let coarse = spread(&table);
    assert!(coarse > 2f64.powi(-14) && coarse <= 2f64.powi(-10) * 1.01, "{coarse:e}");

    // Exact results are left alone in random rounding mode.
    assert_eq!(table.binary(BinaryOp::Add, 1.0f32, 0.5), 1.5);
}

#[test]
fn cast_goes_through_the_last_cast_slot() {
    let table = table("builtin:ieee; builtin:stochastic --rounding-mode=downward");
    let third = 1.0f64 / 3.0;
    let nearest = third as f32;
    let cast = table.cast_to_f32(third);
    assert!(cast == nearest || cast == f32::from_bits(nearest.to_bits() - 1));
    assert!(f64::from(cast) <= third);
}

proptest! {
    #[test]
    fn vectors_match_per_lane_scalars(
        a in prop::array::uniform4(-1.0e6f64..1.0e6),
        b in prop::array::uniform4(1.0e-3f64..1.0e6),
    ) {
        let table = table("builtin:stochastic --rounding-mode=upward");
        for op in BinaryOp::ALL {
            let lanes = table.binary_vector(op, &a, &b);
            for i in 0..4 {
                prop_assert_eq!(lanes[i].to_bits(), table.binary(op, a[i], b[i]).to_bits());
            }
        }
        let fused = table.fma_vector(&a, &b, &a);
        for i in 0..4 {
            prop_assert_eq!(fused[i].to_bits(), table.fma(a[i], b[i], a[i]).to_bits());
        }
    }
}
