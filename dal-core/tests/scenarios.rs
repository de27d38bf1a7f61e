//! End-to-end scenarios against the public API, exercising the table
//! factory, the linear-model core, and the RBF kernel fixup together the
//! way a caller actually would rather than unit-by-unit.

use dal_core::factory::{make_dense, make_heterogen};
use dal_core::kernels::rbf::rbf_value;
use dal_core::linear_model::{finalize, predict, PartialModel};
use dal_core::table::{AccessMode, Column};

#[test]
fn s1_linear_regression_smoke() {
    let mut p = PartialModel::new(2, 1, true);
    p.update(
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        &[3.0, 7.0, 11.0, 15.0],
        4,
    )
    .unwrap();
    let model = finalize(&mut p, None).unwrap();
    // x2 = x1 + 1 in this data, so X'X is exactly singular; the solve zeroes
    // the free x2 direction and lands on intercept=1, coefficients=[2, 0],
    // which reproduces Y exactly (verified against the raw rows below).
    for (got, want) in model.betas().iter().zip(&[1.0, 2.0, 0.0]) {
        assert!((got - want).abs() < 1e-10, "got {got}, want {want}");
    }
}

#[test]
fn s2_ridge_shrinkage() {
    let mut p = PartialModel::new(2, 1, false);
    p.update(
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        &[3.0, 7.0, 11.0, 15.0],
        4,
    )
    .unwrap();
    let model = finalize(&mut p, Some(1e6)).unwrap();
    for c in model.coefficients_for(0) {
        assert!(c.abs() < 1e-3, "expected heavy shrinkage, got {c}");
    }
}

#[test]
fn s3_incremental_equivalence() {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let y = [3.0, 7.0, 11.0, 15.0];

    let mut batch = PartialModel::new(2, 1, true);
    batch.update(&x, &y, 4).unwrap();
    let batch_model = finalize(&mut batch, None).unwrap();

    let mut first_half = PartialModel::new(2, 1, true);
    first_half.update(&x[0..4], &y[0..2], 2).unwrap();
    let mut second_half = PartialModel::new(2, 1, true);
    second_half.update(&x[4..8], &y[2..4], 2).unwrap();
    first_half.merge(&second_half).unwrap();
    let incremental_model = finalize(&mut first_half, None).unwrap();

    assert_eq!(batch_model.betas(), incremental_model.betas());
}

#[test]
fn s4_rbf_post_gemm_bound() {
    let exp20 = rbf_value(0.0, 0.0, 10.0, -1.0, -50.0);
    assert!((exp20 - 20f64.exp()).abs() < 1e-9);

    let clamped = rbf_value(0.0, 0.0, 10.0, 100.0, -50.0);
    assert!((clamped - (-50f64).exp()).abs() < 1e-9);
}

#[test]
fn s5_heterogeneous_pull_matches_dense_up_to_cast() {
    let heterogen = make_heterogen(
        vec![
            Column::from_i32(vec![1, 2, 3]),
            Column::from_f32(vec![0.5, 1.5, 2.5]),
        ],
        3,
    )
    .unwrap();
    let dense = make_dense(vec![1.0, 0.5, 2.0, 1.5, 3.0, 2.5], 3, 2).unwrap();

    let from_heterogen = heterogen.rows::<f64>(0, 3, AccessMode::ReadOnly).unwrap();
    let from_dense = dense.rows::<f64>(0, 3, AccessMode::ReadOnly).unwrap();
    assert_eq!(from_heterogen.as_slice(), from_dense.as_slice());
    assert_eq!(from_heterogen.as_slice(), &[1.0, 0.5, 2.0, 1.5, 3.0, 2.5]);
}

#[test]
fn s6_profiler_tree_merges_repeated_siblings() {
    use dal_core::profiler::Profiler;

    let profiler = Profiler::new("train");
    {
        for _ in 0..3 {
            let _gemm = profiler.scoped_task("gemm");
        }
        let _solve = profiler.scoped_task("solve");
    }
    // teardown_report should not panic and should mention both merged names
    // when verbosity is enabled via VERBOSE; in the default (off) test
    // environment this just exercises the no-op path without asserting on
    // textual output, since VERBOSE is read once per process.
    let _ = profiler.teardown_report();
}

#[test]
fn predict_round_trip_recovers_known_linear_relationship() {
    let mut p = PartialModel::new(2, 1, true);
    p.update(
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        &[3.0, 7.0, 11.0, 15.0],
        4,
    )
    .unwrap();
    let model = finalize(&mut p, None).unwrap();
    let y = predict(&model, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 4).unwrap();
    for (got, want) in y.iter().zip(&[3.0, 7.0, 11.0, 15.0]) {
        assert!((got - want).abs() < 1e-6);
    }
}
