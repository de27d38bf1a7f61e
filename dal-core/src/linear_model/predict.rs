//! Prediction: `Y = X * betas[:, 1:]^T`, plus each response's intercept
//! broadcast across every row (spec §4.7). Row-blocked with a default block
//! size of 1024, the spec's documented default for batching a prediction
//! pass independently of how the training side blocked its accumulation.

use crate::descriptor::CpuHyperparameters;
use crate::error::{DalError, DalResult};
use crate::linear_model::train::TrainedModel;

/// Matches `CpuHyperparameters::default().cpu_predict_block_rows`; kept as
/// its own constant since callers that never touch hyperparameters (most of
/// `predict`'s test suite) still want a name for the default block size.
pub const DEFAULT_PREDICT_BLOCK_ROWS: usize = 1024;

/// Predicts `row_count` rows of `feature_count` columns, row-major in `x`,
/// returning `row_count x response_count` row-major, using the safe default
/// block size (`CpuHyperparameters::default().cpu_predict_block_rows`).
pub fn predict(model: &TrainedModel, x: &[f64], row_count: usize) -> DalResult<Vec<f64>> {
    predict_with_hyperparameters(model, x, row_count, &CpuHyperparameters::default())
}

/// Like [`predict`], but reads its row-block size from `hyperparameters`
/// instead of the safe default.
pub fn predict_with_hyperparameters(
    model: &TrainedModel,
    x: &[f64],
    row_count: usize,
    hyperparameters: &CpuHyperparameters,
) -> DalResult<Vec<f64>> {
    predict_blocked(model, x, row_count, hyperparameters.cpu_predict_block_rows)
}

pub fn predict_blocked(
    model: &TrainedModel,
    x: &[f64],
    row_count: usize,
    block_rows: usize,
) -> DalResult<Vec<f64>> {
    let feature_count = model.feature_count();
    let response_count = model.response_count();
    if x.len() != row_count * feature_count {
        return Err(DalError::InvalidArgument(format!(
            "expected {} values for {row_count} rows of {feature_count} features, got {}",
            row_count * feature_count,
            x.len()
        )));
    }
    let block_rows = block_rows.max(1);
    let mut y = vec![0.0; row_count * response_count];

    let mut block_start = 0;
    while block_start < row_count {
        let block_end = (block_start + block_rows).min(row_count);
        for row in block_start..block_end {
            let x_row = &x[row * feature_count..(row + 1) * feature_count];
            for r in 0..response_count {
                let coeffs = model.coefficients_for(r);
                let mut acc = model.intercept_for(r);
                for (xv, cv) in x_row.iter().zip(coeffs) {
                    acc += xv * cv;
                }
                y[row * response_count + r] = acc;
            }
        }
        block_start = block_end;
    }
    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_model::partial::PartialModel;
    use crate::linear_model::train::finalize;

    #[test]
    fn predict_reproduces_the_training_targets_when_the_fit_is_exact() {
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
            assert!((got - want).abs() < 1e-8);
        }
    }

    #[test]
    fn predict_is_independent_of_block_size() {
        let mut p = PartialModel::new(2, 1, true);
        p.update(
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            &[3.0, 7.0, 11.0, 15.0],
            4,
        )
        .unwrap();
        let model = finalize(&mut p, None).unwrap();
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let whole = predict_blocked(&model, &x, 4, 4).unwrap();
        let one_row_at_a_time = predict_blocked(&model, &x, 4, 1).unwrap();
        assert_eq!(whole, one_row_at_a_time);
    }

    #[test]
    fn default_hyperparameters_agree_with_the_named_constant() {
        assert_eq!(
            CpuHyperparameters::default().cpu_predict_block_rows,
            DEFAULT_PREDICT_BLOCK_ROWS
        );
    }

    #[test]
    fn predict_with_hyperparameters_honors_a_custom_block_size() {
        let mut p = PartialModel::new(2, 1, true);
        p.update(
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            &[3.0, 7.0, 11.0, 15.0],
            4,
        )
        .unwrap();
        let model = finalize(&mut p, None).unwrap();
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let tiny = CpuHyperparameters {
            cpu_predict_block_rows: 1,
            ..CpuHyperparameters::default()
        };
        let via_hyperparameters = predict_with_hyperparameters(&model, &x, 4, &tiny).unwrap();
        let via_default = predict(&model, &x, 4).unwrap();
        assert_eq!(via_hyperparameters, via_default);
    }

    #[test]
    fn mismatched_feature_count_is_an_error() {
        let mut p = PartialModel::new(2, 1, true);
        p.update(&[1.0, 2.0], &[1.0], 1).unwrap();
        let model = finalize(&mut p, None).unwrap();
        assert!(predict(&model, &[1.0], 1).is_err());
    }
}
