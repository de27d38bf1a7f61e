//! Finalization of a [`PartialModel`] into trained coefficients (spec §4.7):
//! optional ridge regularization, a normal-equations solve via Cholesky
//! factorization, and coefficient extraction with the intercept always
//! placed in column 0 of `betas` regardless of whether the model was fit
//! with one.
//!
//! The actual dense linear-algebra kernel (Cholesky factor + triangular
//! solve) is implemented directly here rather than through a BLAS/LAPACK
//! binding: the spec treats vendor BLAS/LAPACK wrappers as an external
//! black box out of scope, which this reads as "don't wrap one", not "skip
//! the algorithm" — the solve itself is small, well-understood, and owned
//! by this core like every other kernel it implements.

use crate::descriptor::{LinearModelDescriptor, ResultOptions};
use crate::error::{DalError, DalResult};
use crate::linear_model::partial::PartialModel;

#[derive(Debug, Clone)]
pub struct TrainedModel {
    feature_count: usize,
    response_count: usize,
    /// `response_count x (feature_count + 1)`, row-major; column 0 is
    /// always the intercept (zero when the model has none).
    betas: Vec<f64>,
}

impl TrainedModel {
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn response_count(&self) -> usize {
        self.response_count
    }

    /// `response_count x (feature_count + 1)` row-major, column 0 = intercept.
    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    pub fn intercept_for(&self, response: usize) -> f64 {
        self.betas[response * (self.feature_count + 1)]
    }

    pub fn coefficients_for(&self, response: usize) -> &[f64] {
        let start = response * (self.feature_count + 1) + 1;
        &self.betas[start..start + self.feature_count]
    }

    /// Reconstructs a trained model from its raw, already-validated
    /// coefficients (spec §4.7 persisted-state layout).
    pub(crate) fn from_raw_parts(
        feature_count: usize,
        response_count: usize,
        betas: Vec<f64>,
    ) -> DalResult<Self> {
        if betas.len() != response_count * (feature_count + 1) {
            return Err(DalError::InvalidArgument(format!(
                "expected {} beta entries, got {}",
                response_count * (feature_count + 1),
                betas.len()
            )));
        }
        Ok(Self {
            feature_count,
            response_count,
            betas,
        })
    }
}

/// Finalizes `partial` into a [`TrainedModel`], consuming it (the
/// accumulator is marked finalized either way, so a caller cannot
/// accidentally keep updating a model whose coefficients were already
/// extracted).
///
/// `alpha`, when set, adds `alpha * I` to every diagonal entry of `xtx`
/// except the intercept's row/column before solving — the resolution this
/// core uses for the spec's ridge/intercept Open Question (see design
/// notes): regularizing the intercept would penalize the response's mean
/// rather than its relationship to the features.
pub fn finalize(partial: &mut PartialModel, alpha: Option<f64>) -> DalResult<TrainedModel> {
    if partial.observation_count() == 0 {
        return Err(DalError::InvalidArgument(
            "cannot finalize an accumulator with no observations".into(),
        ));
    }
    let dim = partial.dim();
    let response_count = partial.response_count();
    let feature_count = partial.feature_count();
    let has_intercept = partial.has_intercept();

    let mut xtx = partial.xtx().to_vec();
    if let Some(alpha) = alpha {
        for i in 0..dim {
            if has_intercept && i == 0 {
                continue;
            }
            xtx[i * dim + i] += alpha;
        }
    }

    cholesky_decompose(&mut xtx, dim)?;
    let solution = cholesky_solve(&xtx, partial.xty(), dim, response_count);

    // `solution` is laid out dim-major (row a, response r) -> solution[a*response_count + r].
    let mut betas = vec![0.0; response_count * (feature_count + 1)];
    for r in 0..response_count {
        let out_base = r * (feature_count + 1);
        if has_intercept {
            betas[out_base] = solution[0 * response_count + r];
            for f in 0..feature_count {
                betas[out_base + 1 + f] = solution[(f + 1) * response_count + r];
            }
        } else {
            betas[out_base] = 0.0;
            for f in 0..feature_count {
                betas[out_base + 1 + f] = solution[f * response_count + r];
            }
        }
    }

    partial.mark_finalized();
    Ok(TrainedModel {
        feature_count,
        response_count,
        betas,
    })
}

/// Relative tolerance a diagonal pivot is allowed to dip below zero by
/// before [`cholesky_decompose`] treats the matrix as genuinely indefinite
/// rather than merely rank-deficient-by-rounding. Collinear features (an
/// intercept plus two columns related by an exact affine relation, say)
/// make `X'X` exactly singular; floating-point rounding in the running sum
/// then lands a pivot a few ULPs below zero instead of exactly at it.
const PIVOT_REL_TOLERANCE: f64 = 1e-9;

/// One-shot convenience over [`PartialModel::update`] + [`finalize`] that
/// takes the whole descriptor surface at once (spec §4.7/§9's
/// `compute_intercept`/`alpha`/`result_options` triple) instead of assembling
/// an accumulator by hand. `result_options` controls which parts of `betas`
/// come back populated: a caller that didn't ask for `INTERCEPT` or
/// `COEFFICIENTS` gets zeros in the corresponding slots rather than an error,
/// since the accumulator has to compute the full normal-equations solve
/// regardless of which half the caller wants back.
pub fn train(
    x: &[f64],
    y: &[f64],
    rows: usize,
    feature_count: usize,
    response_count: usize,
    descriptor: &LinearModelDescriptor,
) -> DalResult<TrainedModel> {
    let mut partial = PartialModel::new(feature_count, response_count, descriptor.compute_intercept);
    partial.update(x, y, rows)?;
    let alpha = (descriptor.alpha > 0.0).then_some(descriptor.alpha);
    let mut model = finalize(&mut partial, alpha)?;

    let stride = feature_count + 1;
    if !descriptor.result_options.contains(ResultOptions::INTERCEPT) {
        for r in 0..response_count {
            model.betas[r * stride] = 0.0;
        }
    }
    if !descriptor.result_options.contains(ResultOptions::COEFFICIENTS) {
        for r in 0..response_count {
            model.betas[r * stride + 1..(r + 1) * stride].fill(0.0);
        }
    }
    Ok(model)
}

/// In-place lower Cholesky factorization of the `dim x dim` row-major
/// symmetric positive-semidefinite matrix `a` (the `X'X`, possibly
/// ridge-regularized). On return the lower triangle of `a` holds `L` such
/// that `L L^T = a`; the upper triangle is left untouched and must not be
/// read.
///
/// A pivot that rounds to a small negative number relative to the matrix's
/// own scale is clamped to zero rather than rejected: the matrix is treated
/// as positive *semi*definite, and the corresponding column of `L` (and,
/// transitively, the unknown it solves for) comes out zero rather than
/// `NaN`. Only a pivot that is negative well beyond rounding error is
/// reported as indefinite.
fn cholesky_decompose(a: &mut [f64], dim: usize) -> DalResult<()> {
    let scale = a.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs())).max(1.0);
    let tolerance = PIVOT_REL_TOLERANCE * scale;

    for j in 0..dim {
        let mut sum = a[j * dim + j];
        for k in 0..j {
            sum -= a[j * dim + k] * a[j * dim + k];
        }
        if sum < -tolerance {
            return Err(DalError::InternalError(
                "normal-equations matrix is not positive semidefinite; add ridge regularization or check for collinear features".into(),
            ));
        }
        let ljj = sum.max(0.0).sqrt();
        a[j * dim + j] = ljj;
        for i in (j + 1)..dim {
            let mut s = a[i * dim + j];
            for k in 0..j {
                s -= a[i * dim + k] * a[j * dim + k];
            }
            // A zeroed pivot means this column of L is the zero vector: the
            // corresponding direction is in the null space of `a`, and `s`
            // here is itself ~0 for a consistent system.
            a[i * dim + j] = if ljj > 0.0 { s / ljj } else { 0.0 };
        }
    }
    Ok(())
}

/// Solves `L L^T X = B` for each of `response_count` right-hand-side
/// columns in `b` (`dim x response_count`, row-major), given `l` from
/// [`cholesky_decompose`]. Returns `X`, `dim x response_count` row-major.
///
/// A zero diagonal entry of `l` (a pivot [`cholesky_decompose`] clamped to
/// zero) marks a free direction; the corresponding unknown is pinned to
/// zero rather than dividing by it, picking the particular solution with a
/// zero component along that direction.
fn cholesky_solve(l: &[f64], b: &[f64], dim: usize, response_count: usize) -> Vec<f64> {
    let mut z = vec![0.0; dim * response_count];
    // Forward substitution: L z = b.
    for r in 0..response_count {
        for i in 0..dim {
            let mut s = b[i * response_count + r];
            for k in 0..i {
                s -= l[i * dim + k] * z[k * response_count + r];
            }
            let lii = l[i * dim + i];
            z[i * response_count + r] = if lii > 0.0 { s / lii } else { 0.0 };
        }
    }
    // Back substitution: L^T x = z.
    let mut x = vec![0.0; dim * response_count];
    for r in 0..response_count {
        for i in (0..dim).rev() {
            let mut s = z[i * response_count + r];
            for k in (i + 1)..dim {
                s -= l[k * dim + i] * x[k * response_count + r];
            }
            let lii = l[i * dim + i];
            x[i * response_count + r] = if lii > 0.0 { s / lii } else { 0.0 };
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s1_linear_regression_smoke_test() {
        // X = [[1,2],[3,4],[5,6],[7,8]], Y = [[3],[7],[11],[15]], intercept=true.
        // x2 = x1 + 1 here, so X'X is exactly singular (rank 2 of 3); the
        // Cholesky solve zeroes the free x2 direction and lands on the
        // particular solution Y = 1 + 2*x1 + 0*x2, which reproduces Y exactly.
        let mut p = PartialModel::new(2, 1, true);
        p.update(
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            &[3.0, 7.0, 11.0, 15.0],
            4,
        )
        .unwrap();
        let model = finalize(&mut p, None).unwrap();
        assert_eq!(model.betas().len(), 3);
        for (got, want) in model.betas().iter().zip(&[1.0, 2.0, 0.0]) {
            assert!((got - want).abs() < 1e-8, "got {got}, want {want}");
        }
    }

    #[test]
    fn ridge_leaves_intercept_row_unregularized() {
        let mut p = PartialModel::new(1, 1, true);
        p.update(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0], 3).unwrap();
        let plain = finalize(&mut p.clone(), None).unwrap();
        let ridged = finalize(&mut p.clone(), Some(10.0)).unwrap();
        // Ridge shrinks the slope but the intercepts need not match exactly
        // on this tiny example; the key invariant is that ridge changes the
        // solution and does not blow up the intercept term.
        assert!(ridged.coefficients_for(0)[0].abs() <= plain.coefficients_for(0)[0].abs() + 1e-9);
        assert!(ridged.intercept_for(0).is_finite());
    }

    #[test]
    fn finalize_without_observations_is_an_error() {
        let mut p = PartialModel::new(1, 1, false);
        assert!(finalize(&mut p, None).is_err());
    }

    #[test]
    fn no_intercept_model_still_exposes_an_intercept_column_of_zero() {
        let mut p = PartialModel::new(1, 1, false);
        p.update(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0], 3).unwrap();
        let model = finalize(&mut p, None).unwrap();
        assert_eq!(model.intercept_for(0), 0.0);
        assert!((model.coefficients_for(0)[0] - 2.0).abs() < 1e-8);
    }

    #[test]
    fn train_with_default_descriptor_matches_manual_finalize() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        let mut manual = PartialModel::new(1, 1, true);
        manual.update(&x, &y, 3).unwrap();
        let manual_model = finalize(&mut manual, None).unwrap();

        let descriptor = LinearModelDescriptor::default();
        let via_descriptor = train(&x, &y, 3, 1, 1, &descriptor).unwrap();
        assert_eq!(manual_model.betas(), via_descriptor.betas());
    }

    #[test]
    fn train_without_intercept_result_option_zeroes_the_intercept_slot() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        let descriptor = LinearModelDescriptor {
            result_options: ResultOptions::COEFFICIENTS,
            ..LinearModelDescriptor::default()
        };
        let model = train(&x, &y, 3, 1, 1, &descriptor).unwrap();
        assert_eq!(model.intercept_for(0), 0.0);
        assert!((model.coefficients_for(0)[0] - 2.0).abs() < 1e-8);
    }
}
