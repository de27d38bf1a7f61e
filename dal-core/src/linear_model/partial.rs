//! Partial accumulator for least-squares linear-model training (spec §4.7):
//! `{xtx, xty, n}`, built incrementally by blocked updates and combinable by
//! plain elementwise merge, independent of how the observations arrived.
//!
//! The accumulator only ever moves forward through
//! `empty -> accumulating -> finalized`; `update`/`merge` on a finalized
//! accumulator is an error rather than silently reopening it, mirroring the
//! once-installed, never-mutated [`crate::dictionary::Dictionary`] contract.

use crate::descriptor::CpuHyperparameters;
use crate::error::{DalError, DalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Accumulating,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct PartialModel {
    feature_count: usize,
    response_count: usize,
    intercept: bool,
    /// `dim = feature_count + 1` when `intercept` is set, else `feature_count`.
    dim: usize,
    /// `dim x dim`, row-major. Column/row 0 is the intercept when present.
    xtx: Vec<f64>,
    /// `dim x response_count`, row-major.
    xty: Vec<f64>,
    n: i64,
    state: State,
    hyperparameters: CpuHyperparameters,
}

impl PartialModel {
    pub fn new(feature_count: usize, response_count: usize, intercept: bool) -> Self {
        let dim = feature_count + if intercept { 1 } else { 0 };
        Self {
            feature_count,
            response_count,
            intercept,
            dim,
            xtx: vec![0.0; dim * dim],
            xty: vec![0.0; dim * response_count],
            n: 0,
            state: State::Empty,
            hyperparameters: CpuHyperparameters::default(),
        }
    }

    /// Overrides the row-block size [`PartialModel::update`] accumulates in
    /// (`hyperparameters.cpu_macro_block`), in place of the safe default.
    pub fn with_hyperparameters(mut self, hyperparameters: CpuHyperparameters) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn response_count(&self) -> usize {
        self.response_count
    }

    pub fn has_intercept(&self) -> bool {
        self.intercept
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn observation_count(&self) -> i64 {
        self.n
    }

    pub fn xtx(&self) -> &[f64] {
        &self.xtx
    }

    pub fn xty(&self) -> &[f64] {
        &self.xty
    }

    fn check_open(&self) -> DalResult<()> {
        if self.state == State::Finalized {
            return Err(DalError::InvalidArgument(
                "partial model is finalized and cannot accept further updates".into(),
            ));
        }
        Ok(())
    }

    /// Accumulates `X'^T X'` and `X'^T Y` for one row-major block of
    /// observations, prepending an implicit column of ones for the
    /// intercept when configured. `x` has `rows * feature_count` elements,
    /// `y` has `rows * response_count`.
    pub fn update(&mut self, x: &[f64], y: &[f64], rows: usize) -> DalResult<()> {
        self.check_open()?;
        if x.len() != rows * self.feature_count {
            return Err(DalError::InvalidArgument(format!(
                "expected {} values for {rows} rows of {} features, got {}",
                rows * self.feature_count,
                self.feature_count,
                x.len()
            )));
        }
        if y.len() != rows * self.response_count {
            return Err(DalError::InvalidArgument(format!(
                "expected {} values for {rows} rows of {} responses, got {}",
                rows * self.response_count,
                self.response_count,
                y.len()
            )));
        }

        let dim = self.dim;
        let p = self.feature_count;
        let r = self.response_count;
        let mut augmented_row = vec![0.0; dim];

        let block_rows = self.hyperparameters.cpu_macro_block.max(1);
        let mut block_start = 0;
        while block_start < rows {
            let block_end = (block_start + block_rows).min(rows);
            for row in block_start..block_end {
                if self.intercept {
                    augmented_row[0] = 1.0;
                    augmented_row[1..].copy_from_slice(&x[row * p..(row + 1) * p]);
                } else {
                    augmented_row.copy_from_slice(&x[row * p..(row + 1) * p]);
                }
                for a in 0..dim {
                    let xa = augmented_row[a];
                    if xa == 0.0 {
                        continue;
                    }
                    for b in 0..dim {
                        self.xtx[a * dim + b] += xa * augmented_row[b];
                    }
                    for k in 0..r {
                        self.xty[a * r + k] += xa * y[row * r + k];
                    }
                }
            }
            block_start = block_end;
        }

        self.n += rows as i64;
        self.state = State::Accumulating;
        Ok(())
    }

    /// Elementwise-sums `other` into `self`, the non-distributed
    /// counterpart of [`PartialModel::update`]. Both accumulators must
    /// share the same shape and still be open.
    pub fn merge(&mut self, other: &PartialModel) -> DalResult<()> {
        self.check_open()?;
        other.check_open()?;
        if self.dim != other.dim || self.response_count != other.response_count {
            return Err(DalError::InvalidArgument(
                "cannot merge partial models with different shapes".into(),
            ));
        }
        for (a, b) in self.xtx.iter_mut().zip(&other.xtx) {
            *a += b;
        }
        for (a, b) in self.xty.iter_mut().zip(&other.xty) {
            *a += b;
        }
        self.n += other.n;
        if self.state == State::Empty && other.state == State::Accumulating {
            self.state = State::Accumulating;
        }
        Ok(())
    }

    /// Combines partial results gathered from distributed workers via an
    /// allreduce-shaped tree merge. The actual collective transport is an
    /// external collaborator (spec's non-goals exclude a network layer);
    /// this performs the local, transport-independent half of the
    /// contract: reducing already-gathered partials into one.
    pub fn reduce_all(mut parts: Vec<PartialModel>) -> DalResult<PartialModel> {
        if parts.is_empty() {
            return Err(DalError::InvalidArgument(
                "reduce_all requires at least one partial model".into(),
            ));
        }
        let mut acc = parts.remove(0);
        for part in &parts {
            acc.merge(part).map_err(|e| {
                DalError::CollectiveFailed(format!("allreduce merge failed: {e}"))
            })?;
        }
        Ok(acc)
    }

    pub(super) fn mark_finalized(&mut self) {
        self.state = State::Finalized;
    }

    /// Reconstructs an accumulator from its raw, already-validated moments
    /// (spec §4.7 persisted-state layout). Used by deserialization, which
    /// is the only caller expected to have a `dim`/`xtx`/`xty` triple that
    /// didn't come from [`PartialModel::update`]/[`PartialModel::merge`].
    pub(crate) fn from_raw_parts(
        feature_count: usize,
        response_count: usize,
        intercept: bool,
        n: i64,
        xtx: Vec<f64>,
        xty: Vec<f64>,
    ) -> DalResult<Self> {
        let dim = feature_count + if intercept { 1 } else { 0 };
        if xtx.len() != dim * dim {
            return Err(DalError::InvalidArgument(format!(
                "expected {} xtx entries for dim {dim}, got {}",
                dim * dim,
                xtx.len()
            )));
        }
        if xty.len() != dim * response_count {
            return Err(DalError::InvalidArgument(format!(
                "expected {} xty entries, got {}",
                dim * response_count,
                xty.len()
            )));
        }
        Ok(Self {
            feature_count,
            response_count,
            intercept,
            dim,
            xtx,
            xty,
            n,
            state: if n > 0 { State::Accumulating } else { State::Empty },
            hyperparameters: CpuHyperparameters::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accumulator_starts_empty_and_zeroed() {
        let p = PartialModel::new(2, 1, true);
        assert_eq!(p.observation_count(), 0);
        assert!(p.xtx().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn update_accumulates_outer_products_with_intercept_column() {
        let mut p = PartialModel::new(1, 1, true);
        // x = [[1], [2]], y = [[1], [2]]
        p.update(&[1.0, 2.0], &[1.0, 2.0], 2).unwrap();
        // augmented rows: [1,1], [1,2]
        // xtx = [[2,3],[3,5]]
        assert_eq!(p.xtx(), &[2.0, 3.0, 3.0, 5.0]);
        // xty = [[3],[5]]
        assert_eq!(p.xty(), &[3.0, 5.0]);
        assert_eq!(p.observation_count(), 2);
    }

    #[test]
    fn merge_is_equivalent_to_one_big_update() {
        let mut whole = PartialModel::new(1, 1, false);
        whole.update(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0], 3).unwrap();

        let mut a = PartialModel::new(1, 1, false);
        a.update(&[1.0], &[2.0], 1).unwrap();
        let mut b = PartialModel::new(1, 1, false);
        b.update(&[2.0, 3.0], &[4.0, 6.0], 2).unwrap();
        a.merge(&b).unwrap();

        assert_eq!(a.xtx(), whole.xtx());
        assert_eq!(a.xty(), whole.xty());
        assert_eq!(a.observation_count(), whole.observation_count());
    }

    #[test]
    fn reduce_all_matches_pairwise_merge() {
        let mut a = PartialModel::new(1, 1, false);
        a.update(&[1.0], &[2.0], 1).unwrap();
        let mut b = PartialModel::new(1, 1, false);
        b.update(&[2.0], &[4.0], 1).unwrap();
        let mut c = PartialModel::new(1, 1, false);
        c.update(&[3.0], &[6.0], 1).unwrap();

        let combined = PartialModel::reduce_all(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        a.merge(&b).unwrap();
        a.merge(&c).unwrap();
        assert_eq!(combined.xtx(), a.xtx());
        assert_eq!(combined.observation_count(), a.observation_count());
    }

    #[test]
    fn custom_macro_block_does_not_change_the_accumulated_result() {
        let mut default_blocked = PartialModel::new(1, 1, false);
        default_blocked
            .update(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0], 4)
            .unwrap();

        let mut tiny_blocked = PartialModel::new(1, 1, false)
            .with_hyperparameters(CpuHyperparameters { cpu_macro_block: 1, ..CpuHyperparameters::default() });
        tiny_blocked
            .update(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0], 4)
            .unwrap();

        assert_eq!(default_blocked.xtx(), tiny_blocked.xtx());
        assert_eq!(default_blocked.xty(), tiny_blocked.xty());
    }

    #[test]
    fn update_after_finalize_is_an_error() {
        let mut p = PartialModel::new(1, 1, false);
        p.update(&[1.0], &[1.0], 1).unwrap();
        p.mark_finalized();
        assert!(p.update(&[2.0], &[2.0], 1).is_err());
    }
}
