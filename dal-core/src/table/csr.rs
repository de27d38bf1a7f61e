//! Compressed sparse row table (spec §4.1 "CSR sparse"). Values and column
//! indices are stored one-based or zero-based according to
//! [`CsrIndexing`]; `row_offsets` always has `row_count + 1` entries.

use std::rc::Rc;

use crate::dictionary::{Dictionary, FeatureDescriptor};
use crate::dtype::{DataType, Elem};
use crate::error::{DalError, DalResult};
use crate::table::block_view::{validate_row_range, AccessMode, BlockView, RowRangeOutcome};
use crate::table::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrIndexing {
    ZeroBased,
    OneBased,
}

impl CsrIndexing {
    fn base(self) -> i64 {
        match self {
            CsrIndexing::ZeroBased => 0,
            CsrIndexing::OneBased => 1,
        }
    }
}

#[derive(Clone)]
pub struct CsrTable {
    shape: Shape,
    dictionary: Rc<Dictionary>,
    values: Vec<f64>,
    column_indices: Vec<i64>,
    row_offsets: Vec<i64>,
    indexing: CsrIndexing,
}

impl CsrTable {
    pub fn new(
        values: Vec<f64>,
        column_indices: Vec<i64>,
        row_offsets: Vec<i64>,
        column_count: i64,
        indexing: CsrIndexing,
    ) -> DalResult<Self> {
        if values.len() != column_indices.len() {
            return Err(DalError::InvalidArgument(
                "values and column_indices must have the same length".into(),
            ));
        }
        if row_offsets.is_empty() {
            return Err(DalError::InvalidArgument(
                "row_offsets must contain at least one entry".into(),
            ));
        }
        let row_count = row_offsets.len() as i64 - 1;
        let base = indexing.base();
        let nnz_from_offsets = row_offsets.last().copied().unwrap_or(base) - base;
        if nnz_from_offsets != values.len() as i64 {
            return Err(DalError::InvalidArgument(format!(
                "row_offsets imply {nnz_from_offsets} nonzeros but {} values were given",
                values.len()
            )));
        }
        Ok(Self {
            shape: Shape {
                row_count,
                column_count,
            },
            dictionary: Dictionary::all_equal(FeatureDescriptor::new(DataType::F64)),
            values,
            column_indices,
            row_offsets,
            indexing,
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn dictionary(&self) -> &Rc<Dictionary> {
        &self.dictionary
    }

    pub fn indexing(&self) -> CsrIndexing {
        self.indexing
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Raw nonzero values in the row range `[i, i+n)`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn column_indices(&self) -> &[i64] {
        &self.column_indices
    }

    pub fn row_offsets(&self) -> &[i64] {
        &self.row_offsets
    }

    /// Rebases `row_offsets` to `indexing` on demand (spec §4.1's
    /// `one_based_row_indices` flag): adds the difference between the
    /// requested and stored base to every entry, without mutating the
    /// table's own stored indexing.
    pub fn row_offsets_with_indexing(&self, indexing: CsrIndexing) -> Vec<i64> {
        let shift = indexing.base() - self.indexing.base();
        if shift == 0 {
            self.row_offsets.clone()
        } else {
            self.row_offsets.iter().map(|&v| v + shift).collect()
        }
    }

    /// Dense pull of the row range `[i, i+n)`: zero-fills the block and
    /// scatters each row's nonzeros into it.
    pub fn rows<T: Elem>(&self, i: i64, n: i64, mode: AccessMode) -> DalResult<BlockView<T>> {
        let col_count = self.shape.column_count;
        match validate_row_range(i, n, self.shape.row_count)? {
            RowRangeOutcome::Empty => Ok(BlockView::empty(mode, col_count)),
            RowRangeOutcome::Range { start, len } => {
                let mut data = vec![T::default(); (len * col_count) as usize];
                if mode.is_read_capable() {
                    let base = self.indexing.base();
                    for r in 0..len {
                        let row = (start + r) as usize;
                        let lo = (self.row_offsets[row] - base) as usize;
                        let hi = (self.row_offsets[row + 1] - base) as usize;
                        for k in lo..hi {
                            let col = (self.column_indices[k] - base) as usize;
                            data[(r as usize) * col_count as usize + col] =
                                T::from_pivot(self.values[k]);
                        }
                    }
                }
                // CSR block views never write back: mutating a sparse
                // structure through a dense scratch buffer would silently
                // discard sparsity, so write-capable acquisition is refused.
                if mode.is_write_capable() {
                    return Err(DalError::UnsupportedOperation(
                        "CSR tables do not support write-capable block views".into(),
                    ));
                }
                Ok(BlockView::new(mode, start, len, col_count, data, false, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsrTable {
        // [[1, 0, 2], [0, 0, 0], [0, 3, 0]]
        CsrTable::new(
            vec![1.0, 2.0, 3.0],
            vec![0, 2, 1],
            vec![0, 2, 2, 3],
            3,
            CsrIndexing::ZeroBased,
        )
        .unwrap()
    }

    #[test]
    fn dense_pull_reconstructs_matrix() {
        let t = sample();
        let view = t.rows::<f64>(0, 3, AccessMode::ReadOnly).unwrap();
        assert_eq!(
            view.as_slice(),
            &[1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0]
        );
    }

    #[test]
    fn one_based_indexing_is_honored() {
        let t = CsrTable::new(
            vec![1.0, 2.0, 3.0],
            vec![1, 3, 2],
            vec![1, 3, 3, 4],
            3,
            CsrIndexing::OneBased,
        )
        .unwrap();
        let view = t.rows::<f64>(0, 3, AccessMode::ReadOnly).unwrap();
        assert_eq!(
            view.as_slice(),
            &[1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0]
        );
    }

    #[test]
    fn mismatched_row_offsets_is_an_error() {
        assert!(CsrTable::new(vec![1.0], vec![0], vec![0, 2], 3, CsrIndexing::ZeroBased).is_err());
    }

    #[test]
    fn write_capable_acquisition_is_rejected() {
        let t = sample();
        assert!(t.rows::<f64>(0, 3, AccessMode::ReadWrite).is_err());
    }

    #[test]
    fn row_offsets_with_indexing_rebases_without_mutating_storage() {
        let t = sample();
        assert_eq!(t.row_offsets(), &[0, 2, 2, 3]);
        assert_eq!(
            t.row_offsets_with_indexing(CsrIndexing::OneBased),
            vec![1, 3, 3, 4]
        );
        // Requesting the table's own indexing is a no-op rebase.
        assert_eq!(
            t.row_offsets_with_indexing(CsrIndexing::ZeroBased),
            t.row_offsets()
        );
        assert_eq!(t.row_offsets(), &[0, 2, 2, 3]);
    }

    #[test]
    fn row_offsets_with_indexing_on_one_based_table_can_rebase_back_to_zero() {
        let t = CsrTable::new(
            vec![1.0, 2.0, 3.0],
            vec![1, 3, 2],
            vec![1, 3, 3, 4],
            3,
            CsrIndexing::OneBased,
        )
        .unwrap();
        assert_eq!(
            t.row_offsets_with_indexing(CsrIndexing::ZeroBased),
            vec![0, 2, 2, 3]
        );
    }
}
