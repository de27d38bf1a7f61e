//! Packed symmetric/triangular table (spec §4.1 "packed triangular or
//! symmetric"): only the lower triangle (including the diagonal) is stored,
//! row-major within the triangle. Used for the `x'x`/`x'y` accumulator shape
//! the linear-model core produces. Block access always densifies, since
//! every consumer of a packed table in this core (the Cholesky solve) needs
//! a full square view.

use std::rc::Rc;

use crate::dictionary::{Dictionary, FeatureDescriptor};
use crate::dtype::{DataType, Elem};
use crate::error::{DalError, DalResult};
use crate::table::block_view::{AccessMode, BlockView};
use crate::table::Shape;

#[derive(Clone)]
pub struct PackedTable {
    dimension: i64,
    dictionary: Rc<Dictionary>,
    /// `values[row*(row+1)/2 + col]` for `col <= row`.
    values: Vec<f64>,
}

fn packed_index(row: usize, col: usize) -> usize {
    let (row, col) = if col > row { (col, row) } else { (row, col) };
    row * (row + 1) / 2 + col
}

impl PackedTable {
    pub fn from_packed(values: Vec<f64>, dimension: i64) -> DalResult<Self> {
        let expected = (dimension * (dimension + 1) / 2) as usize;
        if values.len() != expected {
            return Err(DalError::InvalidArgument(format!(
                "packed storage for dimension {dimension} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            dimension,
            dictionary: Dictionary::all_equal(FeatureDescriptor::new(DataType::F64)),
            values,
        })
    }

    /// Builds a packed table from a dense square buffer, keeping only the
    /// lower triangle (the caller is responsible for the matrix actually
    /// being symmetric).
    pub fn from_dense_square(dense: &[f64], dimension: i64) -> DalResult<Self> {
        if dense.len() as i64 != dimension * dimension {
            return Err(DalError::InvalidArgument(
                "dense buffer does not match dimension^2".into(),
            ));
        }
        let n = dimension as usize;
        let mut values = Vec::with_capacity(n * (n + 1) / 2);
        for row in 0..n {
            for col in 0..=row {
                values.push(dense[row * n + col]);
            }
        }
        Self::from_packed(values, dimension)
    }

    pub fn shape(&self) -> Shape {
        Shape {
            row_count: self.dimension,
            column_count: self.dimension,
        }
    }

    pub fn dictionary(&self) -> &Rc<Dictionary> {
        &self.dictionary
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[packed_index(row, col)]
    }

    /// Densifies the full square matrix, read-only (packed tables do not
    /// support write-capable views: scattering a dense buffer back would
    /// require deciding which triangle each write came from).
    pub fn rows<T: Elem>(&self, i: i64, n: i64, mode: AccessMode) -> DalResult<BlockView<T>> {
        if mode.is_write_capable() {
            return Err(DalError::UnsupportedOperation(
                "packed tables do not support write-capable block views".into(),
            ));
        }
        if i < 0 || n < 0 {
            return Err(DalError::InvalidArgument("i and n must be non-negative".into()));
        }
        if i >= self.dimension {
            return Ok(BlockView::empty(mode, self.dimension));
        }
        if i + n > self.dimension {
            return Err(DalError::InvalidArgument("row range exceeds dimension".into()));
        }
        let dim = self.dimension as usize;
        let mut data = vec![T::default(); (n * self.dimension) as usize];
        for r in 0..n as usize {
            let row = i as usize + r;
            for col in 0..dim {
                data[r * dim + col] = T::from_pivot(self.get(row, col));
            }
        }
        Ok(BlockView::new(mode, i, n, self.dimension, data, false, None))
    }
}
