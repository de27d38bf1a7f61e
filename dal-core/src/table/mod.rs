//! Polymorphic tabular data plane (spec §4.1).
//!
//! The teacher's field-element hierarchy picks one concrete representation
//! at compile time per build target. A table's *storage layout* is instead a
//! runtime choice — the same logical table might arrive dense, column-major,
//! sparse, or mixed-type — so this models it as a tagged enum over five
//! concrete variants rather than a trait object: each variant exposes the
//! same generic `rows`/`column_values` block-access methods, and [`Table`]
//! forwards to whichever is active. Shared, type-independent behavior
//! (shape, dictionary, layout tag) lives on [`Table`] itself rather than
//! being duplicated per variant.

pub mod block_view;
pub mod csr;
pub mod dense;
pub mod heterogen;
pub mod packed;
pub mod soa;

pub use block_view::{AccessMode, BlockView};
pub use csr::{CsrIndexing, CsrTable};
pub use dense::DenseTable;
pub use heterogen::HeterogenTable;
pub use packed::PackedTable;
pub use soa::{Column, SoaTable};

use std::rc::Rc;

use crate::dictionary::Dictionary;
use crate::dtype::Elem;
use crate::error::DalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub row_count: i64,
    pub column_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    DenseRowMajor,
    StructOfArrays,
    Csr,
    Heterogeneous,
    PackedSymmetric,
}

/// A numeric table in one of five storage layouts, addressed uniformly
/// through the scoped block-access protocol.
#[derive(Clone)]
pub enum Table {
    Dense(DenseTable),
    Soa(SoaTable),
    Csr(CsrTable),
    Heterogen(HeterogenTable),
    Packed(PackedTable),
}

impl Table {
    pub fn layout(&self) -> Layout {
        match self {
            Table::Dense(_) => Layout::DenseRowMajor,
            Table::Soa(_) => Layout::StructOfArrays,
            Table::Csr(_) => Layout::Csr,
            Table::Heterogen(_) => Layout::Heterogeneous,
            Table::Packed(_) => Layout::PackedSymmetric,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Table::Dense(t) => t.shape(),
            Table::Soa(t) => t.shape(),
            Table::Csr(t) => t.shape(),
            Table::Heterogen(t) => t.shape(),
            Table::Packed(t) => t.shape(),
        }
    }

    pub fn row_count(&self) -> i64 {
        self.shape().row_count
    }

    pub fn column_count(&self) -> i64 {
        self.shape().column_count
    }

    pub fn dictionary(&self) -> &Rc<Dictionary> {
        match self {
            Table::Dense(t) => t.dictionary(),
            Table::Soa(t) => t.dictionary(),
            Table::Csr(t) => t.dictionary(),
            Table::Heterogen(t) => t.dictionary(),
            Table::Packed(t) => t.dictionary(),
        }
    }

    pub fn is_all_features_equal(&self) -> bool {
        self.dictionary().is_all_equal()
    }

    /// A contiguous, row-major block of `n` rows starting at `i`, cast to
    /// `T`. An out-of-range start yields an empty view rather than an error
    /// (spec §4.1); an in-range start with an overrunning extent is an
    /// error.
    pub fn rows<T: Elem>(&self, i: i64, n: i64, mode: AccessMode) -> DalResult<BlockView<T>> {
        match self {
            Table::Dense(t) => t.rows(i, n, mode),
            Table::Soa(t) => t.rows(i, n, mode),
            Table::Csr(t) => t.rows(i, n, mode),
            Table::Heterogen(t) => t.rows(i, n, mode),
            Table::Packed(t) => t.rows(i, n, mode),
        }
    }

    /// A single logical column, `n` rows starting at `i`, cast to `T`.
    pub fn column_values<T: Elem>(
        &self,
        col: usize,
        i: i64,
        n: i64,
        mode: AccessMode,
    ) -> DalResult<BlockView<T>> {
        match self {
            Table::Dense(t) => t.column_values(col, i, n, mode),
            Table::Soa(t) => t.column_values(col, i, n, mode),
            Table::Csr(t) => {
                // CSR has no standalone column accessor; the dense row pull
                // and a single-column pick cover every caller in this core.
                let rows = t.rows::<T>(i, n, mode)?;
                let cols = t.shape().column_count as usize;
                if rows.row_count() == 0 {
                    return Ok(BlockView::empty(mode, 1));
                }
                let picked: Vec<T> = rows
                    .as_slice()
                    .chunks_exact(cols)
                    .map(|row| row[col])
                    .collect();
                Ok(BlockView::new(mode, rows.row_offset(), rows.row_count(), 1, picked, false, None))
            }
            Table::Heterogen(t) => t.column_values(col, i, n, mode),
            Table::Packed(t) => {
                let rows = t.rows::<T>(i, n, mode)?;
                let cols = t.shape().column_count as usize;
                if rows.row_count() == 0 {
                    return Ok(BlockView::empty(mode, 1));
                }
                let picked: Vec<T> = rows
                    .as_slice()
                    .chunks_exact(cols)
                    .map(|row| row[col])
                    .collect();
                Ok(BlockView::new(mode, rows.row_offset(), rows.row_count(), 1, picked, false, None))
            }
        }
    }
}

impl From<DenseTable> for Table {
    fn from(t: DenseTable) -> Self {
        Table::Dense(t)
    }
}

impl From<SoaTable> for Table {
    fn from(t: SoaTable) -> Self {
        Table::Soa(t)
    }
}

impl From<CsrTable> for Table {
    fn from(t: CsrTable) -> Self {
        Table::Csr(t)
    }
}

impl From<HeterogenTable> for Table {
    fn from(t: HeterogenTable) -> Self {
        Table::Heterogen(t)
    }
}

impl From<PackedTable> for Table {
    fn from(t: PackedTable) -> Self {
        Table::Packed(t)
    }
}
