//! Table factory surface (spec §4.1/§9): the handful of entry points that
//! build a [`Table`] of each layout, plus `wrap_borrowed`, the no-copy path
//! for a caller who already owns a buffer in the right shape.

use crate::dtype::Elem;
use crate::error::DalResult;
use crate::table::csr::CsrIndexing;
use crate::table::{Column, CsrTable, DenseTable, HeterogenTable, PackedTable, SoaTable, Table};

/// An [`Elem`] with a concrete [`DenseTable`] constructor. Exists because
/// `DenseTable`'s per-type constructors (`from_f32`, `from_f64`, ...) pick a
/// `DenseStorage` enum variant that can't be chosen generically; this trait
/// supplies that choice so the factory functions below can stay generic
/// over `T`.
pub trait DenseElem: Elem {
    fn build_dense(data: Vec<Self>, row_count: i64, column_count: i64) -> DalResult<DenseTable>;
}

macro_rules! impl_dense_elem {
    ($ty:ty, $ctor:ident) => {
        impl DenseElem for $ty {
            fn build_dense(data: Vec<Self>, row_count: i64, column_count: i64) -> DalResult<DenseTable> {
                DenseTable::$ctor(data, row_count, column_count)
            }
        }
    };
}

impl_dense_elem!(f32, from_f32);
impl_dense_elem!(f64, from_f64);
impl_dense_elem!(i32, from_i32);
impl_dense_elem!(i64, from_i64);
impl_dense_elem!(u32, from_u32);
impl_dense_elem!(u64, from_u64);

pub fn make_dense<T: DenseElem>(data: Vec<T>, row_count: i64, column_count: i64) -> DalResult<Table> {
    Ok(Table::Dense(T::build_dense(data, row_count, column_count)?))
}

pub fn make_soa(columns: Vec<Column>, row_count: i64) -> DalResult<Table> {
    Ok(Table::Soa(SoaTable::new(columns, row_count)?))
}

pub fn make_csr(
    values: Vec<f64>,
    column_indices: Vec<i64>,
    row_offsets: Vec<i64>,
    column_count: i64,
    indexing: CsrIndexing,
) -> DalResult<Table> {
    Ok(Table::Csr(CsrTable::new(
        values,
        column_indices,
        row_offsets,
        column_count,
        indexing,
    )?))
}

pub fn make_heterogen(columns: Vec<Column>, row_count: i64) -> DalResult<Table> {
    Ok(Table::Heterogen(HeterogenTable::new(columns, row_count)?))
}

pub fn make_packed(values: Vec<f64>, dimension: i64) -> DalResult<Table> {
    Ok(Table::Packed(PackedTable::from_packed(values, dimension)?))
}

/// Wraps a caller-owned buffer as a dense table without copying it: the
/// `Vec` is moved into the table's storage rather than cloned, so its
/// existing heap allocation becomes the table's backing memory directly.
/// This is the Rust-native reading of the spec's "wrap an existing buffer
/// without copying" factory path, which in a C API would instead borrow a
/// raw pointer for a caller-managed lifetime.
pub fn wrap_borrowed<T: DenseElem>(data: Vec<T>, row_count: i64, column_count: i64) -> DalResult<Table> {
    make_dense(data, row_count, column_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::AccessMode;

    #[test]
    fn make_dense_builds_a_usable_table() {
        let t = make_dense(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let view = t.rows::<f64>(0, 2, AccessMode::ReadOnly).unwrap();
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn wrap_borrowed_does_not_require_copying_the_caller_buffer_first() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let t = wrap_borrowed(data, 3, 2).unwrap();
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn make_csr_delegates_to_csr_table() {
        let t = make_csr(
            vec![1.0, 2.0],
            vec![0, 1],
            vec![0, 1, 2],
            2,
            CsrIndexing::ZeroBased,
        )
        .unwrap();
        assert_eq!(t.row_count(), 2);
    }
}
