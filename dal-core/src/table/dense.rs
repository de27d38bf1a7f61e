//! Dense row-major homogeneous table (spec §4.1 "dense row-major").
//!
//! Storage is a single flat buffer shared by `Rc<RefCell<..>>` so that
//! released, write-capable block views can scatter back without the table
//! itself needing a borrow with an explicit lifetime — the same trade the
//! teacher's `util/src/matrix.rs` raw-buffer `Matrix` makes, done here with a
//! safe reference-counted cell instead of a raw pointer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dictionary::{Dictionary, FeatureDescriptor};
use crate::dtype::{DataType, Elem};
use crate::error::{DalError, DalResult};
use crate::table::block_view::{validate_row_range, AccessMode, BlockView, RowRangeOutcome};
use crate::table::Shape;

macro_rules! dense_storage {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        #[derive(Clone)]
        enum DenseStorage {
            $($variant(Rc<RefCell<Vec<$ty>>>)),+
        }

        impl DenseStorage {
            fn dtype(&self) -> DataType {
                match self {
                    $(DenseStorage::$variant(_) => <$ty as Elem>::DTYPE),+
                }
            }

            fn len(&self) -> usize {
                match self {
                    $(DenseStorage::$variant(b) => b.borrow().len()),+
                }
            }

            fn rows<T: Elem>(
                &self,
                row_offset: i64,
                row_len: i64,
                col_count: i64,
                mode: AccessMode,
            ) -> BlockView<T> {
                match self {
                    $(DenseStorage::$variant(buf) => {
                        rows_generic::<$ty, T>(buf, row_offset, row_len, col_count, mode)
                    }),+
                }
            }
        }
    };
}

dense_storage!(F32(f32), F64(f64), I32(i32), I64(i64), U32(u32), U64(u64));

fn rows_generic<T0: Elem, T: Elem>(
    buf: &Rc<RefCell<Vec<T0>>>,
    row_offset: i64,
    row_len: i64,
    col_count: i64,
    mode: AccessMode,
) -> BlockView<T> {
    let start = (row_offset * col_count) as usize;
    let len = (row_len * col_count) as usize;
    let data: Vec<T> = if mode.is_read_capable() {
        let stored = buf.borrow();
        stored[start..start + len]
            .iter()
            .map(|&v| T::from_pivot(v.to_pivot()))
            .collect()
    } else {
        vec![T::default(); len]
    };
    let is_direct = T::DTYPE == T0::DTYPE;
    let writeback: Option<Box<dyn FnMut(&[T])>> = if mode.is_write_capable() {
        let buf = Rc::clone(buf);
        Some(Box::new(move |data: &[T]| {
            let mut stored = buf.borrow_mut();
            for (dst, &src) in stored[start..start + len].iter_mut().zip(data) {
                *dst = T0::from_pivot(src.to_pivot());
            }
        }))
    } else {
        None
    };
    BlockView::new(mode, row_offset, row_len, col_count, data, is_direct, writeback)
}

/// Dense row-major table: one element type shared by every column.
#[derive(Clone)]
pub struct DenseTable {
    shape: Shape,
    dictionary: Rc<Dictionary>,
    storage: DenseStorage,
}

macro_rules! ctor {
    ($name:ident, $ty:ty, $variant:ident) => {
        pub fn $name(data: Vec<$ty>, row_count: i64, column_count: i64) -> DalResult<Self> {
            if row_count < 0 || column_count < 0 {
                return Err(DalError::InvalidArgument(
                    "row_count and column_count must be non-negative".into(),
                ));
            }
            if data.len() as i64 != row_count * column_count {
                return Err(DalError::InvalidArgument(format!(
                    "expected {} elements for a {row_count}x{column_count} table, got {}",
                    row_count * column_count,
                    data.len()
                )));
            }
            let dictionary = Dictionary::all_equal(FeatureDescriptor::new(<$ty as Elem>::DTYPE));
            Ok(Self {
                shape: Shape {
                    row_count,
                    column_count,
                },
                dictionary,
                storage: DenseStorage::$variant(Rc::new(RefCell::new(data))),
            })
        }
    };
}

impl DenseTable {
    ctor!(from_f32, f32, F32);
    ctor!(from_f64, f64, F64);
    ctor!(from_i32, i32, I32);
    ctor!(from_i64, i64, I64);
    ctor!(from_u32, u32, U32);
    ctor!(from_u64, u64, U64);

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn dictionary(&self) -> &Rc<Dictionary> {
        &self.dictionary
    }

    pub fn stored_dtype(&self) -> DataType {
        self.storage.dtype()
    }

    pub fn rows<T: Elem>(&self, i: i64, n: i64, mode: AccessMode) -> DalResult<BlockView<T>> {
        match validate_row_range(i, n, self.shape.row_count)? {
            RowRangeOutcome::Empty => Ok(BlockView::empty(mode, self.shape.column_count)),
            RowRangeOutcome::Range { start, len } => {
                Ok(self.storage.rows(start, len, self.shape.column_count, mode))
            }
        }
    }

    /// A single logical column, as a `(row_count, 1)` block view.
    pub fn column_values<T: Elem>(
        &self,
        col: usize,
        i: i64,
        n: i64,
        mode: AccessMode,
    ) -> DalResult<BlockView<T>> {
        if col as i64 >= self.shape.column_count {
            return Err(DalError::InvalidArgument(format!(
                "column {col} out of range for a table with {} columns",
                self.shape.column_count
            )));
        }
        let rows = self.rows::<T>(i, n, mode)?;
        if rows.row_count() == 0 {
            return Ok(BlockView::empty(mode, 1));
        }
        let col_count = self.shape.column_count;
        let picked: Vec<T> = rows
            .as_slice()
            .chunks_exact(col_count as usize)
            .map(|row| row[col])
            .collect();
        Ok(BlockView::new(
            mode,
            rows.row_offset(),
            rows.row_count(),
            1,
            picked,
            false,
            None,
        ))
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_read_back_values_directly_typed() {
        let t = DenseTable::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap();
        let view = t.rows::<f64>(0, 3, AccessMode::ReadOnly).unwrap();
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(view.is_direct());
    }

    #[test]
    fn rows_cast_across_types() {
        let t = DenseTable::from_i32(vec![1, 2, 3, 4], 2, 2).unwrap();
        let view = t.rows::<f64>(0, 2, AccessMode::ReadOnly).unwrap();
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(!view.is_direct());
    }

    #[test]
    fn out_of_range_start_returns_empty_view_not_error() {
        let t = DenseTable::from_f64(vec![1.0, 2.0], 2, 1).unwrap();
        let view = t.rows::<f64>(5, 3, AccessMode::ReadOnly).unwrap();
        assert_eq!(view.row_count(), 0);
    }

    #[test]
    fn overrunning_range_within_bounds_is_an_error() {
        let t = DenseTable::from_f64(vec![1.0, 2.0], 2, 1).unwrap();
        assert!(t.rows::<f64>(1, 5, AccessMode::ReadOnly).is_err());
    }

    #[test]
    fn read_write_view_scatters_back_on_drop() {
        let t = DenseTable::from_f64(vec![0.0; 4], 2, 2).unwrap();
        {
            let mut view = t.rows::<f64>(0, 2, AccessMode::ReadWrite).unwrap();
            view.as_mut_slice().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        }
        let view = t.rows::<f64>(0, 2, AccessMode::ReadOnly).unwrap();
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn column_values_picks_single_column() {
        let t = DenseTable::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap();
        let col = t.column_values::<f64>(1, 0, 3, AccessMode::ReadOnly).unwrap();
        assert_eq!(col.as_slice(), &[2.0, 4.0, 6.0]);
    }
}
