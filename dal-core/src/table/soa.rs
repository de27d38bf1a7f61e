//! Struct-of-arrays table: one independently-typed buffer per column
//! (spec §4.1 "struct-of-arrays"). Column access is a direct slice of the
//! owning buffer; row access must interleave across columns and always goes
//! through the pivot cast, since a row spans more than one element type.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dictionary::{Dictionary, FeatureDescriptor};
use crate::dtype::{DataType, Elem};
use crate::error::{DalError, DalResult};
use crate::table::block_view::{validate_row_range, AccessMode, BlockView, RowRangeOutcome};
use crate::table::Shape;

macro_rules! column_buf {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        #[derive(Clone)]
        enum ColumnBuf {
            $($variant(Rc<RefCell<Vec<$ty>>>)),+
        }

        impl ColumnBuf {
            fn dtype(&self) -> DataType {
                match self {
                    $(ColumnBuf::$variant(_) => <$ty as Elem>::DTYPE),+
                }
            }

            fn read_into<T: Elem>(&self, start: usize, len: usize, out: &mut [T]) {
                match self {
                    $(ColumnBuf::$variant(buf) => {
                        let stored = buf.borrow();
                        for (dst, &src) in out.iter_mut().zip(&stored[start..start + len]) {
                            *dst = T::from_pivot(src.to_pivot());
                        }
                    }),+
                }
            }

            fn write_back<T: Elem>(&self, start: usize, data: &[T]) {
                match self {
                    $(ColumnBuf::$variant(buf) => {
                        let mut stored = buf.borrow_mut();
                        for (dst, &src) in stored[start..start + data.len()].iter_mut().zip(data) {
                            *dst = <$ty as Elem>::from_pivot(src.to_pivot());
                        }
                    }),+
                }
            }
        }
    };
}

column_buf!(F32(f32), F64(f64), I32(i32), I64(i64), U32(u32), U64(u64));

macro_rules! column_ctor {
    ($name:ident, $ty:ty, $variant:ident) => {
        pub fn $name(data: Vec<$ty>) -> Self {
            Self(ColumnBuf::$variant(Rc::new(RefCell::new(data))))
        }
    };
}

/// One independently-typed column buffer, ready to be installed into a
/// [`SoaTable`].
#[derive(Clone)]
pub struct Column(ColumnBuf);

impl Column {
    column_ctor!(from_f32, f32, F32);
    column_ctor!(from_f64, f64, F64);
    column_ctor!(from_i32, i32, I32);
    column_ctor!(from_i64, i64, I64);
    column_ctor!(from_u32, u32, U32);
    column_ctor!(from_u64, u64, U64);

    pub fn dtype(&self) -> DataType {
        self.0.dtype()
    }

    pub fn read_into<T: Elem>(&self, start: usize, len: usize, out: &mut [T]) {
        self.0.read_into(start, len, out)
    }

    pub fn write_back<T: Elem>(&self, start: usize, data: &[T]) {
        self.0.write_back(start, data)
    }
}

#[derive(Clone)]
pub struct SoaTable {
    shape: Shape,
    dictionary: Rc<Dictionary>,
    columns: Vec<ColumnBuf>,
}

impl SoaTable {
    pub fn new(columns: Vec<Column>, row_count: i64) -> DalResult<Self> {
        if row_count < 0 {
            return Err(DalError::InvalidArgument("row_count must be non-negative".into()));
        }
        let descriptors = columns
            .iter()
            .map(|c| FeatureDescriptor::new(c.0.dtype()))
            .collect();
        let bufs: Vec<ColumnBuf> = columns.into_iter().map(|c| c.0).collect();
        Ok(Self {
            shape: Shape {
                row_count,
                column_count: bufs.len() as i64,
            },
            dictionary: Dictionary::per_column(descriptors),
            columns: bufs,
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn dictionary(&self) -> &Rc<Dictionary> {
        &self.dictionary
    }

    pub fn column_values<T: Elem>(
        &self,
        col: usize,
        i: i64,
        n: i64,
        mode: AccessMode,
    ) -> DalResult<BlockView<T>> {
        let buf = self
            .columns
            .get(col)
            .ok_or_else(|| DalError::InvalidArgument(format!("column {col} out of range")))?;
        match validate_row_range(i, n, self.shape.row_count)? {
            RowRangeOutcome::Empty => Ok(BlockView::empty(mode, 1)),
            RowRangeOutcome::Range { start, len } => {
                let mut data = vec![T::default(); len as usize];
                if mode.is_read_capable() {
                    buf.read_into(start as usize, len as usize, &mut data);
                }
                let is_direct = T::DTYPE == buf.dtype();
                let writeback: Option<Box<dyn FnMut(&[T])>> = if mode.is_write_capable() {
                    let buf = buf.clone();
                    let start = start as usize;
                    Some(Box::new(move |data: &[T]| buf.write_back(start, data)))
                } else {
                    None
                };
                Ok(BlockView::new(mode, start, len, 1, data, is_direct, writeback))
            }
        }
    }

    /// Row-major pull across every column, interleaved and cast to `T`
    /// (always a conversion, since a row spans more than one stored type).
    pub fn rows<T: Elem>(&self, i: i64, n: i64, mode: AccessMode) -> DalResult<BlockView<T>> {
        let col_count = self.shape.column_count as usize;
        match validate_row_range(i, n, self.shape.row_count)? {
            RowRangeOutcome::Empty => Ok(BlockView::empty(mode, self.shape.column_count)),
            RowRangeOutcome::Range { start, len } => {
                let mut data = vec![T::default(); len as usize * col_count];
                if mode.is_read_capable() {
                    let mut column_buf = vec![T::default(); len as usize];
                    for (c, buf) in self.columns.iter().enumerate() {
                        buf.read_into(start as usize, len as usize, &mut column_buf);
                        for r in 0..len as usize {
                            data[r * col_count + c] = column_buf[r];
                        }
                    }
                }
                let writeback: Option<Box<dyn FnMut(&[T])>> = if mode.is_write_capable() {
                    let columns = self.columns.clone();
                    let start = start as usize;
                    let len = len as usize;
                    Some(Box::new(move |data: &[T]| {
                        let mut column_buf = vec![T::default(); len];
                        for (c, buf) in columns.iter().enumerate() {
                            for r in 0..len {
                                column_buf[r] = data[r * col_count + c];
                            }
                            buf.write_back(start, &column_buf);
                        }
                    }))
                } else {
                    None
                };
                Ok(BlockView::new(
                    mode,
                    start,
                    len,
                    self.shape.column_count,
                    data,
                    false,
                    writeback,
                ))
            }
        }
    }
}
