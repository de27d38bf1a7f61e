//! Scoped block-access protocol (spec §4.1).
//!
//! A [`BlockView`] is materialized eagerly at acquire time (read modes copy
//! and cast the requested range out of storage; `write_only` starts from a
//! default-filled buffer) and, in a write-capable mode, scatters its buffer
//! back into storage exactly once when dropped. This trades the spec's
//! literal "direct pointer into storage when types match" optimization for
//! an implementation that never needs `unsafe` lifetime extension across the
//! table's tagged-variant dispatch; [`BlockView::is_direct`] still reports
//! whether the stored representation matched the requested one bit-for-bit,
//! which is what callers actually use the distinction for (recognizing a
//! pass-through vs. a casting conversion).

use crate::dtype::Elem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

impl AccessMode {
    pub fn is_write_capable(self) -> bool {
        matches!(self, AccessMode::ReadWrite | AccessMode::WriteOnly)
    }

    pub fn is_read_capable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }
}

/// A scoped, possibly-converted contiguous window over a table. Released
/// (and, if write-capable, scattered back into storage) on drop.
pub struct BlockView<T> {
    mode: AccessMode,
    row_offset: i64,
    row_count: i64,
    col_count: i64,
    data: Vec<T>,
    is_direct: bool,
    writeback: Option<Box<dyn FnMut(&[T])>>,
}

impl<T: Elem> BlockView<T> {
    /// A zero-row view for the "`i >= row_count`" case, which is a valid
    /// empty result rather than an error (spec §4.1).
    pub fn empty(mode: AccessMode, col_count: i64) -> Self {
        Self {
            mode,
            row_offset: 0,
            row_count: 0,
            col_count,
            data: Vec::new(),
            is_direct: false,
            writeback: None,
        }
    }

    pub(crate) fn new(
        mode: AccessMode,
        row_offset: i64,
        row_count: i64,
        col_count: i64,
        data: Vec<T>,
        is_direct: bool,
        writeback: Option<Box<dyn FnMut(&[T])>>,
    ) -> Self {
        debug_assert_eq!(data.len() as i64, row_count * col_count);
        Self {
            mode,
            row_offset,
            row_count,
            col_count,
            data,
            is_direct,
            writeback,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn row_offset(&self) -> i64 {
        self.row_offset
    }

    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    pub fn col_count(&self) -> i64 {
        self.col_count
    }

    pub fn is_direct(&self) -> bool {
        self.is_direct
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for BlockView<T> {
    fn drop(&mut self) {
        if self.mode.is_write_capable() {
            if let Some(mut writeback) = self.writeback.take() {
                writeback(&self.data);
            }
        }
    }
}

/// Outcome of validating a requested row range against a table's row count
/// (spec §4.1: out-of-range start is an empty view, not an error).
pub(crate) enum RowRangeOutcome {
    Empty,
    Range { start: i64, len: i64 },
}

pub(crate) fn validate_row_range(
    i: i64,
    n: i64,
    row_count: i64,
) -> Result<RowRangeOutcome, crate::error::DalError> {
    if i < 0 || n < 0 {
        return Err(crate::error::DalError::InvalidArgument(format!(
            "row range start/len must be non-negative, got i={i}, n={n}"
        )));
    }
    if i >= row_count {
        return Ok(RowRangeOutcome::Empty);
    }
    if i + n > row_count {
        return Err(crate::error::DalError::InvalidArgument(format!(
            "row range [{i}, {}) exceeds row_count {row_count}",
            i + n
        )));
    }
    Ok(RowRangeOutcome::Range { start: i, len: n })
}
