//! Cache-blocked copy-transpose, used to turn a column-major (struct-of-arrays)
//! layout into a row-major one and back. Adapted from the teacher's recursive
//! small-block square transpose (`transpose_in_place_square`): instead of an
//! in-place square permutation keyed off a power-of-two size, this operates
//! out-of-place on arbitrary rectangular extents, which is what the
//! heterogeneous-column pull and the CSR/struct-of-arrays block views need.

const BLOCK: usize = 32;

/// Copies `src`, laid out column-major with `rows` rows and `cols` columns,
/// into `dst`, laid out row-major with the same logical shape.
///
/// `src` must hold exactly `rows * cols` elements; `dst` must hold exactly
/// the same. Blocking keeps both the read stream (down a column) and the
/// write stream (across a row) cache-resident within a `BLOCK x BLOCK` tile
/// before moving to the next tile.
pub fn col_major_to_row_major<T: Copy>(src: &[T], rows: usize, cols: usize, dst: &mut [T]) {
    assert_eq!(src.len(), rows * cols);
    assert_eq!(dst.len(), rows * cols);
    if rows == 0 || cols == 0 {
        return;
    }
    let mut row_block_start = 0;
    while row_block_start < rows {
        let row_block_end = (row_block_start + BLOCK).min(rows);
        let mut col_block_start = 0;
        while col_block_start < cols {
            let col_block_end = (col_block_start + BLOCK).min(cols);
            for c in col_block_start..col_block_end {
                let col_base = c * rows;
                for r in row_block_start..row_block_end {
                    dst[r * cols + c] = src[col_base + r];
                }
            }
            col_block_start = col_block_end;
        }
        row_block_start = row_block_end;
    }
}

/// The inverse of [`col_major_to_row_major`]: row-major `src` into
/// column-major `dst`, used when scattering a write-mode block view's
/// conversion buffer back into struct-of-arrays storage.
pub fn row_major_to_col_major<T: Copy>(src: &[T], rows: usize, cols: usize, dst: &mut [T]) {
    assert_eq!(src.len(), rows * cols);
    assert_eq!(dst.len(), rows * cols);
    if rows == 0 || cols == 0 {
        return;
    }
    let mut row_block_start = 0;
    while row_block_start < rows {
        let row_block_end = (row_block_start + BLOCK).min(rows);
        let mut col_block_start = 0;
        while col_block_start < cols {
            let col_block_end = (col_block_start + BLOCK).min(cols);
            for r in row_block_start..row_block_end {
                let row_base = r * cols;
                for c in col_block_start..col_block_end {
                    dst[c * rows + r] = src[row_base + c];
                }
            }
            col_block_start = col_block_end;
        }
        row_block_start = row_block_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_to_row_matches_naive() {
        // 3 columns of 2 rows each, column-major: col0=[1,2], col1=[3,4], col2=[5,6]
        let src = [1, 2, 3, 4, 5, 6];
        let mut dst = [0; 6];
        col_major_to_row_major(&src, 2, 3, &mut dst);
        // row-major: row0 = [1,3,5], row1 = [2,4,6]
        assert_eq!(dst, [1, 3, 5, 2, 4, 6]);
    }

    #[test]
    fn round_trips_through_both_directions() {
        let rows = 17;
        let cols = 5;
        let src: Vec<i64> = (0..(rows * cols) as i64).collect();
        let mut row_major = vec![0i64; rows * cols];
        col_major_to_row_major(&src, rows, cols, &mut row_major);
        let mut back = vec![0i64; rows * cols];
        row_major_to_col_major(&row_major, rows, cols, &mut back);
        assert_eq!(back, src);
    }

    #[test]
    fn handles_empty_extents() {
        let src: [i32; 0] = [];
        let mut dst: [i32; 0] = [];
        col_major_to_row_major(&src, 0, 0, &mut dst);
    }
}
