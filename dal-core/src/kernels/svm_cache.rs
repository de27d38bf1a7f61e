//! Working-set kernel cache for SVM training (spec §4.8): a bounded
//! `(2*window, n)` buffer of cached kernel rows, keyed by sample index, with
//! the classic shrinking-cache eviction: when full, the most recently
//! computed half is copied down into the first half and the rest of the
//! cache is freed for the next working set.

use crate::error::{DalError, DalResult};

pub struct WorkingSetCache {
    window: usize,
    n: usize,
    data: Vec<f64>,
    tags: Vec<Option<usize>>,
    filled: usize,
}

impl WorkingSetCache {
    pub fn new(window: usize, n: usize) -> Self {
        Self {
            window,
            n,
            data: vec![0.0; 2 * window * n],
            tags: vec![None; 2 * window],
            filled: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn row_width(&self) -> usize {
        self.n
    }

    pub fn capacity(&self) -> usize {
        2 * self.window
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.capacity()
    }

    /// The cached kernel row for `sample`, if present.
    pub fn find(&self, sample: usize) -> Option<&[f64]> {
        let slot = self.tags.iter().position(|&t| t == Some(sample))?;
        Some(&self.data[slot * self.n..(slot + 1) * self.n])
    }

    /// Appends a freshly computed kernel row for `sample`. Errors if the
    /// cache is already full; callers shrink with [`Self::copy_last_to_first`]
    /// before continuing to insert.
    pub fn push(&mut self, sample: usize, row: &[f64]) -> DalResult<usize> {
        if row.len() != self.n {
            return Err(DalError::InvalidArgument(format!(
                "expected a kernel row of width {}, got {}",
                self.n,
                row.len()
            )));
        }
        if self.is_full() {
            return Err(DalError::InvalidArgument(
                "working-set cache is full; shift it before inserting more rows".into(),
            ));
        }
        let slot = self.filled;
        self.data[slot * self.n..(slot + 1) * self.n].copy_from_slice(row);
        self.tags[slot] = Some(sample);
        self.filled += 1;
        Ok(slot)
    }

    /// Copies the most recently filled `window` entries into the cache's
    /// first half and frees the second half, keeping the working set's most
    /// recent rows resident while making room for the next batch.
    pub fn copy_last_to_first(&mut self) {
        let w = self.window;
        let n = self.n;
        let mut moved_tags = vec![None; w];
        for i in 0..w {
            let src = w + i;
            if src < self.filled {
                let (first, second) = self.data.split_at_mut(w * n);
                first[i * n..(i + 1) * n].copy_from_slice(&second[i * n..(i + 1) * n]);
                moved_tags[i] = self.tags[src];
            }
        }
        for i in 0..w {
            self.tags[i] = moved_tags[i];
        }
        for tag in self.tags.iter_mut().skip(w) {
            *tag = None;
        }
        self.filled = moved_tags.iter().filter(|t| t.is_some()).count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_find_round_trips() {
        let mut cache = WorkingSetCache::new(2, 3);
        cache.push(10, &[1.0, 2.0, 3.0]).unwrap();
        cache.push(11, &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(cache.find(10), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(cache.find(11), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(cache.find(12), None);
    }

    #[test]
    fn push_past_capacity_is_an_error() {
        let mut cache = WorkingSetCache::new(1, 2);
        cache.push(0, &[1.0, 2.0]).unwrap();
        cache.push(1, &[3.0, 4.0]).unwrap();
        assert!(cache.is_full());
        assert!(cache.push(2, &[5.0, 6.0]).is_err());
    }

    #[test]
    fn copy_last_to_first_shifts_the_recent_half_down() {
        let mut cache = WorkingSetCache::new(2, 1);
        cache.push(0, &[10.0]).unwrap();
        cache.push(1, &[11.0]).unwrap();
        cache.push(2, &[12.0]).unwrap();
        cache.push(3, &[13.0]).unwrap();
        assert!(cache.is_full());

        cache.copy_last_to_first();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find(2), Some(&[12.0][..]));
        assert_eq!(cache.find(3), Some(&[13.0][..]));
        assert_eq!(cache.find(0), None);
        assert_eq!(cache.find(1), None);

        // room for two more pushes again
        cache.push(4, &[14.0]).unwrap();
        cache.push(5, &[15.0]).unwrap();
        assert!(cache.is_full());
    }
}
