//! Logical line → wrapped row bookkeeping.
//!
//! Every logical line owns a row count (how many screen rows it wraps into).
//! Counts are stored as `u8` and split into fixed-size chunks whose sums are
//! cached, so converting between logical and visual coordinates touches at
//! most `len / chunk_size` sums plus one chunk of counts.
//!
//! Invariants (must hold after every public call):
//! * every count is in `1..=MAX_ROWS`; longer wraps are capped, the renderer
//!   scrolls within the line.
//! * `chunk_sums[i]` equals the sum of chunk `i`.
//! * `total` equals the sum of all counts.
//!
//! `update` keeps the sums exact in O(1). `insert` / `delete` splice the
//! counts and rebuild every sum in one pass.

use tracing::trace;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Cap on rows per logical line.
pub const MAX_ROWS: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualLineIndex {
    counts: Vec<u8>,
    chunk_size: usize,
    chunk_sums: Vec<usize>,
    total: usize,
}

fn clamp_rows(rows: usize) -> u8 {
    rows.clamp(1, MAX_ROWS as usize) as u8
}

impl VisualLineIndex {
    /// `lines` logical lines of one row each.
    pub fn new(lines: usize) -> Self {
        Self::with_chunk_size(lines, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(lines: usize, chunk_size: usize) -> Self {
        let mut index = Self {
            counts: vec![1; lines],
            chunk_size: chunk_size.max(1),
            chunk_sums: Vec::new(),
            total: 0,
        };
        index.rebuild_chunks();
        index
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Row count of `line`, if it exists.
    pub fn count(&self, line: usize) -> Option<u8> {
        self.counts.get(line).copied()
    }

    /// Reset to `lines` single-row lines.
    pub fn reset(&mut self, lines: usize) {
        self.counts.clear();
        self.counts.resize(lines, 1);
        self.rebuild_chunks();
    }

    /// Set the row count of one line. Out-of-range lines are ignored.
    /// Returns true when the count changed.
    pub fn update(&mut self, line: usize, rows: usize) -> bool {
        let Some(slot) = self.counts.get_mut(line) else {
            return false;
        };
        let rows = clamp_rows(rows);
        let old = *slot;
        if old == rows {
            return false;
        }
        *slot = rows;
        let chunk = line / self.chunk_size;
        self.chunk_sums[chunk] = self.chunk_sums[chunk] - old as usize + rows as usize;
        self.total = self.total - old as usize + rows as usize;
        trace!(target: "model.visual", line, old, rows, total = self.total, "rows_updated");
        true
    }

    /// Insert `n` lines of `rows` rows each before `at` (appends past the end).
    pub fn insert(&mut self, at: usize, n: usize, rows: usize) {
        if n == 0 {
            return;
        }
        let at = at.min(self.counts.len());
        let rows = clamp_rows(rows);
        self.counts
            .splice(at..at, std::iter::repeat_n(rows, n));
        self.rebuild_chunks();
        trace!(target: "model.visual", at, n, total = self.total, "lines_inserted");
    }

    /// Remove up to `n` lines starting at `at`.
    pub fn delete(&mut self, at: usize, n: usize) {
        if n == 0 || at >= self.counts.len() {
            return;
        }
        let end = (at + n).min(self.counts.len());
        self.counts.drain(at..end);
        self.rebuild_chunks();
        trace!(target: "model.visual", at, n = end - at, total = self.total, "lines_deleted");
    }

    /// First visual row of `line`. Lines at or past the end map to `total()`.
    pub fn visual_offset(&self, line: usize) -> usize {
        if line == 0 {
            return 0;
        }
        if line >= self.counts.len() {
            return self.total;
        }
        let chunk = line / self.chunk_size;
        let before: usize = self.chunk_sums[..chunk].iter().sum();
        let within: usize = self.counts[chunk * self.chunk_size..line]
            .iter()
            .map(|c| *c as usize)
            .sum();
        before + within
    }

    /// `(line, row within line)` for visual row `visual`. Rows past the end
    /// resolve to the last row of the last line.
    pub fn logical_position(&self, visual: usize) -> (usize, usize) {
        let Some(last) = self.counts.last() else {
            return (0, 0);
        };
        if visual >= self.total {
            return (self.counts.len() - 1, *last as usize - 1);
        }
        let mut seen = 0;
        let mut chunk = 0;
        for sum in &self.chunk_sums {
            if seen + sum > visual {
                break;
            }
            seen += sum;
            chunk += 1;
        }
        let start = chunk * self.chunk_size;
        let end = (start + self.chunk_size).min(self.counts.len());
        for line in start..end {
            let rows = self.counts[line] as usize;
            if seen + rows > visual {
                return (line, visual - seen);
            }
            seen += rows;
        }
        (self.counts.len() - 1, 0)
    }

    fn rebuild_chunks(&mut self) {
        self.chunk_sums = self
            .counts
            .chunks(self.chunk_size)
            .map(|chunk| chunk.iter().map(|c| *c as usize).sum())
            .collect();
        self.total = self.chunk_sums.iter().sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_index_is_one_row_per_line() {
        let vm = VisualLineIndex::new(100);
        assert_eq!(vm.total(), 100);
        assert_eq!(vm.visual_offset(50), 50);
    }

    #[test]
    fn update_moves_following_offsets() {
        let mut vm = VisualLineIndex::new(10);
        assert_eq!(vm.visual_offset(5), 5);
        assert!(vm.update(5, 3));
        assert_eq!(vm.total(), 12);
        assert_eq!(vm.visual_offset(5), 5);
        assert_eq!(vm.visual_offset(6), 8);
        assert!(!vm.update(5, 3));
        assert!(!vm.update(10, 2));
    }

    #[test]
    fn counts_are_clamped() {
        let mut vm = VisualLineIndex::new(2);
        vm.update(0, 0);
        vm.update(1, 1000);
        assert_eq!(vm.count(0), Some(1));
        assert_eq!(vm.count(1), Some(MAX_ROWS));
        assert_eq!(vm.total(), 256);
    }

    #[test]
    fn insert_shifts_wrapped_line() {
        let mut vm = VisualLineIndex::new(10);
        vm.update(5, 3);
        vm.insert(5, 2, 1);
        assert_eq!(vm.total(), 14);
        assert_eq!(vm.count(7), Some(3));
        assert_eq!(vm.count(5), Some(1));
        assert_eq!(vm.count(6), Some(1));
        vm.insert(99, 1, 4);
        assert_eq!(vm.len(), 13);
        assert_eq!(vm.count(12), Some(4));
    }

    #[test]
    fn delete_removes_wrapped_line() {
        let mut vm = VisualLineIndex::new(10);
        vm.update(5, 3);
        vm.delete(4, 2);
        assert_eq!(vm.total(), 8);
        assert_eq!(vm.len(), 8);
        vm.delete(7, 10);
        assert_eq!(vm.len(), 7);
    }

    #[test]
    fn logical_position_walks_rows() {
        let mut vm = VisualLineIndex::new(5);
        vm.update(0, 2);
        vm.update(2, 3);
        assert_eq!(vm.logical_position(0), (0, 0));
        assert_eq!(vm.logical_position(1), (0, 1));
        assert_eq!(vm.logical_position(2), (1, 0));
        assert_eq!(vm.logical_position(3), (2, 0));
        assert_eq!(vm.logical_position(5), (2, 2));
        assert_eq!(vm.logical_position(6), (3, 0));
        assert_eq!(vm.logical_position(100), (4, 0));
    }

    #[test]
    fn small_chunks_agree_with_large() {
        let mut small = VisualLineIndex::with_chunk_size(50, 3);
        let mut large = VisualLineIndex::new(50);
        for line in (0..50).step_by(7) {
            small.update(line, line % 5 + 1);
            large.update(line, line % 5 + 1);
        }
        small.delete(10, 4);
        large.delete(10, 4);
        small.insert(2, 3, 2);
        large.insert(2, 3, 2);
        assert_eq!(small.total(), large.total());
        for line in 0..small.len() {
            assert_eq!(small.visual_offset(line), large.visual_offset(line));
        }
        for row in 0..small.total() {
            assert_eq!(small.logical_position(row), large.logical_position(row));
        }
    }

    #[test]
    fn empty_index_maps_to_origin() {
        let vm = VisualLineIndex::new(0);
        assert_eq!(vm.total(), 0);
        assert_eq!(vm.visual_offset(3), 0);
        assert_eq!(vm.logical_position(0), (0, 0));
    }
}
