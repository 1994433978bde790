//! Read-only text storage: memory-mapped line index, encoding detection and
//! the background index worker.

pub mod encoding;
pub mod index;
pub mod worker;

pub use encoding::{Encoding, detect};
pub use index::{
    DEFAULT_PROGRESS_INTERVAL, IndexError, IndexOptions, LineIndex, MappedFile,
};
pub use worker::{IndexEvent, IndexWorker};

/// A position inside a document expressed as (logical line, column). Columns
/// count Unicode scalar values, not bytes, so every column is a valid split
/// point of the decoded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
    pub fn origin() -> Self {
        Self { line: 0, col: 0 }
    }
    pub fn clamp_to<F>(&mut self, line_count: usize, mut line_len_fn: F)
    where
        F: FnMut(usize) -> usize,
    {
        if line_count == 0 {
            self.line = 0;
            self.col = 0;
            return;
        }
        if self.line >= line_count {
            self.line = line_count - 1;
        }
        let max_len = line_len_fn(self.line);
        if self.col > max_len {
            self.col = max_len;
        }
    }
}

/// Column helpers over a single decoded line. Out-of-range columns clamp to
/// the end of the line.
pub mod chars {
    /// Number of columns in `line`.
    pub fn len(line: &str) -> usize {
        line.chars().count()
    }

    /// Byte offset of column `col`.
    pub fn byte_offset(line: &str, col: usize) -> usize {
        line.char_indices()
            .nth(col)
            .map(|(at, _)| at)
            .unwrap_or(line.len())
    }

    /// Column of byte offset `byte`, which must lie on a char boundary.
    pub fn col_of_byte(line: &str, byte: usize) -> usize {
        line[..byte.min(line.len())].chars().count()
    }

    pub fn split_at_col(line: &str, col: usize) -> (&str, &str) {
        line.split_at(byte_offset(line, col))
    }

    /// Text between two columns.
    pub fn slice(line: &str, start: usize, end: usize) -> &str {
        let from = byte_offset(line, start);
        let to = byte_offset(line, end.max(start));
        &line[from..to]
    }

    pub fn char_at(line: &str, col: usize) -> Option<char> {
        line.chars().nth(col)
    }
}
