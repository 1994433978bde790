//! Row measurement for the visual index.
//!
//! Real pixel layout belongs to the renderer; the document only needs a row
//! count per line to keep `VisualLineIndex` current after edits.

use unicode_width::UnicodeWidthChar;

/// Columns a tab advances in `FixedColumns`.
pub const TAB_COLUMNS: usize = 4;

pub trait WrapMeasure: Send {
    /// Screen rows `line` occupies; at least 1.
    fn rows(&self, line: &str) -> usize;
}

/// Every line is one row.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWrap;

impl WrapMeasure for NoWrap {
    fn rows(&self, _line: &str) -> usize {
        1
    }
}

/// Greedy wrap at a fixed cell width, counting East Asian wide characters as
/// two cells. A wide character never straddles a row boundary.
#[derive(Debug, Clone, Copy)]
pub struct FixedColumns {
    columns: usize,
}

impl FixedColumns {
    pub fn new(columns: usize) -> Self {
        Self {
            columns: columns.max(1),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
}

impl WrapMeasure for FixedColumns {
    fn rows(&self, line: &str) -> usize {
        let mut rows = 1;
        let mut col = 0;
        for ch in line.chars() {
            let width = if ch == '\t' {
                TAB_COLUMNS
            } else {
                ch.width().unwrap_or(0)
            };
            if width == 0 {
                continue;
            }
            if col > 0 && col + width > self.columns {
                rows += 1;
                col = 0;
            }
            col += width;
        }
        rows
    }
}
