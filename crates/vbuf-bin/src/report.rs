//! Plain-text output for the CLI.

use core_model::Document;
use core_state::{Match, SearchProgress};
use std::io::{self, Write};

/// Print `count` lines from `start`, each prefixed with its line number, its
/// first visual row and its wrapped row count.
pub fn write_window(
    out: &mut impl Write,
    doc: &mut Document,
    start: usize,
    count: usize,
) -> io::Result<()> {
    let total = doc.buffer().total();
    let start = start.min(total.saturating_sub(1));
    let end = start.saturating_add(count).min(total);
    doc.remeasure(start..end);
    for line in start..end {
        let row = doc.visual().visual_offset(line);
        let rows = doc.visual().count(line).unwrap_or(1);
        writeln!(
            out,
            "{:>8} {:>8}+{:<3}| {}",
            line + 1,
            row,
            rows,
            doc.buffer().get_line(line)
        )?;
    }
    Ok(())
}

pub fn write_matches(out: &mut impl Write, matches: &[Match]) -> io::Result<()> {
    for m in matches {
        writeln!(out, "{}:{}-{}: {}", m.line + 1, m.start_col + 1, m.end_col + 1, m.text)?;
    }
    writeln!(out, "{} match(es)", matches.len())
}

/// One-line status for a running search, e.g. `searching 40.0% (12 matches)`.
pub fn progress_line(progress: &SearchProgress) -> String {
    let percent = if progress.total == 0 {
        100.0
    } else {
        progress.lines_searched as f64 * 100.0 / progress.total as f64
    };
    format!("searching {percent:>5.1}% ({} matches)", progress.matches)
}

/// Measure every line and print document totals.
pub fn write_stats(out: &mut impl Write, doc: &mut Document) -> io::Result<()> {
    let lines = doc.buffer().total();
    doc.remeasure(0..lines);
    let (bytes, encoding) = doc
        .buffer()
        .index()
        .map(|index| (index.byte_len(), index.encoding().display_name()))
        .unwrap_or((0, "UTF-8"));
    writeln!(out, "lines:        {lines}")?;
    writeln!(out, "bytes:        {bytes}")?;
    writeln!(out, "encoding:     {encoding}")?;
    writeln!(out, "visual rows:  {}", doc.visual().total())
}
