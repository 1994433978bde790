//! Sparse edit overlay over an immutable line index.
//!
//! Two structures describe how the logical document differs from the file:
//!
//! * `entries`: one tagged override per logical line that no longer reads
//!   straight from the index (`Modified`, `Inserted`, `Tombstoned`).
//! * `breaks`: ordered `(at, shift)` pairs. A logical line without an entry
//!   reads physical line `line - shift`, `shift` being the value of the last
//!   break at or before it.
//!
//! Structural edits (`open_gap` / `close_gap`) renumber entries and move
//! breaks in the same step, so both always agree on where a physical line
//! landed.

use std::collections::BTreeMap;

/// Override for a single logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEntry {
    /// A file line whose text was edited.
    Modified(String),
    /// A line with no physical counterpart.
    Inserted(String),
    /// A file line whose entire content was removed; reads as empty.
    Tombstoned,
}

impl LineEntry {
    pub fn text(&self) -> &str {
        match self {
            LineEntry::Modified(text) | LineEntry::Inserted(text) => text,
            LineEntry::Tombstoned => "",
        }
    }
}

/// Cumulative logical-minus-physical shift starting at logical line `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftBreak {
    pub at: usize,
    pub shift: isize,
}

#[derive(Debug, Clone, Default)]
pub struct Overlay {
    entries: BTreeMap<usize, LineEntry>,
    breaks: Vec<ShiftBreak>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.breaks.is_empty()
    }

    pub fn entry(&self, line: usize) -> Option<&LineEntry> {
        self.entries.get(&line)
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &LineEntry)> {
        self.entries.iter().map(|(line, entry)| (*line, entry))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn breaks(&self) -> &[ShiftBreak] {
        &self.breaks
    }

    /// Shift in effect at `line`.
    pub fn shift_at(&self, line: usize) -> isize {
        let idx = self.breaks.partition_point(|b| b.at <= line);
        if idx == 0 { 0 } else { self.breaks[idx - 1].shift }
    }

    pub fn net_shift(&self) -> isize {
        self.breaks.last().map(|b| b.shift).unwrap_or(0)
    }

    /// Physical line a logical line reads from when it has no entry.
    pub fn physical(&self, line: usize) -> Option<usize> {
        let physical = line as isize - self.shift_at(line);
        usize::try_from(physical).ok()
    }

    /// Store `text` for `line`, choosing the entry kind: an inserted line
    /// stays inserted, an emptied file line becomes a tombstone.
    pub fn set_text(&mut self, line: usize, text: String) {
        let entry = match self.entries.get(&line) {
            Some(LineEntry::Inserted(_)) => LineEntry::Inserted(text),
            _ if text.is_empty() => LineEntry::Tombstoned,
            _ => LineEntry::Modified(text),
        };
        self.entries.insert(line, entry);
    }

    pub fn set_inserted(&mut self, line: usize, text: String) {
        self.entries.insert(line, LineEntry::Inserted(text));
    }

    /// Make room for `count` new lines directly after `after`. Everything
    /// below moves down; the new slots are left without entries for the
    /// caller to fill.
    pub fn open_gap(&mut self, after: usize, count: usize) {
        if count == 0 {
            return;
        }
        let delta = count as isize;
        let prior = self.shift_at(after);
        let idx = self.breaks.partition_point(|b| b.at <= after);
        for b in &mut self.breaks[idx..] {
            b.at += count;
            b.shift += delta;
        }
        self.breaks.insert(
            idx,
            ShiftBreak {
                at: after + 1,
                shift: prior + delta,
            },
        );

        let moved = self.entries.split_off(&(after + 1));
        self.entries
            .extend(moved.into_iter().map(|(line, entry)| (line + count, entry)));
        self.coalesce();
    }

    /// Remove the `count` lines directly after `after`; everything below moves up.
    pub fn close_gap(&mut self, after: usize, count: usize) {
        if count == 0 {
            return;
        }
        let delta = count as isize;
        let first_kept = after + count + 1;
        let tail = self.shift_at(first_kept);

        self.breaks.retain(|b| b.at <= after || b.at >= first_kept);
        let idx = self.breaks.partition_point(|b| b.at <= after);
        for b in &mut self.breaks[idx..] {
            b.at -= count;
            b.shift -= delta;
        }
        if self.breaks.get(idx).map(|b| b.at) != Some(after + 1) {
            self.breaks.insert(
                idx,
                ShiftBreak {
                    at: after + 1,
                    shift: tail - delta,
                },
            );
        }

        let mut moved = self.entries.split_off(&(after + 1));
        let kept = moved.split_off(&first_kept);
        drop(moved);
        self.entries
            .extend(kept.into_iter().map(|(line, entry)| (line - count, entry)));
        self.coalesce();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.breaks.clear();
    }

    // Drop breaks that repeat the shift already in effect.
    fn coalesce(&mut self) {
        let mut current = 0;
        self.breaks.retain(|b| {
            let keep = b.shift != current;
            current = b.shift;
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overlay_is_identity() {
        let o = Overlay::new();
        assert_eq!(o.physical(0), Some(0));
        assert_eq!(o.physical(42), Some(42));
        assert_eq!(o.net_shift(), 0);
        assert!(o.is_empty());
    }

    #[test]
    fn open_gap_shifts_lines_below() {
        let mut o = Overlay::new();
        o.set_text(3, "edited".into());
        o.open_gap(1, 2);
        assert_eq!(o.breaks(), &[ShiftBreak { at: 2, shift: 2 }]);
        assert_eq!(o.physical(1), Some(1));
        assert_eq!(o.physical(4), Some(2));
        assert_eq!(o.entry(5), Some(&LineEntry::Modified("edited".into())));
        assert_eq!(o.entry(3), None);
    }

    #[test]
    fn close_gap_drops_range_and_pulls_lines_up() {
        let mut o = Overlay::new();
        o.set_text(2, "gone".into());
        o.set_text(5, "kept".into());
        o.close_gap(1, 2);
        assert_eq!(o.physical(2), Some(4));
        assert_eq!(o.net_shift(), -2);
        assert_eq!(o.entry(2), None);
        assert_eq!(o.entry(3), Some(&LineEntry::Modified("kept".into())));
    }

    #[test]
    fn gap_then_close_restores_identity() {
        let mut o = Overlay::new();
        o.open_gap(4, 3);
        o.close_gap(4, 3);
        assert!(o.breaks().is_empty());
        assert_eq!(o.physical(10), Some(10));
    }

    #[test]
    fn later_break_moves_with_earlier_insert() {
        let mut o = Overlay::new();
        o.close_gap(5, 1); // physical 6 removed
        o.open_gap(1, 1); // new line at 2
        // logical 7 is physical 7: +1 from the insert, -1 from the delete
        assert_eq!(o.physical(7), Some(7));
        assert_eq!(o.physical(6), Some(5));
        assert_eq!(o.physical(3), Some(2));
        assert_eq!(o.net_shift(), 0);
    }

    #[test]
    fn set_text_picks_entry_kind() {
        let mut o = Overlay::new();
        o.set_text(0, String::new());
        assert_eq!(o.entry(0), Some(&LineEntry::Tombstoned));
        o.set_inserted(1, "new".into());
        o.set_text(1, String::new());
        assert_eq!(o.entry(1), Some(&LineEntry::Inserted(String::new())));
        o.set_text(0, "back".into());
        assert_eq!(o.entry(0), Some(&LineEntry::Modified("back".into())));
    }
}
