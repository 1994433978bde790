//! Editable document over an optional read-only line index.
//!
//! The buffer never copies the file. Reads resolve through the overlay first
//! (inserted, modified, tombstoned) and fall back to the physical line the
//! shift breaks map to. Each mutation journals the undo command it
//! represents plus `Change` records describing which logical lines moved, so
//! owners can keep derived state (wrap counts, views) in step.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use core_text::{LineIndex, Position, chars};
use tracing::{debug, trace};

use crate::command::EditCommand;
use crate::overlay::Overlay;
use crate::selection::Selection;

/// Structural change notification, in logical line numbers at the time the
/// change was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Everything was replaced (new index loaded); `lines` is the line count
    /// right after the load.
    Reset { lines: usize },
    Edited { line: usize },
    Inserted { at: usize, count: usize },
    Removed { at: usize, count: usize },
}

#[derive(Debug, Default)]
pub struct VirtualBuffer {
    index: Option<Arc<LineIndex>>,
    base_lines: usize,
    overlay: Overlay,
    cursor: Position,
    selection: Option<Selection>,
    changes: Vec<Change>,
    commands: Vec<EditCommand>,
    groups: Vec<Vec<EditCommand>>,
    generation: u64,
}

impl VirtualBuffer {
    /// An empty scratch buffer holding a single empty line.
    pub fn new() -> Self {
        Self {
            base_lines: 1,
            ..Self::default()
        }
    }

    pub fn from_index(index: Arc<LineIndex>) -> Self {
        let mut buf = Self::new();
        buf.load(index);
        buf
    }

    /// Index an in-memory string; handy for scratch documents and tests.
    pub fn from_text(text: &str) -> Self {
        Self::from_index(Arc::new(LineIndex::from_bytes(text.as_bytes().to_vec())))
    }

    /// Replace the document with `index`, dropping every edit.
    pub fn load(&mut self, index: Arc<LineIndex>) {
        self.base_lines = index.total_lines().max(1);
        debug!(target: "state.buffer", lines = self.base_lines, encoding = index.encoding().display_name(), "buffer_loaded");
        self.index = Some(index);
        self.overlay.clear();
        self.cursor = Position::origin();
        self.selection = None;
        self.commands.clear();
        self.groups.clear();
        self.changes.clear();
        self.changes.push(Change::Reset {
            lines: self.total(),
        });
        self.generation += 1;
    }

    pub fn index(&self) -> Option<&Arc<LineIndex>> {
        self.index.as_ref()
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn total(&self) -> usize {
        (self.base_lines as isize + self.overlay.net_shift()).max(1) as usize
    }

    /// Text of logical line `n`. Out-of-range lines read as empty.
    pub fn get_line(&self, n: usize) -> String {
        if n >= self.total() {
            return String::new();
        }
        if let Some(entry) = self.overlay.entry(n) {
            return entry.text().to_owned();
        }
        match (self.overlay.physical(n), &self.index) {
            (Some(physical), Some(index)) => index.get_line(physical),
            _ => String::new(),
        }
    }

    pub fn line_len(&self, n: usize) -> usize {
        chars::len(&self.get_line(n))
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some_and(|s| !s.is_empty())
    }

    pub fn selection_bounds(&self) -> Option<(Position, Position)> {
        self.selection.filter(|s| !s.is_empty()).map(|s| s.bounds())
    }

    /// Bumped by every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub fn take_commands(&mut self) -> Vec<EditCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Move the cursor, clamped to the document. With `extend_selection` the
    /// selection grows from its anchor (or the old cursor); otherwise it
    /// collapses.
    pub fn set_cursor(&mut self, line: usize, col: usize, extend_selection: bool) {
        let target = self.clamp(Position::new(line, col));
        if extend_selection {
            let anchor = self.selection.map(|s| s.anchor).unwrap_or(self.cursor);
            self.selection = Some(Selection::new(anchor, target));
        } else {
            self.selection = None;
        }
        self.cursor = target;
    }

    pub(crate) fn place_cursor(&mut self, pos: Position, selection: Option<Selection>) {
        self.cursor = self.clamp(pos);
        self.selection =
            selection.map(|s| Selection::new(self.clamp(s.anchor), self.clamp(s.active)));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn select_all(&mut self) {
        let last = self.total() - 1;
        let end = Position::new(last, self.line_len(last));
        self.selection = Some(Selection::new(Position::origin(), end));
        self.cursor = end;
    }

    pub fn get_selected_text(&self) -> String {
        match self.selection_bounds() {
            Some((start, end)) => self.text_between(start, end),
            None => String::new(),
        }
    }

    /// Insert at the cursor, replacing any selection. CR and CRLF become LF.
    pub fn insert_text(&mut self, text: &str) {
        let text = normalize_newlines(text);
        let replacing = self.has_selection();
        if replacing {
            self.begin_action();
            self.delete_selection();
        }
        if !text.is_empty() {
            self.insert_at(self.cursor, &text);
        }
        if replacing {
            self.end_action();
        }
    }

    pub fn insert_newline(&mut self) {
        self.insert_text("\n");
    }

    /// Delete the selected range. Returns false when nothing is selected.
    pub fn delete_selection(&mut self) -> bool {
        let Some((start, end)) = self.selection_bounds() else {
            self.selection = None;
            return false;
        };
        self.delete_range(start, end, true);
        true
    }

    /// Delete the character before the cursor, joining with the previous
    /// line at column 0.
    pub fn backspace(&mut self) -> bool {
        if self.has_selection() {
            return self.delete_selection();
        }
        self.selection = None;
        let Position { line, col } = self.cursor;
        let start = if col > 0 {
            Position::new(line, col - 1)
        } else if line > 0 {
            Position::new(line - 1, self.line_len(line - 1))
        } else {
            return false;
        };
        self.delete_range(start, self.cursor, false);
        true
    }

    /// Delete the character under the cursor, joining with the next line at
    /// end of line.
    pub fn delete_key(&mut self) -> bool {
        if self.has_selection() {
            return self.delete_selection();
        }
        self.selection = None;
        let Position { line, col } = self.cursor;
        let end = if col < self.line_len(line) {
            Position::new(line, col + 1)
        } else if line + 1 < self.total() {
            Position::new(line + 1, 0)
        } else {
            return false;
        };
        self.delete_range(self.cursor, end, false);
        true
    }

    /// Replace the text between `start` and `end` with `text` as one undo step.
    /// Returns the position after the replacement.
    pub fn replace_range(&mut self, start: Position, end: Position, text: &str) -> Position {
        let text = normalize_newlines(text);
        let at = self.clamp(start.min(end));
        self.begin_action();
        self.delete_range(start, end, false);
        let after = self.insert_at(at, &text);
        self.end_action();
        after
    }

    /// Start grouping journaled commands into one composite. Calls nest.
    pub fn begin_action(&mut self) {
        self.groups.push(Vec::new());
    }

    pub fn end_action(&mut self) {
        let Some(group) = self.groups.pop() else {
            return;
        };
        if !group.is_empty() {
            self.journal(EditCommand::Composite(group));
        }
    }

    /// Insert already-normalized `text` at `at`. Returns the position just
    /// past the inserted text, where the cursor is left.
    pub(crate) fn insert_at(&mut self, at: Position, text: &str) -> Position {
        let at = self.clamp(at);
        if text.is_empty() {
            return at;
        }
        let line = self.get_line(at.line);
        let (prefix, suffix) = chars::split_at_col(&line, at.col);
        let mut segments = text.split('\n');
        let first = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        let end = match rest.split_last() {
            None => {
                self.overlay
                    .set_text(at.line, format!("{prefix}{first}{suffix}"));
                self.changes.push(Change::Edited { line: at.line });
                Position::new(at.line, at.col + chars::len(first))
            }
            Some((last, interior)) => {
                let count = rest.len();
                self.overlay.set_text(at.line, format!("{prefix}{first}"));
                self.overlay.open_gap(at.line, count);
                for (i, segment) in interior.iter().enumerate() {
                    self.overlay.set_inserted(at.line + 1 + i, (*segment).to_owned());
                }
                self.overlay
                    .set_inserted(at.line + count, format!("{last}{suffix}"));
                self.changes.push(Change::Edited { line: at.line });
                self.changes.push(Change::Inserted {
                    at: at.line + 1,
                    count,
                });
                Position::new(at.line + count, chars::len(last))
            }
        };
        trace!(target: "state.buffer", line = at.line, col = at.col, new_lines = end.line - at.line, total = self.total(), "insert");

        self.journal(EditCommand::Insert {
            at,
            text: text.to_owned(),
            cursor_after: end,
            stamp: Instant::now(),
        });
        self.generation += 1;
        self.cursor = end;
        self.selection = None;
        end
    }

    /// Remove the text between two positions and return it. The cursor is
    /// left at the start of the range.
    pub(crate) fn delete_range(
        &mut self,
        start: Position,
        end: Position,
        restore_selection: bool,
    ) -> String {
        let (start, end) = {
            let (a, b) = (self.clamp(start), self.clamp(end));
            if a <= b { (a, b) } else { (b, a) }
        };
        if start == end {
            return String::new();
        }
        let cursor_before = self.cursor;
        let removed = self.text_between(start, end);

        let first = self.get_line(start.line);
        let (prefix, _) = chars::split_at_col(&first, start.col);
        if start.line == end.line {
            let (_, suffix) = chars::split_at_col(&first, end.col);
            self.overlay
                .set_text(start.line, format!("{prefix}{suffix}"));
            self.changes.push(Change::Edited { line: start.line });
        } else {
            let last = self.get_line(end.line);
            let (_, suffix) = chars::split_at_col(&last, end.col);
            let count = end.line - start.line;
            self.overlay
                .set_text(start.line, format!("{prefix}{suffix}"));
            self.overlay.close_gap(start.line, count);
            self.changes.push(Change::Edited { line: start.line });
            self.changes.push(Change::Removed {
                at: start.line + 1,
                count,
            });
        }
        trace!(target: "state.buffer", line = start.line, col = start.col, removed_lines = end.line - start.line, total = self.total(), "delete");

        self.journal(EditCommand::Delete {
            at: start,
            text: removed.clone(),
            restore_selection,
            cursor_before,
            stamp: Instant::now(),
        });
        self.generation += 1;
        self.cursor = start;
        self.selection = None;
        removed
    }

    fn text_between(&self, start: Position, end: Position) -> String {
        let first = self.get_line(start.line);
        if start.line == end.line {
            return chars::slice(&first, start.col, end.col).to_owned();
        }
        let mut text = chars::split_at_col(&first, start.col).1.to_owned();
        for line in start.line + 1..end.line {
            text.push('\n');
            text.push_str(&self.get_line(line));
        }
        text.push('\n');
        let last = self.get_line(end.line);
        text.push_str(chars::split_at_col(&last, end.col).0);
        text
    }

    fn journal(&mut self, cmd: EditCommand) {
        match self.groups.last_mut() {
            Some(group) => group.push(cmd),
            None => self.commands.push(cmd),
        }
    }

    fn clamp(&self, pos: Position) -> Position {
        let mut pos = pos;
        pos.clamp_to(self.total(), |line| self.line_len(line));
        pos
    }
}

fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::LineEntry;

    fn lines(buf: &VirtualBuffer) -> Vec<String> {
        (0..buf.total()).map(|n| buf.get_line(n)).collect()
    }

    #[test]
    fn scratch_buffer_has_one_empty_line() {
        let buf = VirtualBuffer::new();
        assert_eq!(buf.total(), 1);
        assert_eq!(buf.get_line(0), "");
        assert_eq!(buf.get_line(5), "");
    }

    #[test]
    fn empty_file_behaves_like_scratch() {
        let buf = VirtualBuffer::from_text("");
        assert_eq!(buf.total(), 1);
        assert_eq!(buf.get_line(0), "");
    }

    #[test]
    fn single_segment_insert_advances_column() {
        let mut buf = VirtualBuffer::from_text("hello\nworld");
        buf.set_cursor(1, 5, false);
        buf.insert_text("!!");
        assert_eq!(buf.get_line(1), "world!!");
        assert_eq!(buf.cursor(), Position::new(1, 7));
        assert_eq!(
            buf.take_changes(),
            vec![Change::Reset { lines: 2 }, Change::Edited { line: 1 }]
        );
    }

    #[test]
    fn multi_segment_insert_splits_line() {
        let mut buf = VirtualBuffer::from_text("alpha\nbeta\ngamma");
        buf.set_cursor(1, 0, false);
        buf.insert_text("X\nY");
        assert_eq!(lines(&buf), ["alpha", "X", "Ybeta", "gamma"]);
        assert_eq!(buf.total(), 4);
        assert_eq!(buf.cursor(), Position::new(2, 1));
        assert_eq!(buf.overlay().entry(2), Some(&LineEntry::Inserted("Ybeta".into())));
    }

    #[test]
    fn crlf_in_inserted_text_is_normalized() {
        let mut buf = VirtualBuffer::new();
        buf.insert_text("a\r\nb\rc");
        assert_eq!(lines(&buf), ["a", "b", "c"]);
    }

    #[test]
    fn newline_at_line_start_tombstones_physical_line() {
        let mut buf = VirtualBuffer::from_text("one\ntwo");
        buf.set_cursor(1, 0, false);
        buf.insert_newline();
        assert_eq!(lines(&buf), ["one", "", "two"]);
        assert_eq!(buf.overlay().entry(1), Some(&LineEntry::Tombstoned));
    }

    #[test]
    fn delete_whole_middle_line_merges() {
        let mut buf = VirtualBuffer::from_text("alpha\nbeta\ngamma");
        buf.set_cursor(1, 0, false);
        buf.set_cursor(2, 0, true);
        assert_eq!(buf.get_selected_text(), "beta\n");
        assert!(buf.delete_selection());
        assert_eq!(lines(&buf), ["alpha", "gamma"]);
        assert_eq!(buf.total(), 2);
        assert!(!buf.delete_selection());
    }

    #[test]
    fn backspace_and_delete_join_lines() {
        let mut buf = VirtualBuffer::from_text("ab\ncd\nef");
        buf.set_cursor(1, 0, false);
        assert!(buf.backspace());
        assert_eq!(lines(&buf), ["abcd", "ef"]);
        assert_eq!(buf.cursor(), Position::new(0, 2));
        buf.set_cursor(0, 4, false);
        assert!(buf.delete_key());
        assert_eq!(lines(&buf), ["abcdef"]);
        buf.set_cursor(0, 0, false);
        assert!(!buf.backspace());
        buf.set_cursor(0, 6, false);
        assert!(!buf.delete_key());
    }

    #[test]
    fn insert_replaces_selection_as_one_composite() {
        let mut buf = VirtualBuffer::from_text("hello world");
        buf.set_cursor(0, 6, false);
        buf.set_cursor(0, 11, true);
        buf.insert_text("there");
        assert_eq!(buf.get_line(0), "hello there");
        let cmds = buf.take_commands();
        assert_eq!(cmds.len(), 1);
        assert!(matches!(&cmds[0], EditCommand::Composite(parts) if parts.len() == 2));
    }

    #[test]
    fn set_cursor_clamps_and_extends() {
        let mut buf = VirtualBuffer::from_text("abc\nde");
        buf.set_cursor(9, 9, false);
        assert_eq!(buf.cursor(), Position::new(1, 2));
        buf.set_cursor(0, 1, true);
        assert_eq!(
            buf.selection_bounds(),
            Some((Position::new(0, 1), Position::new(1, 2)))
        );
        buf.set_cursor(0, 0, false);
        assert!(!buf.has_selection());
    }

    #[test]
    fn select_all_reads_every_line() {
        let mut buf = VirtualBuffer::from_text("a\nb\nc\n");
        buf.select_all();
        assert_eq!(buf.get_selected_text(), "a\nb\nc");
        assert_eq!(buf.cursor(), Position::new(2, 1));
    }

    #[test]
    fn edits_below_a_structural_change_keep_their_lines() {
        let mut buf = VirtualBuffer::from_text("0\n1\n2\n3\n4\n5");
        buf.set_cursor(4, 1, false);
        buf.insert_text("!");
        buf.set_cursor(1, 1, false);
        buf.insert_text("\nnew");
        assert_eq!(lines(&buf), ["0", "1", "new", "2", "3", "4!", "5"]);
        buf.set_cursor(0, 1, false);
        buf.set_cursor(2, 3, true);
        buf.delete_selection();
        assert_eq!(lines(&buf), ["0", "2", "3", "4!", "5"]);
    }

    #[test]
    fn replace_range_is_one_composite() {
        let mut buf = VirtualBuffer::from_text("one two\nthree");
        let after = buf.replace_range(Position::new(0, 4), Position::new(1, 2), "2\nT");
        assert_eq!(lines(&buf), ["one 2", "Tree"]);
        assert_eq!(after, Position::new(1, 1));
        let cmds = buf.take_commands();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].leaf_count(), 2);
    }

    #[test]
    fn generation_counts_mutations() {
        let mut buf = VirtualBuffer::new();
        let start = buf.generation();
        buf.insert_text("x");
        buf.backspace();
        assert_eq!(buf.generation(), start + 2);
    }
}
