//! Reversible edit commands.
//!
//! Every primitive buffer mutation journals one command. A command carries
//! enough to run it again (`replay`) or take it back (`revert`) against the
//! buffer state it left behind.

use std::time::Instant;

use core_text::{Position, chars};

use crate::buffer::VirtualBuffer;
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    Insert {
        at: Position,
        text: String,
        cursor_after: Position,
        stamp: Instant,
    },
    Delete {
        at: Position,
        text: String,
        /// Deleted as a selection; undo re-selects the text.
        restore_selection: bool,
        cursor_before: Position,
        stamp: Instant,
    },
    Composite(Vec<EditCommand>),
}

impl EditCommand {
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor_after = end_of(at, &text);
        EditCommand::Insert {
            at,
            text,
            cursor_after,
            stamp: Instant::now(),
        }
    }

    pub fn delete(at: Position, text: impl Into<String>, cursor_before: Position) -> Self {
        EditCommand::Delete {
            at,
            text: text.into(),
            restore_selection: false,
            cursor_before,
            stamp: Instant::now(),
        }
    }

    /// Override the creation instant (merge-window tests, replayed journals).
    pub fn with_stamp(mut self, instant: Instant) -> Self {
        match &mut self {
            EditCommand::Insert { stamp, .. } | EditCommand::Delete { stamp, .. } => {
                *stamp = instant
            }
            EditCommand::Composite(_) => {}
        }
        self
    }

    pub fn stamp(&self) -> Option<Instant> {
        match self {
            EditCommand::Insert { stamp, .. } | EditCommand::Delete { stamp, .. } => Some(*stamp),
            EditCommand::Composite(_) => None,
        }
    }

    /// Apply the command forward.
    pub fn replay(&self, buf: &mut VirtualBuffer) {
        match self {
            EditCommand::Insert {
                at,
                text,
                cursor_after,
                ..
            } => {
                buf.insert_at(*at, text);
                buf.place_cursor(*cursor_after, None);
            }
            EditCommand::Delete { at, text, .. } => {
                buf.delete_range(*at, end_of(*at, text), false);
                buf.place_cursor(*at, None);
            }
            EditCommand::Composite(cmds) => {
                for cmd in cmds {
                    cmd.replay(buf);
                }
            }
        }
    }

    /// Take the command back.
    pub fn revert(&self, buf: &mut VirtualBuffer) {
        match self {
            EditCommand::Insert { at, text, .. } => {
                buf.delete_range(*at, end_of(*at, text), false);
                buf.place_cursor(*at, None);
            }
            EditCommand::Delete {
                at,
                text,
                restore_selection,
                cursor_before,
                ..
            } => {
                let end = buf.insert_at(*at, text);
                let selection = restore_selection.then(|| {
                    let anchor = if *cursor_before == *at { end } else { *at };
                    Selection::new(anchor, *cursor_before)
                });
                buf.place_cursor(*cursor_before, selection);
            }
            EditCommand::Composite(cmds) => {
                for cmd in cmds.iter().rev() {
                    cmd.revert(buf);
                }
            }
        }
    }

    /// Number of leaf commands.
    pub fn leaf_count(&self) -> usize {
        match self {
            EditCommand::Composite(cmds) => cmds.iter().map(EditCommand::leaf_count).sum(),
            _ => 1,
        }
    }
}

/// Position just past `text` when it is inserted at `at`.
pub fn end_of(at: Position, text: &str) -> Position {
    match text.rfind('\n') {
        None => Position::new(at.line, at.col + chars::len(text)),
        Some(last) => Position::new(
            at.line + text.matches('\n').count(),
            chars::len(&text[last + 1..]),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_single_and_multi_line() {
        assert_eq!(end_of(Position::new(2, 3), "héy"), Position::new(2, 6));
        assert_eq!(end_of(Position::new(2, 3), "a\nbc\nd"), Position::new(4, 1));
        assert_eq!(end_of(Position::new(0, 5), "\n"), Position::new(1, 0));
    }

    #[test]
    fn leaf_count_flattens_composites() {
        let p = Position::origin();
        let cmd = EditCommand::Composite(vec![
            EditCommand::delete(p, "x", p),
            EditCommand::Composite(vec![EditCommand::insert(p, "a"), EditCommand::insert(p, "b")]),
        ]);
        assert_eq!(cmd.leaf_count(), 3);
        assert!(cmd.stamp().is_none());
    }
}
