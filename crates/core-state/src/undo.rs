use std::collections::VecDeque;
use std::time::Duration;

use core_text::{Position, chars};
use tracing::trace;

use crate::buffer::VirtualBuffer;
use crate::command::{EditCommand, end_of};

/// Maximum number of commands retained in undo history.
pub const UNDO_HISTORY_MAX: usize = 1000;
/// Typing pauses longer than this start a new undo step.
pub const DEFAULT_MERGE_WINDOW: Duration = Duration::from_secs(2);
/// A typing run longer than this stops absorbing further input.
pub const DEFAULT_MERGE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoOptions {
    pub max_depth: usize,
    pub merge_window: Duration,
    pub merge_max_chars: usize,
}

impl Default for UndoOptions {
    fn default() -> Self {
        Self {
            max_depth: UNDO_HISTORY_MAX,
            merge_window: DEFAULT_MERGE_WINDOW,
            merge_max_chars: DEFAULT_MERGE_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDirection {
    /// Backspace run: each delete ends where the previous one started.
    Backward,
    /// Delete-key run: each delete starts at the same column.
    Forward,
}

/// What the command on top of the undo stack can still absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Idle,
    AccumulatingWord,
    AccumulatingDeletion { direction: DeleteDirection },
}

pub struct UndoEngine {
    undo_stack: VecDeque<EditCommand>,
    redo_stack: Vec<EditCommand>,
    options: UndoOptions,
    merge_state: MergeState,
    replaying: bool,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoEngine {
    pub fn new() -> Self {
        Self::with_options(UndoOptions::default())
    }

    pub fn with_options(options: UndoOptions) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            options,
            merge_state: MergeState::Idle,
            replaying: false,
        }
    }

    pub fn options(&self) -> &UndoOptions {
        &self.options
    }
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
    pub fn merge_state(&self) -> MergeState {
        self.merge_state
    }
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.merge_state = MergeState::Idle;
        trace!(target: "state.undo", "history_cleared");
    }

    /// Record a freshly journaled command. Ignored while replaying.
    pub fn record(&mut self, cmd: EditCommand) {
        if self.replaying {
            return;
        }
        if self.try_merge(&cmd) {
            trace!(target: "state.undo", undo_depth = self.undo_stack.len(), state = ?self.merge_state, "command_merged");
            return;
        }
        self.merge_state = initial_state(&cmd);
        self.undo_stack.push_back(cmd);
        if self.undo_stack.len() > self.options.max_depth {
            let _ = self.undo_stack.pop_front();
            trace!(target: "state.undo", "undo_stack_trimmed");
        }
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            trace!(target: "state.undo", "redo_stack_cleared_on_new_edit");
        }
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "push_command");
    }

    /// Drain the buffer's command journal into history.
    pub fn record_from(&mut self, buf: &mut VirtualBuffer) {
        for cmd in buf.take_commands() {
            self.record(cmd);
        }
    }

    pub fn undo(&mut self, buf: &mut VirtualBuffer) -> bool {
        let Some(cmd) = self.undo_stack.pop_back() else {
            return false;
        };
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "undo_pop");
        self.replay_with(buf, |buf| cmd.revert(buf));
        self.redo_stack.push(cmd);
        true
    }

    pub fn redo(&mut self, buf: &mut VirtualBuffer) -> bool {
        let Some(cmd) = self.redo_stack.pop() else {
            return false;
        };
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "redo_pop");
        self.replay_with(buf, |buf| cmd.replay(buf));
        self.undo_stack.push_back(cmd);
        true
    }

    fn replay_with(&mut self, buf: &mut VirtualBuffer, apply: impl FnOnce(&mut VirtualBuffer)) {
        self.replaying = true;
        apply(buf);
        // The journal produced while replaying must not re-enter history.
        self.record_from(buf);
        self.replaying = false;
        self.merge_state = MergeState::Idle;
    }

    fn try_merge(&mut self, cmd: &EditCommand) -> bool {
        let state = self.merge_state;
        let options = self.options;
        let Some(top) = self.undo_stack.back_mut() else {
            return false;
        };
        match (state, top, cmd) {
            (
                MergeState::AccumulatingWord,
                EditCommand::Insert {
                    at: top_at,
                    text: top_text,
                    cursor_after: top_cursor,
                    stamp: top_stamp,
                },
                EditCommand::Insert {
                    at,
                    text,
                    cursor_after,
                    stamp,
                },
            ) => {
                let contiguous = *at == end_of(*top_at, top_text);
                let in_window = stamp.saturating_duration_since(*top_stamp) <= options.merge_window;
                if !contiguous
                    || !in_window
                    || text.contains('\n')
                    || chars::len(top_text) > options.merge_max_chars
                    || starts_word_after_space(top_text, text)
                {
                    return false;
                }
                top_text.push_str(text);
                *top_cursor = *cursor_after;
                *top_stamp = *stamp;
                true
            }
            (
                MergeState::AccumulatingDeletion { direction },
                EditCommand::Delete {
                    at: top_at,
                    text: top_text,
                    restore_selection: false,
                    stamp: top_stamp,
                    ..
                },
                EditCommand::Delete {
                    at,
                    text,
                    restore_selection: false,
                    cursor_before,
                    stamp,
                },
            ) => {
                if text.contains('\n') || at.line != top_at.line {
                    return false;
                }
                if delete_direction(*at, *cursor_before) != Some(direction) {
                    return false;
                }
                match direction {
                    DeleteDirection::Backward if at.col + chars::len(text) == top_at.col => {
                        top_text.insert_str(0, text);
                        *top_at = *at;
                    }
                    DeleteDirection::Forward if *at == *top_at => top_text.push_str(text),
                    _ => return false,
                }
                *top_stamp = *stamp;
                true
            }
            _ => false,
        }
    }
}

fn initial_state(cmd: &EditCommand) -> MergeState {
    match cmd {
        EditCommand::Insert { text, .. } if !text.contains('\n') => MergeState::AccumulatingWord,
        EditCommand::Delete {
            at,
            text,
            restore_selection: false,
            cursor_before,
            ..
        } if !text.contains('\n') => match delete_direction(*at, *cursor_before) {
            Some(direction) => MergeState::AccumulatingDeletion { direction },
            None => MergeState::Idle,
        },
        _ => MergeState::Idle,
    }
}

// A backspace leaves the cursor after the removed text, the delete key on it.
fn delete_direction(at: Position, cursor_before: Position) -> Option<DeleteDirection> {
    if cursor_before == at {
        Some(DeleteDirection::Forward)
    } else if cursor_before.line == at.line && cursor_before.col > at.col {
        Some(DeleteDirection::Backward)
    } else {
        None
    }
}

fn starts_word_after_space(prev: &str, next: &str) -> bool {
    let last_space = prev.chars().last().is_some_and(char::is_whitespace);
    let next_space = next.chars().next().is_some_and(char::is_whitespace);
    last_space && !next_space
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn typed(buf: &mut VirtualBuffer, undo: &mut UndoEngine, text: &str) {
        for ch in text.chars() {
            buf.insert_text(&ch.to_string());
            undo.record_from(buf);
        }
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut buf = VirtualBuffer::from_text("abc");
        let mut undo = UndoEngine::new();
        assert!(!undo.undo(&mut buf));
        assert!(!undo.redo(&mut buf));
        assert_eq!(buf.get_line(0), "abc");
        assert_eq!(buf.cursor(), Position::origin());
    }

    #[test]
    fn typing_a_word_is_one_step() {
        let mut buf = VirtualBuffer::new();
        let mut undo = UndoEngine::new();
        typed(&mut buf, &mut undo, "cat");
        assert_eq!(undo.undo_depth(), 1);
        assert_eq!(undo.merge_state(), MergeState::AccumulatingWord);
        assert!(undo.undo(&mut buf));
        assert_eq!(buf.get_line(0), "");
        assert!(undo.redo(&mut buf));
        assert_eq!(buf.get_line(0), "cat");
        assert_eq!(buf.cursor(), Position::new(0, 3));
    }

    #[test]
    fn space_then_word_starts_new_step() {
        let mut buf = VirtualBuffer::new();
        let mut undo = UndoEngine::new();
        typed(&mut buf, &mut undo, "cat dog");
        assert_eq!(undo.undo_depth(), 2);
        undo.undo(&mut buf);
        assert_eq!(buf.get_line(0), "cat ");
    }

    #[test]
    fn pause_longer_than_window_breaks_run() {
        let mut undo = UndoEngine::new();
        let t0 = Instant::now();
        let p = |c| Position::new(0, c);
        undo.record(EditCommand::insert(p(0), "a").with_stamp(t0));
        undo.record(EditCommand::insert(p(1), "b").with_stamp(t0 + Duration::from_millis(500)));
        undo.record(EditCommand::insert(p(2), "c").with_stamp(t0 + Duration::from_secs(5)));
        assert_eq!(undo.undo_depth(), 2);
    }

    #[test]
    fn long_run_stops_absorbing() {
        let mut undo = UndoEngine::new();
        let t0 = Instant::now();
        let long = "x".repeat(DEFAULT_MERGE_MAX_CHARS + 1);
        undo.record(EditCommand::insert(Position::origin(), long.clone()).with_stamp(t0));
        undo.record(EditCommand::insert(Position::new(0, long.len()), "y").with_stamp(t0));
        assert_eq!(undo.undo_depth(), 2);
    }

    #[test]
    fn backspace_run_merges_and_restores() {
        let mut buf = VirtualBuffer::from_text("hello");
        let mut undo = UndoEngine::new();
        buf.set_cursor(0, 5, false);
        for _ in 0..3 {
            buf.backspace();
            undo.record_from(&mut buf);
        }
        assert_eq!(buf.get_line(0), "he");
        assert_eq!(undo.undo_depth(), 1);
        assert_eq!(
            undo.merge_state(),
            MergeState::AccumulatingDeletion {
                direction: DeleteDirection::Backward
            }
        );
        undo.undo(&mut buf);
        assert_eq!(buf.get_line(0), "hello");
        assert_eq!(buf.cursor(), Position::new(0, 5));
    }

    #[test]
    fn delete_key_run_merges_forward() {
        let mut buf = VirtualBuffer::from_text("hello");
        let mut undo = UndoEngine::new();
        buf.set_cursor(0, 1, false);
        buf.delete_key();
        undo.record_from(&mut buf);
        buf.delete_key();
        undo.record_from(&mut buf);
        assert_eq!(buf.get_line(0), "hlo");
        assert_eq!(undo.undo_depth(), 1);
        // switching direction starts a new step
        buf.backspace();
        undo.record_from(&mut buf);
        assert_eq!(undo.undo_depth(), 2);
        undo.undo(&mut buf);
        undo.undo(&mut buf);
        assert_eq!(buf.get_line(0), "hello");
        assert_eq!(buf.cursor(), Position::new(0, 1));
    }

    #[test]
    fn undo_of_selection_delete_reselects() {
        let mut buf = VirtualBuffer::from_text("one two three");
        let mut undo = UndoEngine::new();
        buf.set_cursor(0, 4, false);
        buf.set_cursor(0, 7, true);
        buf.delete_selection();
        undo.record_from(&mut buf);
        assert_eq!(buf.get_line(0), "one  three");
        undo.undo(&mut buf);
        assert_eq!(buf.get_selected_text(), "two");
        assert_eq!(buf.cursor(), Position::new(0, 7));
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut buf = VirtualBuffer::new();
        let mut undo = UndoEngine::new();
        typed(&mut buf, &mut undo, "ab");
        undo.undo(&mut buf);
        assert!(undo.can_redo());
        typed(&mut buf, &mut undo, "z");
        assert!(!undo.can_redo());
    }

    #[test]
    fn replay_does_not_record() {
        let mut buf = VirtualBuffer::new();
        let mut undo = UndoEngine::new();
        typed(&mut buf, &mut undo, "ab");
        undo.undo(&mut buf);
        assert_eq!(undo.undo_depth(), 0);
        assert_eq!(undo.redo_depth(), 1);
        assert!(buf.take_commands().is_empty());
        assert!(!undo.is_replaying());
    }

    #[test]
    fn oldest_entry_evicted_at_max_depth() {
        let mut undo = UndoEngine::with_options(UndoOptions {
            max_depth: 3,
            ..UndoOptions::default()
        });
        for line in 0..5 {
            undo.record(EditCommand::insert(Position::new(line, 0), "\n"));
        }
        assert_eq!(undo.undo_depth(), 3);
    }

    #[test]
    fn composites_never_merge() {
        let mut undo = UndoEngine::new();
        let p = Position::origin();
        undo.record(EditCommand::Composite(vec![EditCommand::insert(p, "a")]));
        undo.record(EditCommand::Composite(vec![EditCommand::insert(Position::new(0, 1), "b")]));
        assert_eq!(undo.undo_depth(), 2);
        assert_eq!(undo.merge_state(), MergeState::Idle);
    }
}
