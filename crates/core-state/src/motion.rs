//! Cursor motions over a `VirtualBuffer`.
//!
//! Each motion takes `extend_selection`: when set, the selection grows from
//! its anchor; when clear, the selection collapses. Horizontal motions with a
//! live selection and no extension jump to the matching selection edge
//! instead of moving a character.

use core_text::chars;

use crate::buffer::VirtualBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Word,
    Other,
}

fn class_of(ch: char) -> CharClass {
    if ch.is_whitespace() {
        CharClass::Space
    } else if ch == '_' || ch.is_alphanumeric() {
        CharClass::Word
    } else {
        CharClass::Other
    }
}

pub fn left(buf: &mut VirtualBuffer, extend_selection: bool) {
    if !extend_selection && let Some((start, _)) = buf.selection_bounds() {
        buf.set_cursor(start.line, start.col, false);
        return;
    }
    let pos = buf.cursor();
    if pos.col > 0 {
        buf.set_cursor(pos.line, pos.col - 1, extend_selection);
    } else if pos.line > 0 {
        let prev = buf.line_len(pos.line - 1);
        buf.set_cursor(pos.line - 1, prev, extend_selection);
    } else {
        buf.set_cursor(0, 0, extend_selection);
    }
}

pub fn right(buf: &mut VirtualBuffer, extend_selection: bool) {
    if !extend_selection && let Some((_, end)) = buf.selection_bounds() {
        buf.set_cursor(end.line, end.col, false);
        return;
    }
    let pos = buf.cursor();
    if pos.col < buf.line_len(pos.line) {
        buf.set_cursor(pos.line, pos.col + 1, extend_selection);
    } else if pos.line + 1 < buf.total() {
        buf.set_cursor(pos.line + 1, 0, extend_selection);
    } else {
        buf.set_cursor(pos.line, pos.col, extend_selection);
    }
}

/// Move up one line keeping a target column (sticky). Returns the sticky
/// column for the caller to pass to the next vertical motion.
pub fn up(
    buf: &mut VirtualBuffer,
    extend_selection: bool,
    sticky_col: Option<usize>,
) -> Option<usize> {
    if !extend_selection && let Some((start, _)) = buf.selection_bounds() {
        buf.set_cursor(start.line, start.col, false);
        return None;
    }
    let pos = buf.cursor();
    let target = sticky_col.unwrap_or(pos.col);
    if pos.line == 0 {
        buf.set_cursor(0, 0, extend_selection);
        return None;
    }
    buf.set_cursor(pos.line - 1, target, extend_selection);
    Some(target)
}

pub fn down(
    buf: &mut VirtualBuffer,
    extend_selection: bool,
    sticky_col: Option<usize>,
) -> Option<usize> {
    if !extend_selection && let Some((_, end)) = buf.selection_bounds() {
        buf.set_cursor(end.line, end.col, false);
        return None;
    }
    let pos = buf.cursor();
    let target = sticky_col.unwrap_or(pos.col);
    if pos.line + 1 >= buf.total() {
        let len = buf.line_len(pos.line);
        buf.set_cursor(pos.line, len, extend_selection);
        return None;
    }
    buf.set_cursor(pos.line + 1, target, extend_selection);
    Some(target)
}

pub fn line_start(buf: &mut VirtualBuffer, extend_selection: bool) {
    let line = buf.cursor().line;
    buf.set_cursor(line, 0, extend_selection);
}

pub fn line_end(buf: &mut VirtualBuffer, extend_selection: bool) {
    let line = buf.cursor().line;
    let len = buf.line_len(line);
    buf.set_cursor(line, len, extend_selection);
}

pub fn document_start(buf: &mut VirtualBuffer, extend_selection: bool) {
    buf.set_cursor(0, 0, extend_selection);
}

pub fn document_end(buf: &mut VirtualBuffer, extend_selection: bool) {
    let last = buf.total() - 1;
    let len = buf.line_len(last);
    buf.set_cursor(last, len, extend_selection);
}

/// Move to the start of the previous word. At column 0 the cursor moves to
/// the end of the previous line.
pub fn word_left(buf: &mut VirtualBuffer, extend_selection: bool) {
    let pos = buf.cursor();
    if pos.col == 0 {
        if pos.line > 0 {
            let prev = buf.line_len(pos.line - 1);
            buf.set_cursor(pos.line - 1, prev, extend_selection);
        }
        return;
    }
    let line: Vec<char> = buf.get_line(pos.line).chars().collect();
    let mut col = pos.col.min(line.len());
    while col > 0 && class_of(line[col - 1]) == CharClass::Space {
        col -= 1;
    }
    if col > 0 {
        let class = class_of(line[col - 1]);
        while col > 0 && class_of(line[col - 1]) == class {
            col -= 1;
        }
    }
    buf.set_cursor(pos.line, col, extend_selection);
}

/// Move to the start of the next word. At end of line the cursor moves to
/// the start of the next line.
pub fn word_right(buf: &mut VirtualBuffer, extend_selection: bool) {
    let pos = buf.cursor();
    let text = buf.get_line(pos.line);
    let len = chars::len(&text);
    if pos.col >= len {
        if pos.line + 1 < buf.total() {
            buf.set_cursor(pos.line + 1, 0, extend_selection);
        }
        return;
    }
    let line: Vec<char> = text.chars().collect();
    let mut col = pos.col;
    let class = class_of(line[col]);
    if class != CharClass::Space {
        while col < len && class_of(line[col]) == class {
            col += 1;
        }
    }
    while col < len && class_of(line[col]) == CharClass::Space {
        col += 1;
    }
    buf.set_cursor(pos.line, col, extend_selection);
}
