use core_text::Position;

/// Anchored selection: `anchor` stays where the selection was opened,
/// `active` follows the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub active: Position,
}

impl Selection {
    pub fn new(anchor: Position, active: Position) -> Self {
        Self { anchor, active }
    }

    /// Returns true if the selection covers nothing (anchor == active).
    pub fn is_empty(&self) -> bool {
        self.anchor == self.active
    }

    /// Normalized `(start, end)` with start <= end (line, then column).
    pub fn bounds(&self) -> (Position, Position) {
        if self.anchor <= self.active {
            (self.anchor, self.active)
        } else {
            (self.active, self.anchor)
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        let (start, end) = self.bounds();
        start <= pos && pos < end
    }

    pub fn is_multiline(&self) -> bool {
        self.anchor.line != self.active.line
    }
}
