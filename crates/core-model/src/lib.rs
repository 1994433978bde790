//! Document model: the virtual buffer joined with its undo history and the
//! wrapped-row index used for scrolling.
//!
//! Core invariants (must hold after every public `Document` call):
//! * `visual().len() == buffer().total()`; the visual index is spliced from
//!   the buffer's change journal, never rebuilt from scratch on an edit.
//! * Every command the buffer journals reaches `UndoEngine` before the next
//!   operation runs, so merge decisions see edits in order.
//! * Row counts of lines touched by the last operation reflect the current
//!   `WrapMeasure`; untouched lines keep whatever was last measured.

pub mod document;
pub mod visual;
pub mod wrap;

pub use document::{Document, DocumentObserver, DocumentOptions};
pub use visual::{DEFAULT_CHUNK_SIZE, MAX_ROWS, VisualLineIndex};
pub use wrap::{FixedColumns, NoWrap, WrapMeasure};
