//! Editable document state: the virtual buffer, its edit overlay, selection,
//! reversible commands, undo history, cursor motions and search.
//!
//! Coordinate spaces:
//! - physical lines: positions in the immutable `core_text::LineIndex`.
//! - logical lines: what the user sees after edits; the overlay's shift
//!   breaks translate logical to physical for every unedited line.
//!
//! Undo integration:
//! - `VirtualBuffer` journals one `EditCommand` per primitive mutation and
//!   groups them between `begin_action` / `end_action`.
//! - The owner drains the journal into `UndoEngine::record` (or
//!   `record_from`). The buffer never holds a reference to the engine.
//! - `UndoEngine` merges typing and deletion runs through an explicit
//!   `MergeState` machine; undo/redo replay through the same buffer
//!   primitives, so change notifications fire for replays too.

pub mod buffer;
pub mod command;
pub mod motion;
pub mod overlay;
pub mod search;
pub mod selection;
pub mod undo;

pub use buffer::{Change, VirtualBuffer};
pub use command::EditCommand;
pub use overlay::{LineEntry, Overlay, ShiftBreak};
pub use search::{
    DEFAULT_SEARCH_CHUNK_LINES, IncrementalSearch, Match, SearchCancel, SearchError, SearchProgress,
    SearchQuery,
};
pub use selection::Selection;
pub use undo::{
    DEFAULT_MERGE_MAX_CHARS, DEFAULT_MERGE_WINDOW, DeleteDirection, MergeState, UNDO_HISTORY_MAX,
    UndoEngine, UndoOptions,
};
