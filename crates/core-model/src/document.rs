//! Document: the buffer plus everything kept in step with it.
//!
//! `VirtualBuffer` knows nothing about undo history or wrapping. `Document`
//! owns all three and runs one `sync` after every operation:
//! 1. drain the command journal into `UndoEngine`;
//! 2. drain the change journal, splicing `VisualLineIndex` for inserted and
//!    removed lines and re-measuring every line the batch touched;
//! 3. fan the batch out to registered observers.
//!
//! Invariant after every public call: `visual().len() == buffer().total()`.
//!
//! Lines that were never edited keep a row count of 1 until a caller asks
//! for them to be measured (`remeasure`), typically for the visible range.
//! Opening a file never reads every line.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use core_state::search::{
    self, IncrementalSearch, Match, SearchError, SearchProgress, SearchQuery,
};
use core_state::{Change, UndoEngine, UndoOptions, VirtualBuffer};
use core_text::{LineIndex, Position};
use tracing::{debug, trace};

use crate::visual::{DEFAULT_CHUNK_SIZE, VisualLineIndex};
use crate::wrap::{NoWrap, WrapMeasure};

/// Receives every batch of changes after the document has synced.
pub trait DocumentObserver {
    fn document_changed(&mut self, changes: &[Change], generation: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    pub undo: UndoOptions,
    pub chunk_size: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            undo: UndoOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct Document {
    buffer: VirtualBuffer,
    undo: UndoEngine,
    visual: VisualLineIndex,
    measure: Box<dyn WrapMeasure>,
    observers: Vec<Box<dyn DocumentObserver>>,
}

impl Document {
    /// Wrap an existing buffer. Any pending journal in the buffer is dropped.
    pub fn new(mut buffer: VirtualBuffer, options: DocumentOptions) -> Self {
        buffer.take_commands();
        buffer.take_changes();
        let visual = VisualLineIndex::with_chunk_size(buffer.total(), options.chunk_size);
        Self {
            buffer,
            undo: UndoEngine::with_options(options.undo),
            visual,
            measure: Box::new(NoWrap),
            observers: Vec::new(),
        }
    }

    pub fn from_index(index: Arc<LineIndex>, options: DocumentOptions) -> Self {
        Self::new(VirtualBuffer::from_index(index), options)
    }

    pub fn with_measure(mut self, measure: Box<dyn WrapMeasure>) -> Self {
        self.set_measure(measure);
        self
    }

    pub fn buffer(&self) -> &VirtualBuffer {
        &self.buffer
    }

    pub fn visual(&self) -> &VisualLineIndex {
        &self.visual
    }

    pub fn undo_engine(&self) -> &UndoEngine {
        &self.undo
    }

    pub fn add_observer(&mut self, observer: Box<dyn DocumentObserver>) {
        self.observers.push(observer);
    }

    /// Swap the wrap measure. Row counts fall back to 1 until re-measured.
    pub fn set_measure(&mut self, measure: Box<dyn WrapMeasure>) {
        self.measure = measure;
        self.visual.reset(self.buffer.total());
    }

    /// Replace the document contents with a freshly built index. History is
    /// dropped with the old contents.
    pub fn load(&mut self, index: Arc<LineIndex>) {
        self.buffer.load(index);
        self.sync();
        debug!(target: "model.document", lines = self.buffer.total(), "document_loaded");
    }

    /// Run an arbitrary buffer operation, then sync undo history and wrap counts.
    pub fn edit<R>(&mut self, op: impl FnOnce(&mut VirtualBuffer) -> R) -> R {
        let result = op(&mut self.buffer);
        self.sync();
        result
    }

    pub fn set_cursor(&mut self, line: usize, col: usize, extend_selection: bool) {
        self.buffer.set_cursor(line, col, extend_selection);
    }

    pub fn insert_text(&mut self, text: &str) {
        self.edit(|buf| buf.insert_text(text));
    }

    pub fn insert_newline(&mut self) {
        self.edit(VirtualBuffer::insert_newline);
    }

    pub fn backspace(&mut self) -> bool {
        self.edit(VirtualBuffer::backspace)
    }

    pub fn delete_key(&mut self) -> bool {
        self.edit(VirtualBuffer::delete_key)
    }

    pub fn delete_selection(&mut self) -> bool {
        self.edit(VirtualBuffer::delete_selection)
    }

    pub fn undo(&mut self) -> bool {
        let done = self.undo.undo(&mut self.buffer);
        self.sync();
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.undo.redo(&mut self.buffer);
        self.sync();
        done
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Match>, SearchError> {
        search::search(&self.buffer, query)
    }

    /// Start a search that is advanced a chunk of lines at a time with
    /// `search_step`. Edits made between steps are not rescanned.
    pub fn begin_search(&self, query: SearchQuery) -> Result<IncrementalSearch, SearchError> {
        IncrementalSearch::new(query)
    }

    pub fn search_step(
        &self,
        search: &mut IncrementalSearch,
        chunk_lines: usize,
    ) -> SearchProgress {
        search.step(&self.buffer, chunk_lines)
    }

    /// Replace one match; returns the position after the replacement.
    pub fn replace_match(&mut self, found: &Match, replacement: &str) -> Position {
        self.edit(|buf| buf.replace_range(found.start(), found.end(), replacement))
    }

    /// Replace every match of `query` as a single undo step. Returns the
    /// number of replacements.
    pub fn replace_all(
        &mut self,
        query: &SearchQuery,
        replacement: &str,
    ) -> Result<usize, SearchError> {
        let matches = search::search(&self.buffer, query)?;
        if matches.is_empty() {
            return Ok(0);
        }
        self.edit(|buf| {
            buf.begin_action();
            // Back to front keeps earlier match positions valid.
            for found in matches.iter().rev() {
                buf.replace_range(found.start(), found.end(), replacement);
            }
            buf.end_action();
        });
        debug!(target: "model.document", replaced = matches.len(), "replace_all");
        Ok(matches.len())
    }

    /// Measure a range of lines (usually the viewport) with the current wrap measure.
    pub fn remeasure(&mut self, lines: Range<usize>) {
        let end = lines.end.min(self.buffer.total());
        for line in lines.start..end {
            let rows = self.measure.rows(&self.buffer.get_line(line));
            self.visual.update(line, rows);
        }
    }

    fn sync(&mut self) {
        let changes = self.buffer.take_changes();
        // A load clears the command journal, so anything journaled now
        // belongs to the new contents and must survive the clear.
        if changes.iter().any(|c| matches!(c, Change::Reset { .. })) {
            self.undo.clear();
        }
        self.undo.record_from(&mut self.buffer);
        if changes.is_empty() {
            return;
        }
        let mut dirty = BTreeSet::new();
        for change in &changes {
            match *change {
                Change::Reset { lines } => {
                    self.visual.reset(lines);
                    dirty.clear();
                }
                Change::Edited { line } => {
                    dirty.insert(line);
                }
                Change::Inserted { at, count } => {
                    self.visual.insert(at, count, 1);
                    dirty = dirty
                        .into_iter()
                        .map(|line| if line >= at { line + count } else { line })
                        .collect();
                    dirty.extend(at..at + count);
                }
                Change::Removed { at, count } => {
                    self.visual.delete(at, count);
                    dirty = dirty
                        .into_iter()
                        .filter_map(|line| match line {
                            l if l < at => Some(l),
                            l if l >= at + count => Some(l - count),
                            _ => None,
                        })
                        .collect();
                }
            }
        }
        for line in dirty {
            let rows = self.measure.rows(&self.buffer.get_line(line));
            self.visual.update(line, rows);
        }
        debug_assert_eq!(self.visual.len(), self.buffer.total());
        let generation = self.buffer.generation();
        trace!(
            target: "model.document",
            changes = changes.len(),
            generation,
            visual_total = self.visual.total(),
            "document_synced"
        );
        for observer in &mut self.observers {
            observer.document_changed(&changes, generation);
        }
    }
}
