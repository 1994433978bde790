//! Line-oriented search over a `VirtualBuffer`.
//!
//! Matches never span lines. Columns are reported in code points, the same
//! unit the cursor uses, so a match can be turned into a selection directly.
//!
//! `search` scans the whole document in one call. `IncrementalSearch` scans
//! it in line chunks so a caller can report progress between chunks and stop
//! early through a `SearchCancel` handle, from any thread.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use core_text::{Position, chars};
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, trace};

use crate::buffer::VirtualBuffer;

/// Lines scanned per `IncrementalSearch::step` unless the caller asks otherwise.
pub const DEFAULT_SEARCH_CHUNK_LINES: usize = 10_000;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub pattern: String,
    pub case_sensitive: bool,
    pub regex: bool,
    pub whole_word: bool,
    /// Stop after this many matches; 0 means unlimited.
    pub max_matches: usize,
}

impl SearchQuery {
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex: true,
            ..Self::default()
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn whole_word(mut self, yes: bool) -> Self {
        self.whole_word = yes;
        self
    }

    pub fn max_matches(mut self, limit: usize) -> Self {
        self.max_matches = limit;
        self
    }

    /// Compile into a matcher. `None` for an empty pattern, which matches nothing.
    pub fn compile(&self) -> Result<Option<Regex>, SearchError> {
        if self.pattern.is_empty() {
            return Ok(None);
        }
        let body = if self.regex {
            self.pattern.clone()
        } else {
            regex::escape(&self.pattern)
        };
        let source = if self.whole_word {
            format!(r"\b(?:{body})\b")
        } else {
            body
        };
        RegexBuilder::new(&source)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map(Some)
            .map_err(|source| SearchError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub text: String,
}

impl Match {
    pub fn start(&self) -> Position {
        Position::new(self.line, self.start_col)
    }
    pub fn end(&self) -> Position {
        Position::new(self.line, self.end_col)
    }
}

/// Search every line of the document.
pub fn search(buf: &VirtualBuffer, query: &SearchQuery) -> Result<Vec<Match>, SearchError> {
    search_lines(buf, query, 0..buf.total())
}

/// Search a range of logical lines (typically the visible viewport).
pub fn search_lines(
    buf: &VirtualBuffer,
    query: &SearchQuery,
    lines: Range<usize>,
) -> Result<Vec<Match>, SearchError> {
    let Some(regex) = query.compile()? else {
        return Ok(Vec::new());
    };
    let lines = lines.start..lines.end.min(buf.total());
    let first_line = lines.start;
    let mut matches = Vec::new();
    for line in lines {
        if collect_line(&regex, buf, line, query.max_matches, &mut matches) {
            break;
        }
    }
    debug!(target: "state.search", first_line, matches = matches.len(), "search_done");
    Ok(matches)
}

/// Push the matches of one line. Returns true once `limit` (0 = none) is reached.
fn collect_line(
    regex: &Regex,
    buf: &VirtualBuffer,
    line: usize,
    limit: usize,
    matches: &mut Vec<Match>,
) -> bool {
    let text = buf.get_line(line);
    if text.is_empty() {
        return false;
    }
    for found in regex.find_iter(&text) {
        if found.is_empty() {
            continue;
        }
        matches.push(Match {
            line,
            start_col: chars::col_of_byte(&text, found.start()),
            end_col: chars::col_of_byte(&text, found.end()),
            text: found.as_str().to_owned(),
        });
        if limit > 0 && matches.len() >= limit {
            return true;
        }
    }
    false
}

/// Where an incremental search stands after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchProgress {
    pub matches: usize,
    pub lines_searched: usize,
    pub total: usize,
    /// No further step will add matches (end reached, limit hit or cancelled).
    pub done: bool,
    pub cancelled: bool,
}

/// Stops an `IncrementalSearch` at its next step. Cheap to clone and `Send`.
#[derive(Debug, Clone, Default)]
pub struct SearchCancel(Arc<AtomicBool>);

impl SearchCancel {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A search run in line chunks. Lines already scanned are not revisited, so
/// edits made between steps only affect lines the search has not reached.
#[derive(Debug)]
pub struct IncrementalSearch {
    query: SearchQuery,
    regex: Option<Regex>,
    next_line: usize,
    matches: Vec<Match>,
    cancel: SearchCancel,
    limit_hit: bool,
}

impl IncrementalSearch {
    pub fn new(query: SearchQuery) -> Result<Self, SearchError> {
        let regex = query.compile()?;
        Ok(Self {
            query,
            regex,
            next_line: 0,
            matches: Vec::new(),
            cancel: SearchCancel::default(),
            limit_hit: false,
        })
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn cancel_handle(&self) -> SearchCancel {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn into_matches(self) -> Vec<Match> {
        self.matches
    }

    /// Scan up to `chunk_lines` more lines (at least one).
    pub fn step(&mut self, buf: &VirtualBuffer, chunk_lines: usize) -> SearchProgress {
        let total = buf.total();
        if !self.is_finished(total) {
            match &self.regex {
                Some(regex) => {
                    let end = self.next_line.saturating_add(chunk_lines.max(1)).min(total);
                    while self.next_line < end {
                        let line = self.next_line;
                        self.next_line += 1;
                        let limit = self.query.max_matches;
                        if collect_line(regex, buf, line, limit, &mut self.matches) {
                            self.limit_hit = true;
                            break;
                        }
                    }
                }
                None => self.next_line = total,
            }
        }
        let progress = self.progress(total);
        trace!(
            target: "state.search",
            matches = progress.matches,
            lines_searched = progress.lines_searched,
            total,
            done = progress.done,
            "search_step"
        );
        progress
    }

    /// Step until done, reporting after every chunk.
    pub fn run(
        &mut self,
        buf: &VirtualBuffer,
        chunk_lines: usize,
        mut on_progress: impl FnMut(&SearchProgress),
    ) -> SearchProgress {
        loop {
            let progress = self.step(buf, chunk_lines);
            on_progress(&progress);
            if progress.done {
                debug!(
                    target: "state.search",
                    matches = progress.matches,
                    cancelled = progress.cancelled,
                    "search_done"
                );
                return progress;
            }
        }
    }

    fn is_finished(&self, total: usize) -> bool {
        self.cancel.is_cancelled() || self.limit_hit || self.next_line >= total
    }

    fn progress(&self, total: usize) -> SearchProgress {
        SearchProgress {
            matches: self.matches.len(),
            lines_searched: self.next_line.min(total),
            total,
            done: self.is_finished(total),
            cancelled: self.cancel.is_cancelled(),
        }
    }
}
