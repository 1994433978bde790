//! Read-only line offset index over a memory-mapped file.
//!
//! Building an index is a single forward scan: the mapped bytes are walked in
//! fixed windows (the progress interval), newline markers located with
//! `memchr`, and the start of every following line appended to `offsets`.
//! Between windows the scanner reports progress and polls the cancel flag, so
//! a multi-gigabyte scan can be abandoned without waiting for it to finish.
//!
//! Invariants after construction:
//! * `offsets` is non-decreasing and never empty.
//! * `offsets.len() == total_lines() + 1`; the last entry equals the file length
//!   unless the file holds no line at all (empty, or a lone byte-order marker).
//! * For UTF-16 encodings every offset keeps 2-byte alignment relative to the
//!   scan start.

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use memchr::memmem;
use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::encoding::{self, Encoding};

/// Default distance in bytes between progress reports (and cancel checks).
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot map {path}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("indexing cancelled")]
    Cancelled,
    #[error("index worker exited without a result")]
    WorkerLost,
}

/// Tuning knobs for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub progress_interval: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => &map[..],
            Backing::Owned(bytes) => bytes.as_slice(),
        }
    }
}

/// A file that has been opened and mapped but not yet scanned.
pub struct MappedFile {
    path: PathBuf,
    backing: Backing,
    encoding: Encoding,
}

impl MappedFile {
    /// Open `path` read-only and map it. Encoding is sniffed from the leading sample.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| IndexError::Open {
            path: path.clone(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| IndexError::Open {
                path: path.clone(),
                source,
            })?
            .len();
        // Zero-length mappings are not portable; an empty file needs no mapping.
        let backing = if len == 0 {
            Backing::Owned(Vec::new())
        } else {
            // SAFETY: the mapping is read-only; concurrent truncation by another
            // process is outside what an editor viewing a file can guard against.
            let map = unsafe { Mmap::map(&file) }.map_err(|source| IndexError::Map {
                path: path.clone(),
                source,
            })?;
            Backing::Mapped(map)
        };
        let encoding = encoding::detect(backing.bytes());
        debug!(target: "text.index", file = %path.display(), size_bytes = len, encoding = encoding.display_name(), "file_mapped");
        Ok(Self {
            path,
            backing,
            encoding,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn byte_len(&self) -> usize {
        self.backing.bytes().len()
    }

    /// Scan the mapping and produce the finished index. `progress` receives a
    /// fraction in `0.0..=1.0` once per progress interval and a final `1.0`.
    pub fn index<F>(
        self,
        options: &IndexOptions,
        mut progress: F,
        cancel: &AtomicBool,
    ) -> Result<LineIndex, IndexError>
    where
        F: FnMut(f32),
    {
        let started = Instant::now();
        let offsets = scan_offsets(
            self.backing.bytes(),
            self.encoding,
            options,
            &mut progress,
            cancel,
        )?;
        let index = LineIndex {
            path: Some(self.path),
            backing: self.backing,
            encoding: self.encoding,
            offsets,
        };
        info!(
            target: "text.index",
            lines = index.total_lines(),
            size_bytes = index.byte_len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index_built"
        );
        Ok(index)
    }
}

/// Immutable offset table plus the bytes it indexes.
pub struct LineIndex {
    path: Option<PathBuf>,
    backing: Backing,
    encoding: Encoding,
    offsets: Vec<usize>,
}

impl std::fmt::Debug for LineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineIndex")
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .field("bytes", &self.byte_len())
            .field("lines", &self.total_lines())
            .finish()
    }
}

impl LineIndex {
    /// Open, map and fully index `path` on the calling thread.
    pub fn build(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let never = AtomicBool::new(false);
        MappedFile::open(path)?.index(&IndexOptions::default(), |_| {}, &never)
    }

    /// Index an in-memory byte vector with the same rules as a mapped file.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let encoding = encoding::detect(&bytes);
        let never = AtomicBool::new(false);
        let offsets = scan_offsets(
            &bytes,
            encoding,
            &IndexOptions::default(),
            &mut |_: f32| {},
            &never,
        )
        .unwrap_or_else(|_| vec![0]);
        Self {
            path: None,
            backing: Backing::Owned(bytes),
            encoding,
            offsets,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn byte_len(&self) -> usize {
        self.backing.bytes().len()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn total_lines(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Raw byte range of a physical line, terminator included.
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        if line >= self.total_lines() {
            return None;
        }
        Some(self.offsets[line]..self.offsets[line + 1])
    }

    /// Decoded text of a physical line without its terminator. Out-of-range
    /// lines yield an empty string.
    pub fn get_line(&self, line: usize) -> String {
        let Some(range) = self.line_range(line) else {
            return String::new();
        };
        let mut text = self.encoding.decode(&self.backing.bytes()[range]).into_owned();
        if text.ends_with('\n') {
            text.pop();
        }
        if text.ends_with('\r') {
            text.pop();
        }
        text
    }
}

fn scan_offsets(
    bytes: &[u8],
    encoding: Encoding,
    options: &IndexOptions,
    progress: &mut dyn FnMut(f32),
    cancel: &AtomicBool,
) -> Result<Vec<usize>, IndexError> {
    let total = bytes.len();
    let start = encoding.bom_len(bytes);
    // Even window size keeps UTF-16 code units from straddling two windows.
    let window = (options.progress_interval.max(2) + 1) & !1;
    let finder = memmem::Finder::new(encoding.newline());
    let unit = encoding.newline().len();

    let mut offsets = vec![start];
    let mut window_start = start;
    while window_start < total {
        if cancel.load(Ordering::Relaxed) {
            debug!(target: "text.index", scanned_bytes = window_start, "index_cancelled");
            return Err(IndexError::Cancelled);
        }
        let window_end = (window_start + window).min(total);
        let chunk = &bytes[window_start..window_end];
        if unit == 1 {
            offsets.extend(memchr::memchr_iter(b'\n', chunk).map(|at| window_start + at + 1));
        } else {
            offsets.extend(
                finder
                    .find_iter(chunk)
                    .filter(|at| at % 2 == 0)
                    .map(|at| window_start + at + unit),
            );
        }
        window_start = window_end;
        if window_start < total {
            trace!(target: "text.index", scanned_bytes = window_start, lines = offsets.len() - 1, "index_progress");
            progress(window_start as f32 / total as f32);
        }
    }
    if offsets.last().copied() != Some(total) {
        offsets.push(total);
    }
    progress(1.0);
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn offsets_with_trailing_newline() {
        let idx = LineIndex::from_bytes(b"a\nbb\n".to_vec());
        assert_eq!(idx.offsets(), &[0, 2, 5]);
        assert_eq!(idx.total_lines(), 2);
        assert_eq!(idx.get_line(1), "bb");
    }

    #[test]
    fn final_offset_appended_without_terminator() {
        let idx = LineIndex::from_bytes(b"a\nbb".to_vec());
        assert_eq!(idx.offsets(), &[0, 2, 4]);
        assert_eq!(idx.get_line(1), "bb");
    }

    #[test]
    fn empty_input_has_no_lines() {
        let idx = LineIndex::from_bytes(Vec::new());
        assert_eq!(idx.total_lines(), 0);
        assert_eq!(idx.get_line(0), "");
    }

    #[test]
    fn crlf_is_stripped() {
        let idx = LineIndex::from_bytes(b"one\r\ntwo\r\n".to_vec());
        assert_eq!(idx.get_line(0), "one");
        assert_eq!(idx.get_line(1), "two");
    }

    #[test]
    fn out_of_range_line_is_empty() {
        let idx = LineIndex::from_bytes(b"x\n".to_vec());
        assert_eq!(idx.get_line(7), "");
        assert!(idx.line_range(1).is_none());
    }

    #[test]
    fn utf16_scan_skips_bom_and_keeps_alignment() {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(utf16le("ab\ncd\nef"));
        let idx = LineIndex::from_bytes(bytes);
        assert_eq!(idx.encoding(), Encoding::Utf16Le);
        assert_eq!(idx.offsets()[0], 2);
        assert_eq!(idx.total_lines(), 3);
        assert_eq!(idx.get_line(0), "ab");
        assert_eq!(idx.get_line(2), "ef");
    }

    #[test]
    fn utf16_misaligned_marker_is_not_a_newline() {
        // U+0A41 followed by U+4100: bytes 41 0A 00 41 hold "0A 00" at an odd offset.
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(utf16le("\u{0A41}\u{4100}\nz"));
        let idx = LineIndex::from_bytes(bytes);
        assert_eq!(idx.total_lines(), 2);
        assert_eq!(idx.get_line(0), "\u{0A41}\u{4100}");
        assert_eq!(idx.get_line(1), "z");
    }

    #[test]
    fn utf8_bom_is_not_part_of_first_line() {
        let idx = LineIndex::from_bytes(b"\xEF\xBB\xBFhead\nbody".to_vec());
        assert_eq!(idx.encoding(), Encoding::Utf8Bom);
        assert_eq!(idx.get_line(0), "head");
    }

    #[test]
    fn progress_reports_each_window_and_finishes() {
        let bytes = b"line\n".repeat(100);
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let offsets = scan_offsets(
            &bytes,
            Encoding::Utf8,
            &IndexOptions {
                progress_interval: 100,
            },
            &mut |p: f32| seen.push(p),
            &cancel,
        )
        .unwrap();
        assert_eq!(offsets.len(), 101);
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cancelled_scan_returns_error() {
        let bytes = b"line\n".repeat(10);
        let cancel = AtomicBool::new(true);
        let result = scan_offsets(
            &bytes,
            Encoding::Utf8,
            &IndexOptions::default(),
            &mut |_: f32| {},
            &cancel,
        );
        assert!(matches!(result, Err(IndexError::Cancelled)));
    }
}
