//! Configuration loading and parsing.
//!
//! Parses `vbuf.toml` (or an override path provided by the binary). Every
//! section and field is optional; absent values take the library defaults.
//! A missing file is silent, a malformed one logs a warning and falls back to
//! defaults so a typo never prevents a file from opening. Unknown fields are
//! ignored.
//!
//! ```toml
//! [index]
//! progress_interval_bytes = 52428800
//!
//! [undo]
//! max_depth = 1000
//! merge_window_ms = 2000
//! merge_max_chars = 50
//!
//! [wrap]
//! chunk_size = 1000
//! columns = 0        # 0 disables wrapping
//!
//! [search]
//! chunk_lines = 10000
//! ```
//!
//! Raw values are kept as parsed; the accessors clamp them into the ranges
//! the engines accept and log on target `config` when a value was adjusted.

use anyhow::Result;
use core_model::{DEFAULT_CHUNK_SIZE, DocumentOptions, FixedColumns, NoWrap, WrapMeasure};
use core_state::{
    DEFAULT_MERGE_MAX_CHARS, DEFAULT_MERGE_WINDOW, DEFAULT_SEARCH_CHUNK_LINES, UNDO_HISTORY_MAX,
    UndoOptions,
};
use core_text::{DEFAULT_PROGRESS_INTERVAL, IndexOptions};
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

pub const FILE_NAME: &str = "vbuf.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    #[serde(default = "IndexConfig::default_progress_interval")]
    pub progress_interval_bytes: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            progress_interval_bytes: Self::default_progress_interval(),
        }
    }
}

impl IndexConfig {
    const fn default_progress_interval() -> u64 {
        DEFAULT_PROGRESS_INTERVAL as u64
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UndoConfig {
    #[serde(default = "UndoConfig::default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "UndoConfig::default_merge_window_ms")]
    pub merge_window_ms: u64,
    #[serde(default = "UndoConfig::default_merge_max_chars")]
    pub merge_max_chars: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
            merge_window_ms: Self::default_merge_window_ms(),
            merge_max_chars: Self::default_merge_max_chars(),
        }
    }
}

impl UndoConfig {
    const fn default_max_depth() -> usize {
        UNDO_HISTORY_MAX
    }
    const fn default_merge_window_ms() -> u64 {
        DEFAULT_MERGE_WINDOW.as_millis() as u64
    }
    const fn default_merge_max_chars() -> usize {
        DEFAULT_MERGE_MAX_CHARS
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WrapConfig {
    #[serde(default = "WrapConfig::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub columns: u16,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            columns: 0,
        }
    }
}

impl WrapConfig {
    const fn default_chunk_size() -> usize {
        DEFAULT_CHUNK_SIZE
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_chunk_lines")]
    pub chunk_lines: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            chunk_lines: Self::default_chunk_lines(),
        }
    }
}

impl SearchConfig {
    const fn default_chunk_lines() -> usize {
        DEFAULT_SEARCH_CHUNK_LINES
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub wrap: WrapConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,  // original file string (optional)
    pub path: Option<PathBuf>, // where `raw` came from
    pub file: ConfigFile,     // parsed (or default) data
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vbuf").join(FILE_NAME);
    }
    PathBuf::from(FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                path: Some(path),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

fn at_least_one(field: &'static str, raw: usize) -> usize {
    if raw == 0 {
        info!(target: "config", field, raw, clamped = 1, "config_value_clamped");
        1
    } else {
        raw
    }
}

impl Config {
    pub fn index_options(&self) -> IndexOptions {
        let raw = self.file.index.progress_interval_bytes;
        let interval = usize::try_from(raw).unwrap_or(usize::MAX);
        IndexOptions {
            progress_interval: at_least_one("index.progress_interval_bytes", interval),
        }
    }

    pub fn undo_options(&self) -> UndoOptions {
        let undo = &self.file.undo;
        UndoOptions {
            max_depth: at_least_one("undo.max_depth", undo.max_depth),
            merge_window: Duration::from_millis(undo.merge_window_ms),
            merge_max_chars: undo.merge_max_chars,
        }
    }

    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            undo: self.undo_options(),
            chunk_size: at_least_one("wrap.chunk_size", self.file.wrap.chunk_size),
        }
    }

    /// Lines scanned per incremental search step.
    pub fn search_chunk_lines(&self) -> usize {
        at_least_one("search.chunk_lines", self.file.search.chunk_lines)
    }

    /// `None` when wrapping is disabled.
    pub fn wrap_columns(&self) -> Option<usize> {
        match self.file.wrap.columns {
            0 => None,
            n => Some(n as usize),
        }
    }

    /// Wrap measure for the configured column count.
    pub fn wrap_measure(&self) -> Box<dyn WrapMeasure> {
        match self.wrap_columns() {
            Some(columns) => Box::new(FixedColumns::new(columns)),
            None => Box::new(NoWrap),
        }
    }

    /// Override `[wrap] columns`, e.g. from a command line flag.
    pub fn set_wrap_columns(&mut self, columns: u16) {
        self.file.wrap.columns = columns;
    }
}
