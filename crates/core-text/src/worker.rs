//! Off-thread index construction.
//!
//! The scan of a large file runs on a dedicated thread so the owner's control
//! flow stays responsive. Progress and the final result travel over an
//! unbounded channel; the owner polls `events()` from its own loop (or blocks
//! in `wait`). Cancelling, or dropping the worker, raises a shared flag the
//! scanner checks between windows; whatever the thread produces afterwards is
//! discarded.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, unbounded};
use tracing::{debug, warn};

use crate::index::{IndexError, IndexOptions, LineIndex, MappedFile};

#[derive(Debug)]
pub enum IndexEvent {
    /// Fraction of the file scanned so far.
    Progress(f32),
    Finished(Result<LineIndex, IndexError>),
}

pub struct IndexWorker {
    path: PathBuf,
    cancel: Arc<AtomicBool>,
    events: Receiver<IndexEvent>,
    handle: Option<JoinHandle<()>>,
}

impl IndexWorker {
    /// Spawn the indexing thread for `path`. Only thread creation can fail
    /// here; open/map/scan errors arrive as `IndexEvent::Finished(Err(..))`.
    pub fn spawn(path: impl Into<PathBuf>, options: IndexOptions) -> std::io::Result<Self> {
        let path = path.into();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = unbounded();
        let thread_path = path.clone();
        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("vbuf-index".into())
            .spawn(move || {
                let result = MappedFile::open(&thread_path).and_then(|file| {
                    file.index(
                        &options,
                        |fraction| {
                            let _ = tx.send(IndexEvent::Progress(fraction));
                        },
                        &flag,
                    )
                });
                // A cancel that lands after the last window still wins.
                let result = if flag.load(Ordering::Relaxed) {
                    Err(IndexError::Cancelled)
                } else {
                    result
                };
                if tx.send(IndexEvent::Finished(result)).is_err() {
                    debug!(target: "text.worker", file = %thread_path.display(), "index_result_dropped");
                }
            })?;
        debug!(target: "text.worker", file = %path.display(), "index_worker_spawned");
        Ok(Self {
            path,
            cancel,
            events: rx,
            handle: Some(handle),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn events(&self) -> &Receiver<IndexEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        if !self.cancel.swap(true, Ordering::Relaxed) {
            debug!(target: "text.worker", file = %self.path.display(), "index_cancel_requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Block until the worker finishes, forwarding progress to `on_progress`.
    pub fn wait_with_progress<F>(mut self, mut on_progress: F) -> Result<LineIndex, IndexError>
    where
        F: FnMut(f32),
    {
        let outcome = loop {
            match self.events.recv() {
                Ok(IndexEvent::Progress(fraction)) => on_progress(fraction),
                Ok(IndexEvent::Finished(result)) => break result,
                Err(_) => {
                    warn!(target: "text.worker", file = %self.path.display(), "index_worker_lost");
                    break Err(IndexError::WorkerLost);
                }
            }
        };
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        outcome
    }

    pub fn wait(self) -> Result<LineIndex, IndexError> {
        self.wait_with_progress(|_| {})
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        // Detach rather than join: the thread notices the flag at its next window.
        if self.handle.is_some() {
            self.cancel.store(true, Ordering::Relaxed);
        }
    }
}
