//! Folder scanning and dispatch
//!
//! The coordinator is the only owner of the pending set. A path enters it when a
//! scan first sees the file and leaves it when a worker reports the file complete,
//! so a file sitting in the folder across many scans is queued exactly once.

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use async_channel::TrySendError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Paths queued or in flight
#[derive(Debug, Default)]
pub struct PendingSet {
    paths: HashSet<PathBuf>,
}

impl PendingSet {
    /// Returns `false` if the path is already pending
    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.paths.insert(path)
    }

    pub fn retire(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub struct Coordinator {
    watch_dir: PathBuf,
    extension: String,
    scan_interval: Duration,
    pending: PendingSet,
    todo: async_channel::Sender<PathBuf>,
    done: mpsc::Receiver<PathBuf>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        config: &ImportConfig,
        todo: async_channel::Sender<PathBuf>,
        done: mpsc::Receiver<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            watch_dir: config.watch_dir.clone(),
            extension: config.extension.clone(),
            scan_interval: config.scan_interval,
            pending: PendingSet::default(),
            todo,
            done,
            cancel,
        }
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// Scan on every tick and retire completed files until cancelled
    pub async fn run(mut self) {
        info!(
            dir = %self.watch_dir.display(),
            extension = %self.extension,
            interval_ms = self.scan_interval.as_millis() as u64,
            "coordinator started"
        );

        let mut ticker = interval_at(Instant::now() + self.scan_interval, self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(path) = self.done.recv() => {
                    if !self.pending.retire(&path) {
                        warn!(path = %path.display(), "completion for a file that was not pending");
                    }
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.scan().await {
                        error!(error = %e, "failed to scan for metric files");
                    }
                },
            }
        }

        // closing lets idle workers observe an empty, closed queue
        self.todo.close();
        info!(pending = self.pending.len(), "coordinator exits");
    }

    /// One pass over the watched directory; returns the number of newly queued files
    pub async fn scan(&mut self) -> Result<usize> {
        let found = list_metric_files(&self.watch_dir, &self.extension).await?;
        let mut queued = 0;

        for path in found {
            if !self.pending.insert(path.clone()) {
                continue;
            }
            match self.todo.try_send(path) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(path)) => {
                    warn!(path = %path.display(), "work queue full, retrying on next scan");
                    self.pending.retire(&path);
                },
                Err(TrySendError::Closed(path)) => {
                    self.pending.retire(&path);
                    break;
                },
            }
        }

        if queued > 0 {
            debug!(queued, pending = self.pending.len(), "queued new metric files");
        }
        Ok(queued)
    }
}

/// Regular files directly under `dir` with the given extension, sorted
async fn list_metric_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let scan_err = |source| ImportError::Scan {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(scan_err)?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => files.push(path),
            Ok(_) => {},
            Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable entry"),
        }
    }

    files.sort();
    Ok(files)
}
