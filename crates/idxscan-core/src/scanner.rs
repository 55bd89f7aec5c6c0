//! Concurrent index scanner.
//!
//! One walker (the calling thread) feeds index file paths into a bounded
//! channel; a fixed pool of workers drains it. A file that fails to open
//! or decode is logged and counted, never fatal. Any traversal error
//! (unreadable directory, symlink loop) aborts the scan once the workers
//! have drained what was already queued.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use idxscan_config::{
    log_scan_debug, log_scan_info, log_scan_warn, ScanConfig, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SKIP_DIR, DEFAULT_WORKERS,
};
use idxscan_format::{FormatError, IndexFile, IndexKind};
use tracing::field::display;
use walkdir::{DirEntry, WalkDir};

use crate::{Result, ScanError, ScanSession};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Number of worker threads (default: 4)
    pub workers: usize,
    /// Queue capacity between walker and workers (default: 100)
    pub queue_capacity: usize,
    /// Directory name pruned from the walk (default: `.chunks`)
    pub skip_dir: String,
    /// Descend through symlinked directories (default: false)
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            skip_dir: DEFAULT_SKIP_DIR.to_string(),
            follow_links: false,
        }
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            skip_dir: config.skip_dir.clone(),
            follow_links: config.follow_links,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Per-file progress event, delivered from worker threads
#[derive(Debug)]
pub enum FileOutcome<'a> {
    Indexed {
        path: &'a Path,
        kind: IndexKind,
        digests: usize,
    },
    Failed {
        path: &'a Path,
        error: &'a FormatError,
    },
}

impl FileOutcome<'_> {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Indexed { path, .. } | FileOutcome::Failed { path, .. } => path,
        }
    }
}

/// A file that was queued but could not be recorded
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: FormatError,
}

#[derive(Debug, Default)]
pub struct ScanStats {
    /// Index files handed to workers
    pub files_queued: u64,
    pub files_indexed: u64,
    pub files_failed: u64,
    /// Digests recorded across all indexed files
    pub digests_read: u64,
    pub failures: Vec<FileFailure>,
    pub duration: Duration,
}

/// What one worker did before the queue closed
#[derive(Default)]
struct WorkerTally {
    indexed: u64,
    digests: u64,
    failures: Vec<FileFailure>,
}

// ============================================================================
// Scanner
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Scanner {
    options: ScanOptions,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `root` recursively and record every index file into `session`.
    pub fn scan(&self, root: &Path, session: &ScanSession) -> Result<ScanStats> {
        self.scan_with_progress(root, session, |_| {})
    }

    /// Like [`Scanner::scan`], calling `on_progress` from the worker thread
    /// after each file.
    pub fn scan_with_progress<F>(
        &self,
        root: &Path,
        session: &ScanSession,
        on_progress: F,
    ) -> Result<ScanStats>
    where
        F: Fn(&FileOutcome<'_>) + Sync,
    {
        let start = Instant::now();
        let workers = self.options.workers.max(1);
        let (tx, rx) = bounded::<PathBuf>(self.options.queue_capacity.max(1));
        let on_progress = &on_progress;
        let options = &self.options;

        log_scan_info!(
            "Scan started",
            root = display(root.display()),
            workers = workers
        );

        let mut stats = thread::scope(move |scope| -> Result<ScanStats> {
            // tx lives in this closure: any early return closes the queue
            // and lets already-spawned workers drain and exit.
            let tx = tx;
            let mut handles = Vec::with_capacity(workers);
            for i in 0..workers {
                let rx = rx.clone();
                let handle = thread::Builder::new()
                    .name(format!("idxscan-worker-{i}"))
                    .spawn_scoped(scope, move || run_worker(&rx, session, on_progress))
                    .map_err(ScanError::Spawn)?;
                handles.push(handle);
            }
            drop(rx);

            let walked = walk(root, options, &tx);
            drop(tx);

            let mut stats = ScanStats::default();
            let mut panicked = false;
            for handle in handles {
                match handle.join() {
                    Ok(tally) => {
                        stats.files_indexed += tally.indexed;
                        stats.digests_read += tally.digests;
                        stats.failures.extend(tally.failures);
                    }
                    Err(_) => panicked = true,
                }
            }
            if panicked {
                return Err(ScanError::WorkerPanicked);
            }

            stats.files_queued = walked?;
            stats.files_failed = stats.failures.len() as u64;
            Ok(stats)
        })?;

        stats.duration = start.elapsed();
        log_scan_info!(
            "Scan complete",
            files = stats.files_indexed,
            failed = stats.files_failed,
            digests = stats.digests_read,
            elapsed_ms = stats.duration.as_millis() as u64
        );
        Ok(stats)
    }
}

fn is_skipped_dir(entry: &DirEntry, skip_dir: &str) -> bool {
    entry.file_type().is_dir() && entry.file_name() == skip_dir
}

/// Walk `root` and queue every index file. Returns the number queued.
fn walk(root: &Path, options: &ScanOptions, tx: &Sender<PathBuf>) -> Result<u64> {
    let mut queued = 0u64;
    let entries = WalkDir::new(root)
        .follow_links(options.follow_links)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry, &options.skip_dir));

    for entry in entries {
        let entry = entry.map_err(|err| ScanError::Walk {
            root: root.to_path_buf(),
            source: err,
        })?;

        if entry.file_type().is_dir() || IndexKind::from_path(entry.path()).is_none() {
            continue;
        }
        // Only fails once every worker is gone
        if tx.send(entry.into_path()).is_err() {
            break;
        }
        queued += 1;
    }

    log_scan_debug!("Walk finished", queued = queued);
    Ok(queued)
}

fn run_worker<F>(rx: &Receiver<PathBuf>, session: &ScanSession, on_progress: &F) -> WorkerTally
where
    F: Fn(&FileOutcome<'_>) + Sync,
{
    let mut tally = WorkerTally::default();

    for path in rx.iter() {
        match IndexFile::open(&path) {
            Ok(index) => {
                let digests = session.record_file(&path, index.digests());
                log_scan_debug!(
                    "Processing file",
                    path = display(path.display()),
                    digests = digests
                );
                tally.indexed += 1;
                tally.digests += digests as u64;
                on_progress(&FileOutcome::Indexed {
                    path: &path,
                    kind: index.kind(),
                    digests,
                });
            }
            Err(error) => {
                log_scan_warn!(
                    "Error processing file",
                    path = display(path.display()),
                    error = display(&error)
                );
                on_progress(&FileOutcome::Failed {
                    path: &path,
                    error: &error,
                });
                tally.failures.push(FileFailure { path, error });
            }
        }
    }

    tally
}
