//! Incremental indexing: diff an archive against the index and write the
//! changed files in batches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::error::{MailsiftError, Result};
use crate::index::SearchIndex;
use crate::metrics::IndexMetrics;
use crate::model::document::EmailDocument;
use crate::parser::MessageParser;
use crate::scanner::{self, ArchiveScanner};

pub const META_LAST_INDEXED_AT: &str = "last_indexed_at";
pub const META_LAST_RUN_INDEXED: &str = "last_run_indexed";
pub const META_LAST_RUN_SKIPPED: &str = "last_run_skipped";
pub const META_LAST_RUN_ERRORS: &str = "last_run_errors";

/// Default number of documents per write transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Shared cancellation signal for an indexing run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-file progress notification.
#[derive(Debug, Clone, Copy)]
pub struct IndexProgress<'a> {
    pub processed: usize,
    pub total: usize,
    pub current_path: &'a Path,
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration: Duration,
    pub cancelled: bool,
}

/// Tunables for [`IndexManager`].
#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub batch_size: usize,
    pub include_body: bool,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            include_body: true,
        }
    }
}

impl From<&IndexConfig> for IndexerOptions {
    fn from(cfg: &IndexConfig) -> Self {
        Self {
            batch_size: cfg.batch_size.max(1),
            include_body: cfg.include_body,
        }
    }
}

/// Drives scanning, diffing, parsing and batched writes for one index.
pub struct IndexManager<'a, P> {
    index: &'a SearchIndex,
    parser: P,
    scanner: ArchiveScanner,
    options: IndexerOptions,
    metrics: Arc<IndexMetrics>,
}

impl<'a, P: MessageParser> IndexManager<'a, P> {
    pub fn new(
        index: &'a SearchIndex,
        parser: P,
        scanner: ArchiveScanner,
        options: IndexerOptions,
        metrics: Arc<IndexMetrics>,
    ) -> Self {
        Self {
            index,
            parser,
            scanner,
            options,
            metrics,
        }
    }

    /// Index every message file under `root`.
    ///
    /// Unchanged files (same path, same mtime ticks) are skipped unless
    /// `full_rebuild` is set, in which case the index is wiped first.
    /// Cancellation discards the staged batch and leaves metadata untouched.
    pub fn run(
        &self,
        root: &Path,
        full_rebuild: bool,
        cancel: &CancelFlag,
        progress: Option<&dyn Fn(&IndexProgress<'_>)>,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        if cancel.is_cancelled() {
            report.cancelled = true;
            report.duration = start.elapsed();
            return Ok(report);
        }
        if !root.is_dir() {
            return Err(MailsiftError::InvalidArchive(root.to_path_buf()));
        }
        // Stored paths are the upsert key; one file must map to one spelling.
        let root = root
            .canonicalize()
            .map_err(|e| MailsiftError::io(root, e))?;
        let root = root.as_path();

        let known: HashMap<PathBuf, i64> = if full_rebuild {
            info!(root = %root.display(), "Full rebuild requested");
            self.index.rebuild()?;
            HashMap::new()
        } else {
            self.index.known_files()?
        };

        let files: Vec<PathBuf> = self.scanner.scan(root).collect();
        let total = files.len();
        info!(
            root = %root.display(),
            files = total,
            known = known.len(),
            "Indexing archive"
        );

        let mut staged: Vec<EmailDocument> = Vec::with_capacity(self.options.batch_size);

        for (i, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(processed = i, staged = staged.len(), "Indexing cancelled");
                report.cancelled = true;
                report.duration = start.elapsed();
                return Ok(report);
            }

            self.process_file(root, path, &known, &mut staged, &mut report);

            if staged.len() >= self.options.batch_size {
                self.flush(&mut staged, &mut report);
            }

            if let Some(cb) = progress {
                cb(&IndexProgress {
                    processed: i + 1,
                    total,
                    current_path: path,
                });
            }
        }
        self.flush(&mut staged, &mut report);

        report.duration = start.elapsed();
        self.write_run_metadata(&report)?;
        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            errors = report.errors,
            elapsed_ms = report.duration.as_millis() as u64,
            "Indexing complete"
        );
        Ok(report)
    }

    fn process_file(
        &self,
        root: &Path,
        path: &Path,
        known: &HashMap<PathBuf, i64>,
        staged: &mut Vec<EmailDocument>,
        report: &mut IndexReport,
    ) {
        let ticks = match scanner::modified_ticks(path) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot stat file");
                self.fail_file(report);
                return;
            }
        };

        if known.get(path) == Some(&ticks) {
            report.skipped += 1;
            self.metrics.inc_skipped();
            return;
        }

        let mut doc = match self.parser.parse(path, self.options.include_body) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!(path = %path.display(), "Unparseable message");
                self.fail_file(report);
                return;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Parse failed");
                self.fail_file(report);
                return;
            }
        };

        if doc.account.is_empty() {
            if let Some(account) = scanner::extract_account_name(path, root) {
                doc.account = account;
            }
        }
        if doc.folder.is_empty() {
            if let Some(folder) = scanner::extract_folder_name(path, root) {
                doc.folder = folder;
            }
        }
        doc.indexed_at = Utc::now();
        staged.push(doc);
    }

    fn fail_file(&self, report: &mut IndexReport) {
        report.errors += 1;
        self.metrics.inc_failed(1);
    }

    /// Write the staged documents in one transaction and clear the stage.
    fn flush(&self, staged: &mut Vec<EmailDocument>, report: &mut IndexReport) {
        if staged.is_empty() {
            return;
        }
        let n = staged.len();
        match self.index.batch_upsert(staged) {
            Ok(_) => {
                report.indexed += n;
                self.metrics.record_batch(n as u64);
                debug!(documents = n, "Batch committed");
            }
            Err(e) => {
                report.errors += n;
                self.metrics.record_failed_batch(n as u64);
                warn!(documents = n, error = %e, "Batch rolled back");
            }
        }
        staged.clear();
    }

    fn write_run_metadata(&self, report: &IndexReport) -> Result<()> {
        self.index
            .set_metadata(META_LAST_INDEXED_AT, &Utc::now().to_rfc3339())?;
        self.index
            .set_metadata(META_LAST_RUN_INDEXED, &report.indexed.to_string())?;
        self.index
            .set_metadata(META_LAST_RUN_SKIPPED, &report.skipped.to_string())?;
        self.index
            .set_metadata(META_LAST_RUN_ERRORS, &report.errors.to_string())?;
        Ok(())
    }
}
