//! Archive discovery: lazily walks an archive root for message files.
//!
//! The archive layout is `root/<account>/<folder>/.../<file>`; account and
//! folder names are derived from the first two path segments below the root.

use std::fs::ReadDir;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::trace;

/// Finds candidate message files below an archive root.
#[derive(Debug, Clone)]
pub struct ArchiveScanner {
    /// Lower-cased extensions without the leading dot.
    extensions: Vec<String>,
}

impl Default for ArchiveScanner {
    fn default() -> Self {
        Self::new(["eml"])
    }
}

impl ArchiveScanner {
    /// Create a scanner matching the given extensions (case-insensitive,
    /// with or without a leading dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Recursively enumerate message files under `root`.
    ///
    /// Unreadable directories and entries are skipped silently. A missing
    /// root yields an empty iterator.
    pub fn scan(&self, root: &Path) -> ScanIter<'_> {
        let mut pending = Vec::new();
        match std::fs::read_dir(root) {
            Ok(rd) => pending.push(rd),
            Err(e) => trace!(root = %root.display(), error = %e, "Archive root not readable"),
        }
        ScanIter {
            scanner: self,
            pending,
        }
    }

    /// Whether `path` has one of the configured extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.extensions.iter().any(|x| *x == e)
            })
            .unwrap_or(false)
    }
}

/// Lazy depth-first walk produced by [`ArchiveScanner::scan`].
pub struct ScanIter<'a> {
    scanner: &'a ArchiveScanner,
    pending: Vec<ReadDir>,
}

impl Iterator for ScanIter<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let dir = self.pending.last_mut()?;
            let entry = match dir.next() {
                None => {
                    self.pending.pop();
                    continue;
                }
                Some(Err(e)) => {
                    trace!(error = %e, "Skipping unreadable entry");
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    trace!(path = %path.display(), error = %e, "Skipping entry without file type");
                    continue;
                }
            };

            if file_type.is_dir() {
                match std::fs::read_dir(&path) {
                    Ok(rd) => self.pending.push(rd),
                    Err(e) => trace!(path = %path.display(), error = %e, "Skipping unreadable directory"),
                }
            } else if file_type.is_file() && self.scanner.matches(&path) {
                return Some(path);
            }
        }
    }
}

/// Path segments of `path` below `root`, or `None` if it is not below it.
fn relative_segments(path: &Path, root: &Path) -> Option<Vec<String>> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect(),
    )
}

/// Account name for `root/<account>/.../<file>`.
///
/// Returns `None` when the file sits directly in the root.
pub fn extract_account_name(path: &Path, root: &Path) -> Option<String> {
    let segments = relative_segments(path, root)?;
    if segments.len() < 2 {
        return None;
    }
    segments.into_iter().next()
}

/// Folder name for `root/<account>/<folder>/.../<file>`.
///
/// Returns `None` when there is no folder segment between account and file.
pub fn extract_folder_name(path: &Path, root: &Path) -> Option<String> {
    let segments = relative_segments(path, root)?;
    if segments.len() < 3 {
        return None;
    }
    segments.into_iter().nth(1)
}

/// File modification time in nanoseconds since the Unix epoch.
///
/// Times before the epoch are reported as negative ticks.
pub fn modified_ticks(path: &Path) -> std::io::Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let ticks = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    };
    Ok(ticks)
}
