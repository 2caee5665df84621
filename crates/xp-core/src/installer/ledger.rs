//! Record of filesystem mutations made during one install attempt.
//!
//! Entries are appended in creation order and only ever consulted on
//! failure, when they are deleted newest first.

use crate::fsutil::delete_tree;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Kind of path the installer created.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LedgerEntry {
    Directory(PathBuf),
    File(PathBuf),
}

impl LedgerEntry {
    fn path(&self) -> &Path {
        match self {
            LedgerEntry::Directory(p) | LedgerEntry::File(p) => p,
        }
    }
}

/// Append-only list of created paths.
#[derive(Debug, Default)]
pub struct MutationLedger {
    entries: Vec<LedgerEntry>,
}

/// Outcome of undoing a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Paths deleted, in deletion order.
    pub removed: Vec<PathBuf>,
    /// Paths that were already gone.
    pub already_gone: Vec<PathBuf>,
    /// Paths that could not be deleted, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dir(&mut self, path: impl Into<PathBuf>) {
        self.entries.push(LedgerEntry::Directory(path.into()));
    }

    pub fn record_file(&mut self, path: impl Into<PathBuf>) {
        self.entries.push(LedgerEntry::File(path.into()));
    }

    /// Created paths in creation order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path().to_path_buf()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete every recorded path, newest first.
    ///
    /// Deletion errors are logged and collected; rollback always visits
    /// every entry.
    pub fn rollback(self) -> RollbackReport {
        self.rollback_with(delete_tree)
    }

    /// [`MutationLedger::rollback`] with a custom deletion function.
    pub fn rollback_with(self, remove: impl Fn(&Path) -> io::Result<()>) -> RollbackReport {
        let mut report = RollbackReport::default();

        for entry in self.entries.into_iter().rev() {
            let path = entry.path().to_path_buf();
            if path.symlink_metadata().is_err() {
                report.already_gone.push(path);
                continue;
            }
            match remove(&path) {
                Ok(()) => {
                    info!(
                        target: "install.rollback",
                        path = %path.display(),
                        kind = match entry {
                            LedgerEntry::Directory(_) => "directory",
                            LedgerEntry::File(_) => "file",
                        },
                        "Removed created path"
                    );
                    report.removed.push(path);
                }
                Err(e) => {
                    error!(
                        target: "install.rollback",
                        path = %path.display(),
                        error = %e,
                        "Failed to remove created path"
                    );
                    report.failures.push((path, e.to_string()));
                }
            }
        }

        if !report.already_gone.is_empty() {
            warn!(
                target: "install.rollback",
                count = report.already_gone.len(),
                "Some created paths were already gone"
            );
        }
        report
    }
}
