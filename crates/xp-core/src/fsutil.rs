//! Recursive copy and delete helpers.

use crate::error::{InstallError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One file handled by [`copy_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    pub source: PathBuf,
    /// Where the content was written.
    pub written_to: PathBuf,
    /// The existing file that forced a timestamped name.
    pub conflict_with: Option<PathBuf>,
}

/// Copy every file below `src` to the same relative path below `dest`.
///
/// Existing files are never replaced: a colliding incoming file is written
/// to `<name>.<epoch-millis>` beside the original. Directories are
/// mirrored; existing directories are reused. A missing `src` copies
/// nothing.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<Vec<CopiedFile>> {
    copy_tree_with_clock(src, dest, &|| chrono::Utc::now().timestamp_millis())
}

/// [`copy_tree`] with an injectable millisecond clock for rename suffixes.
pub fn copy_tree_with_clock(
    src: &Path,
    dest: &Path,
    clock: &dyn Fn() -> i64,
) -> Result<Vec<CopiedFile>> {
    if !src.exists() {
        debug!(source = %src.display(), "Nothing to copy");
        return Ok(Vec::new());
    }

    let mut copied = Vec::new();
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            InstallError::io(path, io::Error::other(e.to_string()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| InstallError::InvalidArgument(entry.path().display().to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| InstallError::io(&target, e))?;
            continue;
        }

        copied.push(copy_file(entry.path(), &target, clock)?);
    }
    Ok(copied)
}

fn copy_file(source: &Path, target: &Path, clock: &dyn Fn() -> i64) -> Result<CopiedFile> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
    }

    let (written_to, conflict_with) = if target.symlink_metadata().is_ok() {
        (timestamped_sibling(target, clock()), Some(target.to_path_buf()))
    } else {
        (target.to_path_buf(), None)
    };
    fs::copy(source, &written_to).map_err(|e| InstallError::io(&written_to, e))?;

    Ok(CopiedFile {
        source: source.to_path_buf(),
        written_to,
        conflict_with,
    })
}

/// First free `<target>.<millis>` path, bumping `millis` while taken.
pub fn timestamped_sibling(target: &Path, mut millis: i64) -> PathBuf {
    loop {
        let mut name = target.as_os_str().to_os_string();
        name.push(format!(".{}", millis));
        let candidate = PathBuf::from(name);
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        millis += 1;
    }
}

/// Delete a file or directory tree. A path that is already gone is not an error.
pub fn delete_tree(path: &Path) -> io::Result<()> {
    let metadata = match path.symlink_metadata() {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
