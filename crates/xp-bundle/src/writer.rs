//! Archive writer for installer archives.
//!
//! Packs a directory tree into a ZIP file. Entries are sorted for
//! deterministic output, except that the manifest always comes first so JAR
//! tooling can find it.

use crate::{BundleError, Result, MANIFEST_PATH};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Builder for installer archives.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    files: Vec<(String, PathBuf)>,
}

/// Summary of a written archive.
#[derive(Debug, Clone)]
pub struct WrittenArchive {
    /// Destination path.
    pub path: PathBuf,
    /// Entry names in write order.
    pub entries: Vec<String>,
    /// Uncompressed payload size in bytes.
    pub total_bytes: u64,
}

impl ArchiveWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single file under the given entry name.
    ///
    /// A later file with the same entry name replaces the earlier one.
    pub fn add_file(&mut self, entry_name: impl Into<String>, source: impl Into<PathBuf>) {
        let entry_name = entry_name.into();
        let source = source.into();
        self.files.retain(|(name, _)| *name != entry_name);
        debug!(entry = %entry_name, source = %source.display(), "Added file to archive");
        self.files.push((entry_name, source));
    }

    /// Add every file below `root`, named by its path relative to `root`.
    ///
    /// Returns the number of files added.
    pub fn add_tree(&mut self, root: &Path) -> Result<usize> {
        let mut added = 0;
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                BundleError::path_io(path, io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| BundleError::UnsafeEntryPath(entry.path().display().to_string()))?;
            self.add_file(entry_name(relative), entry.path());
            added += 1;
        }
        Ok(added)
    }

    /// Number of files queued.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Write the archive to `path`.
    ///
    /// The archive is staged next to the destination and moved into place
    /// once complete, so a failed write never leaves a truncated archive.
    pub fn write(mut self, path: &Path) -> Result<WrittenArchive> {
        if self.files.is_empty() {
            return Err(BundleError::EmptyArchive);
        }

        self.files.sort_by(|a, b| {
            let a_manifest = a.0 == MANIFEST_PATH;
            let b_manifest = b.0 == MANIFEST_PATH;
            b_manifest.cmp(&a_manifest).then_with(|| a.0.cmp(&b.0))
        });

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staged =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| BundleError::path_io(&parent, e))?;

        let mut zip = ZipWriter::new(BufWriter::new(staged.reopen()?));
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut total_bytes = 0u64;
        for (name, source) in &self.files {
            zip.start_file(name.as_str(), options)?;
            let input = File::open(source).map_err(|e| BundleError::path_io(source, e))?;
            total_bytes += io::copy(&mut BufReader::new(input), &mut zip)
                .map_err(|e| BundleError::path_io(source, e))?;
        }
        let mut inner = zip.finish()?;
        inner.flush()?;
        drop(inner);

        staged
            .persist(path)
            .map_err(|e| BundleError::path_io(path, e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
                .map_err(|e| BundleError::path_io(path, e))?;
        }

        let entries: Vec<String> = self.files.into_iter().map(|(name, _)| name).collect();

        info!(
            target: "archive.written",
            path = %path.display(),
            files = entries.len(),
            bytes = total_bytes,
            "Archive written"
        );

        Ok(WrittenArchive {
            path: path.to_path_buf(),
            entries,
            total_bytes,
        })
    }
}

/// ZIP entry name for a relative path, always `/`-separated.
pub fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ArchiveSummary;
    use std::fs;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("META-INF")).unwrap();
        fs::create_dir_all(root.join("added-configs/standalone/configuration")).unwrap();
        fs::write(root.join("META-INF/MANIFEST.MF"), "Manifest-Version: 1.0\r\n\r\n").unwrap();
        fs::write(root.join("patch.zip"), b"PATCH").unwrap();
        fs::write(root.join("added-configs/standalone/configuration/a.xml"), b"<a/>").unwrap();
        fs::write(root.join("Main.class"), b"\xca\xfe").unwrap();
    }

    #[test]
    fn test_write_empty_fails() {
        let temp = TempDir::new().unwrap();
        let result = ArchiveWriter::new().write(&temp.path().join("out.jar"));
        assert!(matches!(result, Err(BundleError::EmptyArchive)));
        assert!(!temp.path().join("out.jar").exists());
    }

    #[test]
    fn test_add_tree_and_write() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        populate(&src);

        let mut writer = ArchiveWriter::new();
        assert_eq!(writer.add_tree(&src).unwrap(), 4);

        let out = temp.path().join("out.jar");
        let written = writer.write(&out).unwrap();

        assert_eq!(written.entries[0], MANIFEST_PATH);
        assert_eq!(
            &written.entries[1..],
            &[
                "Main.class".to_string(),
                "added-configs/standalone/configuration/a.xml".to_string(),
                "patch.zip".to_string(),
            ]
        );

        let summary = ArchiveSummary::open(&out).unwrap();
        assert!(summary.has_patch);
        assert_eq!(summary.entries, written.entries);
    }

    #[test]
    fn test_add_file_replaces_same_entry() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, b"first").unwrap();
        fs::write(&b, b"second").unwrap();

        let mut writer = ArchiveWriter::new();
        writer.add_file("patch.zip", &a);
        writer.add_file("patch.zip", &b);
        assert_eq!(writer.file_count(), 1);

        let out = temp.path().join("out.zip");
        let written = writer.write(&out).unwrap();
        assert_eq!(written.total_bytes, 6);
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let path = Path::new("added-configs").join("docs").join("a.txt");
        assert_eq!(entry_name(&path), "added-configs/docs/a.txt");
    }
}
