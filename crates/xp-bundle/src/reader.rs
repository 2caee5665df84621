//! Archive reading: streaming extraction and inspection.
//!
//! Extraction never trusts entry names: anything that would land outside the
//! destination directory is rejected before a byte is written.

use crate::manifest::{sha256_file, Manifest};
use crate::{BundleError, Result, ADDED_CONFIGS_DIR, MANIFEST_PATH, PATCH_ENTRY};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Prefix of scratch directories created by [`unpack`].
pub const SCRATCH_PREFIX: &str = "xp-installer";

/// Contents of an installer archive extracted into a scratch directory.
///
/// The scratch directory is removed when this value is dropped; call
/// [`UnpackedArchive::close`] to observe deletion errors.
#[derive(Debug)]
pub struct UnpackedArchive {
    scratch: TempDir,
    manifest: Manifest,
    entries: Vec<String>,
}

impl UnpackedArchive {
    /// Root of the scratch directory.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Extracted patch payload.
    pub fn patch_path(&self) -> PathBuf {
        self.scratch.path().join(PATCH_ENTRY)
    }

    /// Extracted added-configuration tree (may not exist).
    pub fn added_configs_dir(&self) -> PathBuf {
        self.scratch.path().join(ADDED_CONFIGS_DIR)
    }

    /// The archive manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Layer names declared by the manifest.
    pub fn layers(&self) -> Result<Vec<String>> {
        self.manifest.layers()
    }

    /// Names of every extracted file entry, in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Delete the scratch directory.
    pub fn close(self) -> Result<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch
            .close()
            .map_err(|e| BundleError::path_io(path, e))
    }
}

/// Extract an installer archive into a fresh scratch directory.
///
/// Every non-directory entry is written at its relative path. The whole
/// archive is scanned before the patch payload is required, so the payload
/// may sit anywhere in the entry order.
pub fn unpack(archive_path: &Path) -> Result<UnpackedArchive> {
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(|e| BundleError::path_io(std::env::temp_dir(), e))?;

    let entries = extract_all(archive_path, scratch.path())?;

    if !entries.iter().any(|e| e == PATCH_ENTRY) {
        return Err(BundleError::MissingPatch {
            archive: archive_path.to_path_buf(),
        });
    }

    let manifest_path = scratch.path().join(MANIFEST_PATH);
    if !manifest_path.is_file() {
        return Err(BundleError::MissingManifest {
            archive: archive_path.to_path_buf(),
            manifest: MANIFEST_PATH,
        });
    }
    let manifest = Manifest::read_from(&manifest_path)?;

    if let Some(expected) = manifest.patch_digest() {
        let actual = sha256_file(&scratch.path().join(PATCH_ENTRY))?;
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(BundleError::DigestMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        debug!(digest = %actual, "Patch digest verified");
    }

    info!(
        target: "archive.unpacked",
        archive = %archive_path.display(),
        scratch = %scratch.path().display(),
        entries = entries.len(),
        "Installer archive unpacked"
    );

    Ok(UnpackedArchive {
        scratch,
        manifest,
        entries,
    })
}

/// Extract every file entry of `archive_path` below `dest`.
///
/// Returns the entry names written, in archive order.
pub fn extract_all(archive_path: &Path, dest: &Path) -> Result<Vec<String>> {
    let file = File::open(archive_path).map_err(|e| BundleError::path_io(archive_path, e))?;
    let mut archive = ZipArchive::new(file)?;
    let mut written = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| BundleError::UnsafeEntryPath(name.clone()))?;
        let target = dest.join(&relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BundleError::path_io(parent, e))?;
        }
        let out = File::create(&target).map_err(|e| BundleError::path_io(&target, e))?;
        let mut out = BufWriter::new(out);
        io::copy(&mut entry, &mut out)
            .and_then(|_| out.flush())
            .map_err(|e| BundleError::path_io(&target, e))?;

        debug!(entry = %name, "Extracted archive entry");
        written.push(name);
    }

    Ok(written)
}

/// What an archive contains, read without extracting it.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// File entry names in archive order.
    pub entries: Vec<String>,
    /// Parsed manifest, if present.
    pub manifest: Option<Manifest>,
    /// Whether the patch payload entry is present.
    pub has_patch: bool,
    /// Added-configuration paths relative to the installation root.
    pub added_configs: Vec<String>,
}

impl ArchiveSummary {
    /// Inspect an archive on disk.
    pub fn open(archive_path: &Path) -> Result<Self> {
        let file =
            File::open(archive_path).map_err(|e| BundleError::path_io(archive_path, e))?;
        Self::from_reader(file)
    }

    /// Inspect an archive from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::new();
        let mut manifest = None;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if name == MANIFEST_PATH {
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                manifest = Some(Manifest::parse(&text)?);
            }
            entries.push(name);
        }

        let prefix = format!("{}/", ADDED_CONFIGS_DIR);
        let added_configs = entries
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix))
            .map(str::to_string)
            .collect();
        let has_patch = entries.iter().any(|e| e == PATCH_ENTRY);
        if !has_patch {
            warn!("Archive has no patch payload");
        }

        Ok(Self {
            entries,
            manifest,
            has_patch,
            added_configs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LAYERS_KEY;
    use tempfile::TempDir;
    use zip::write::{FileOptions, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options: FileOptions<'_, ()> = FileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(name.trim_end_matches('/'), options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    fn manifest_bytes(layers: &str) -> Vec<u8> {
        let mut manifest = Manifest::new();
        manifest.set(LAYERS_KEY, layers);
        manifest.to_text().into_bytes()
    }

    #[test]
    fn test_unpack_patch_not_first_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        let manifest = manifest_bytes("microprofile");
        write_zip(
            &archive,
            &[
                (MANIFEST_PATH, &manifest),
                ("added-configs/", b""),
                ("added-configs/standalone/configuration/mp.xml", b"<server/>"),
                ("patch.zip", b"PATCH"),
            ],
        );

        let unpacked = unpack(&archive).unwrap();

        assert_eq!(fs::read(unpacked.patch_path()).unwrap(), b"PATCH");
        assert_eq!(
            fs::read(
                unpacked
                    .added_configs_dir()
                    .join("standalone/configuration/mp.xml")
            )
            .unwrap(),
            b"<server/>"
        );
        assert_eq!(unpacked.layers().unwrap(), vec!["microprofile"]);
        assert_eq!(unpacked.entries().len(), 3);
    }

    #[test]
    fn test_unpack_missing_patch() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        let manifest = manifest_bytes("microprofile");
        write_zip(
            &archive,
            &[(MANIFEST_PATH, &manifest), ("other.zip", b"nope")],
        );

        let err = unpack(&archive).unwrap_err();
        assert!(matches!(err, BundleError::MissingPatch { .. }));
        assert!(err.is_malformed_archive());
    }

    #[test]
    fn test_unpack_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        write_zip(&archive, &[("patch.zip", b"PATCH")]);

        assert!(matches!(
            unpack(&archive),
            Err(BundleError::MissingManifest { .. })
        ));
    }

    #[test]
    fn test_unpack_digest_mismatch() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        let mut manifest = Manifest::new();
        manifest.set(LAYERS_KEY, "microprofile");
        manifest.set(crate::PATCH_DIGEST_KEY, "0".repeat(64));
        let manifest = manifest.to_text().into_bytes();
        write_zip(
            &archive,
            &[(MANIFEST_PATH, &manifest), ("patch.zip", b"PATCH")],
        );

        assert!(matches!(
            unpack(&archive),
            Err(BundleError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_unpack_rejects_escaping_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        write_zip(
            &archive,
            &[("patch.zip", b"PATCH"), ("../escape.txt", b"evil")],
        );

        assert!(matches!(
            unpack(&archive),
            Err(BundleError::UnsafeEntryPath(_))
        ));
        assert!(!temp.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_close_removes_scratch() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        let manifest = manifest_bytes("microprofile");
        write_zip(
            &archive,
            &[(MANIFEST_PATH, &manifest), ("patch.zip", b"PATCH")],
        );

        let unpacked = unpack(&archive).unwrap();
        let scratch = unpacked.scratch_dir().to_path_buf();
        assert!(scratch.exists());

        unpacked.close().unwrap();
        assert!(!scratch.exists());
    }

    #[test]
    fn test_summary_lists_added_configs() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("installer.jar");
        let manifest = manifest_bytes("a,b");
        write_zip(
            &archive,
            &[
                (MANIFEST_PATH, &manifest),
                ("patch.zip", b"PATCH"),
                ("added-configs/docs/README.txt", b"hi"),
            ],
        );

        let summary = ArchiveSummary::open(&archive).unwrap();
        assert!(summary.has_patch);
        assert_eq!(summary.added_configs, vec!["docs/README.txt"]);
        assert_eq!(
            summary.manifest.unwrap().layers().unwrap(),
            vec!["a", "b"]
        );
    }
}
