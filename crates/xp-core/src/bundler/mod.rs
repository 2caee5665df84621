//! Building installer archives.
//!
//! [`PatchAssembler`] takes the core runtime template archive, stamps its
//! manifest with the layer key and the payload digest, injects the patch
//! payload and added configuration, and re-zips the result.

pub mod sources;
pub mod template;

pub use sources::{Materialized, PatchSource, TemplateSource};
pub use template::{create_patch_config, PatchVersion};

use crate::error::{InstallError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use xp_bundle::manifest::sha256_file;
use xp_bundle::{
    extract_all, ArchiveWriter, Manifest, ADDED_CONFIGS_DIR, MANIFEST_PATH, PATCH_DIGEST_KEY,
    PATCH_ENTRY,
};
use xp_config::validate::validate_layer_name;

/// A configuration file to ship under `added-configs/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedConfig {
    /// Path relative to the installation root, preserved in the archive.
    pub relative: PathBuf,
    /// File to read the content from.
    pub source: PathBuf,
}

impl AddedConfig {
    /// Resolve `relative` against `config_root`.
    ///
    /// Absolute paths and paths with `..` are rejected; the source file
    /// must exist.
    pub fn resolve(config_root: &Path, relative: &Path) -> Result<Self> {
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        let normalized: PathBuf = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        if !plain || normalized.as_os_str().is_empty() {
            return Err(InstallError::InvalidArgument(format!(
                "added configuration {} must be a relative path inside the configuration root",
                relative.display()
            )));
        }

        let source = config_root.join(&normalized);
        if !source.is_file() {
            return Err(InstallError::ConfigFileNotFound { path: source });
        }
        Ok(Self {
            relative: normalized,
            source,
        })
    }
}

/// What [`PatchAssembler::assemble`] produced.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub layers: Vec<String>,
    /// Whether the template manifest lacked the layer key.
    pub layer_key_added: bool,
    pub patch_sha256: String,
    pub entries: usize,
    pub added_configs: usize,
}

/// Builds installer archives from one core runtime template.
#[derive(Debug, Clone)]
pub struct PatchAssembler {
    template: PathBuf,
    default_layer: String,
}

impl PatchAssembler {
    pub fn new(template: impl Into<PathBuf>, default_layer: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            default_layer: default_layer.into(),
        }
    }

    /// Assemble an installer archive at `output_path`.
    ///
    /// The scratch directory is removed whether or not assembly succeeds.
    pub fn assemble(
        &self,
        patch_payload: &Path,
        added_configs: &[AddedConfig],
        output_path: &Path,
    ) -> Result<AssemblyReport> {
        if !patch_payload.is_file() {
            return Err(InstallError::MissingPayload(format!(
                "{} does not exist",
                patch_payload.display()
            )));
        }
        validate_layer_name(&self.default_layer)
            .map_err(|_| InstallError::InvalidLayerName(self.default_layer.clone()))?;

        let scratch = tempfile::Builder::new()
            .prefix("xp-bundle")
            .tempdir()
            .map_err(|e| InstallError::io(std::env::temp_dir(), e))?;

        let result = self.assemble_in(scratch.path(), patch_payload, added_configs, output_path);

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(
                target: "bundle.cleanup",
                path = %scratch_path.display(),
                error = %e,
                "Failed to remove scratch directory"
            );
        }
        result
    }

    fn assemble_in(
        &self,
        scratch: &Path,
        patch_payload: &Path,
        added_configs: &[AddedConfig],
        output_path: &Path,
    ) -> Result<AssemblyReport> {
        extract_all(&self.template, scratch)?;

        let manifest_path = scratch.join(MANIFEST_PATH);
        let mut manifest = if manifest_path.is_file() {
            Manifest::read_from(&manifest_path)?
        } else {
            Manifest::new()
        };
        let layer_key_added = manifest.ensure_layer_key(&self.default_layer);
        let layers = manifest.layers()?;
        for layer in &layers {
            validate_layer_name(layer).map_err(|_| InstallError::InvalidLayerName(layer.clone()))?;
        }

        let patch_target = scratch.join(PATCH_ENTRY);
        fs::copy(patch_payload, &patch_target).map_err(|e| InstallError::io(patch_payload, e))?;
        let patch_sha256 = sha256_file(&patch_target)?;
        manifest.set(PATCH_DIGEST_KEY, patch_sha256.clone());
        manifest.write_to(&manifest_path)?;

        let added_root = scratch.join(ADDED_CONFIGS_DIR);
        for config in added_configs {
            if !config.source.is_file() {
                return Err(InstallError::ConfigFileNotFound {
                    path: config.source.clone(),
                });
            }
            let dest = added_root.join(&config.relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
            }
            fs::copy(&config.source, &dest).map_err(|e| InstallError::io(&config.source, e))?;
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_output_dir(parent)?;
        }

        let mut writer = ArchiveWriter::new();
        writer.add_tree(scratch)?;
        let written = writer.write(output_path)?;

        info!(
            target: "bundle.written",
            output = %written.path.display(),
            layers = %layers.join(","),
            layer_key_added,
            added_configs = added_configs.len(),
            "Installer archive assembled"
        );

        Ok(AssemblyReport {
            output: written.path,
            layers,
            layer_key_added,
            patch_sha256,
            entries: written.entries.len(),
            added_configs: added_configs.len(),
        })
    }
}

/// Create `dir` if absent; fail if something other than a directory is there.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(InstallError::InvalidArgument(format!(
                "output directory {} exists and is not a directory",
                dir.display()
            )));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| InstallError::io(dir, e))
}
