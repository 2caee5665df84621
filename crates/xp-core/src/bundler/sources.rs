//! Where the bundler gets its inputs: the core runtime template archive
//! and the patch payload.
//!
//! Inputs that have to be fetched or generated land in temporary
//! directories owned by the returned value and disappear with it.

use crate::error::{InstallError, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

/// A file that may live in a temporary directory.
#[derive(Debug)]
pub struct Materialized {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl Materialized {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is temporary and will be removed on drop.
    pub fn is_temporary(&self) -> bool {
        self.scratch.is_some()
    }
}

fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| InstallError::io(std::env::temp_dir(), e))
}

// ============================================================================
// Template
// ============================================================================

/// The core runtime template archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Local(PathBuf),
    Remote(String),
}

impl TemplateSource {
    /// Interpret a CLI value: `http(s)://` URLs are remote, anything else a
    /// local path that must be an existing `.jar` or `.zip` file.
    pub fn parse(value: &str) -> Result<Self> {
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(TemplateSource::Remote(value.to_string()));
        }

        let path = PathBuf::from(value);
        if !path.exists() {
            return Err(InstallError::InvalidArgument(format!(
                "installer core {} does not exist",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(InstallError::InvalidArgument(format!(
                "installer core {} is not a file",
                path.display()
            )));
        }
        let archive_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if !archive_ext {
            return Err(InstallError::InvalidArgument(format!(
                "installer core {} is not a .jar or .zip file",
                path.display()
            )));
        }
        Ok(TemplateSource::Local(path))
    }

    /// Make the template available as a local file.
    pub fn materialize(&self) -> Result<Materialized> {
        match self {
            TemplateSource::Local(path) => Ok(Materialized {
                path: path.clone(),
                scratch: None,
            }),
            TemplateSource::Remote(url) => download(url),
        }
    }
}

fn download(url: &str) -> Result<Materialized> {
    let scratch = scratch_dir("xp-template")?;
    let name = url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty() && !n.contains(['?', '#']))
        .unwrap_or("installer-core.jar");
    let path = scratch.path().join(name);

    info!(target: "bundle.download", url = %url, "Downloading installer core");
    let response = ureq::get(url).call().map_err(|e| InstallError::Download {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let file = File::create(&path).map_err(|e| InstallError::io(&path, e))?;
    let mut out = BufWriter::new(file);
    let bytes = io::copy(&mut response.into_reader(), &mut out)
        .and_then(|n| out.flush().map(|_| n))
        .map_err(|e| InstallError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    debug!(path = %path.display(), bytes, "Downloaded installer core");

    Ok(Materialized {
        path,
        scratch: Some(scratch),
    })
}

// ============================================================================
// Patch payload
// ============================================================================

/// Where the patch payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
    /// An existing patch file.
    File(PathBuf),
    /// Run `command args... --output-file=<tmp>` to produce one.
    Generate { command: String, args: Vec<String> },
}

impl PatchSource {
    pub fn materialize(&self) -> Result<Materialized> {
        match self {
            PatchSource::File(path) => {
                if !path.is_file() {
                    return Err(InstallError::MissingPayload(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                Ok(Materialized {
                    path: path.clone(),
                    scratch: None,
                })
            }
            PatchSource::Generate { command, args } => generate(command, args),
        }
    }
}

fn generate(command: &str, args: &[String]) -> Result<Materialized> {
    let scratch = scratch_dir("xp-patch")?;
    let output = scratch.path().join("patch.zip");

    info!(target: "bundle.patch_generate", command = %command, "Generating patch");
    let status = Command::new(command)
        .args(args)
        .arg(format!("--output-file={}", output.display()))
        .status()
        .map_err(|e| {
            InstallError::MissingPayload(format!("failed to run patch generator {}: {}", command, e))
        })?;

    if !status.success() {
        return Err(InstallError::MissingPayload(format!(
            "patch generator {} exited with {}",
            command, status
        )));
    }
    if !output.is_file() {
        return Err(InstallError::MissingPayload(format!(
            "patch generator {} did not write {}",
            command,
            output.display()
        )));
    }

    Ok(Materialized {
        path: output,
        scratch: Some(scratch),
    })
}
