//! Locating and sanity-checking the target installation.

use crate::error::{InstallError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A server installation the expansion pack is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInstallation {
    home: PathBuf,
}

impl TargetInstallation {
    /// Check that `home` looks like a server installation.
    ///
    /// The home, its `modules` directory and `modules/system` must all exist.
    pub fn locate(home: &Path) -> Result<Self> {
        let home = require_dir(home, "server home")?;
        require_dir(&home.join("modules"), "modules directory")?;
        require_dir(&home.join("modules").join("system"), "system modules directory")?;
        Ok(Self { home })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `<home>/modules`, passed to the server as its module path.
    pub fn modules_root(&self) -> PathBuf {
        self.home.join("modules")
    }
}

fn require_dir(path: &Path, what: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(InstallError::InvalidArgument(format!(
            "{} {} does not exist or is not a directory",
            what,
            path.display()
        )));
    }
    fs::canonicalize(path).map_err(|e| InstallError::io(path, e))
}
