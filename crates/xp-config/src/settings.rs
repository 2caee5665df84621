//! Typed installer settings.

use crate::validate::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level contents of `installer.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// How the embedded server host is launched and talked to.
    pub server: ServerSettings,

    /// Defaults for building installer archives.
    pub bundle: BundleSettings,
}

/// Server host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Executable that hosts the server in admin-only mode.
    pub host_command: String,

    /// Extra arguments appended after the standard ones.
    pub host_args: Vec<String>,

    /// Seconds to wait for the host to report readiness.
    pub startup_timeout_secs: u64,

    /// Seconds to wait for a clean exit before the host is killed.
    pub shutdown_timeout_secs: u64,

    /// Per-operation timeout; unset waits indefinitely.
    pub operation_timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host_command: "xp-server-host".to_string(),
            host_args: Vec::new(),
            startup_timeout_secs: 120,
            shutdown_timeout_secs: 30,
            operation_timeout_secs: None,
        }
    }
}

impl ServerSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

/// Bundler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleSettings {
    /// Layer stamped into manifests that do not declare any.
    pub default_layer: String,

    /// File name of the produced installer archive.
    pub archive_name: String,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            default_layer: "microprofile".to_string(),
            archive_name: "xp-installer.jar".to_string(),
        }
    }
}

impl InstallerConfig {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        content.parse()
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ValidationError> {
        toml::to_string_pretty(self).map_err(|e| ValidationError::ParseError(e.to_string()))
    }
}

impl std::str::FromStr for InstallerConfig {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|e| ValidationError::ParseError(e.to_string()))
    }
}
