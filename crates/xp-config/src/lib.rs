//! Expansion-pack installer configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for `installer.toml`
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation

pub mod resolve;
pub mod settings;
pub mod validate;

pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use settings::{BundleSettings, InstallerConfig, ServerSettings};
pub use validate::{validate_config, ValidationError, ValidationResult};

use std::path::Path;

/// Name of the configuration file looked up in config directories.
pub const CONFIG_FILENAME: &str = "installer.toml";

/// Resolve, load and validate the installer configuration.
///
/// Falls back to built-in defaults when no file is found.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<(InstallerConfig, ConfigPaths)> {
    let paths = resolve_config(cli_path);
    let config = match &paths.config {
        Some(path) => InstallerConfig::from_file(path)?,
        None => InstallerConfig::default(),
    };
    validate_config(&config)?;
    Ok((config, paths))
}
