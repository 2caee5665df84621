//! Locating installer.toml.

use crate::CONFIG_FILENAME;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file directly.
pub const ENV_CONFIG_PATH: &str = "XP_INSTALLER_CONFIG";
/// Environment variable naming a directory holding installer.toml.
pub const ENV_CONFIG_DIR: &str = "XP_INSTALLER_CONFIG_DIR";

const APP_NAME: &str = "xp-installer";

/// The configuration file chosen by [`resolve_config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// `None` when built-in defaults apply.
    pub config: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    CliArgument,
    /// `XP_INSTALLER_CONFIG` or `XP_INSTALLER_CONFIG_DIR`.
    Environment,
    XdgConfig,
    /// `/etc/xp-installer/`.
    SystemConfig,
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfigSource::CliArgument => "CLI argument",
            ConfigSource::Environment => "environment variable",
            ConfigSource::XdgConfig => "XDG config",
            ConfigSource::SystemConfig => "system config",
            ConfigSource::BuiltinDefault => "builtin default",
        })
    }
}

/// Resolve the configuration file path.
///
/// An explicit CLI path is returned even if it does not exist, so loading
/// reports it. Otherwise the first existing candidate wins:
/// `XP_INSTALLER_CONFIG`, `XP_INSTALLER_CONFIG_DIR/installer.toml`,
/// `~/.config/xp-installer/installer.toml`, `/etc/xp-installer/installer.toml`.
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    if let Some(path) = cli_path {
        return ConfigPaths {
            config: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    candidates()
        .into_iter()
        .find(|(path, _)| path.exists())
        .map(|(path, source)| ConfigPaths {
            config: Some(path),
            source,
        })
        .unwrap_or_default()
}

fn candidates() -> Vec<(PathBuf, ConfigSource)> {
    let env_file = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
    let env_dir = std::env::var_os(ENV_CONFIG_DIR).map(|d| PathBuf::from(d).join(CONFIG_FILENAME));
    let xdg = xdg_config_dir().map(|d| d.join(CONFIG_FILENAME));

    [
        (env_file, ConfigSource::Environment),
        (env_dir, ConfigSource::Environment),
        (xdg, ConfigSource::XdgConfig),
        (
            Some(system_config_dir().join(CONFIG_FILENAME)),
            ConfigSource::SystemConfig,
        ),
    ]
    .into_iter()
    .filter_map(|(path, source)| path.map(|p| (p, source)))
    .collect()
}

/// `~/.config/xp-installer` (or the platform equivalent).
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_cli_path_wins_even_if_missing() {
        let path = Path::new("/nonexistent/installer.toml");
        let paths = resolve_config(Some(path));
        assert_eq!(paths.source, ConfigSource::CliArgument);
        assert_eq!(paths.config.as_deref(), Some(path));
    }

    #[test]
    fn test_system_config_dir() {
        assert_eq!(system_config_dir(), PathBuf::from("/etc/xp-installer"));
    }
}
