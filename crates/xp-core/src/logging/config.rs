//! Logging configuration.
//!
//! Resolved from `XP_LOG` / `XP_LOG_FORMAT` / `XP_LOG_TIMESTAMPS`, then overridden by the
//! `-v`/`-q` and `--log-format` flags.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Level override variable.
pub const ENV_LOG: &str = "XP_LOG";
/// Format override variable.
pub const ENV_LOG_FORMAT: &str = "XP_LOG_FORMAT";
/// Set to `0` or `false` to drop timestamps from human output.
pub const ENV_LOG_TIMESTAMPS: &str = "XP_LOG_TIMESTAMPS";

/// Where log records are rendered for humans or for machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("unknown log format '{}' (expected human or jsonl)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum level that is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Off,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower == "warning" {
            return Ok(LogLevel::Warn);
        }
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == lower)
            .ok_or_else(|| format!("unknown log level '{}'", s))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human output with a timestamp. JSON lines always carry one.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment, then apply CLI overrides.
    ///
    /// `XP_LOG` takes a plain level name; filter directives go through
    /// `RUST_LOG` and are handled by the subscriber directly.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Same as [`LogConfig::from_env`] with an explicit variable lookup.
    /// Unparseable values are ignored.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let defaults = LogConfig::default();
        let level = cli_level
            .or_else(|| lookup(ENV_LOG).and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.level);
        let format = cli_format
            .or_else(|| lookup(ENV_LOG_FORMAT).and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.format);
        let timestamps = lookup(ENV_LOG_TIMESTAMPS)
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.timestamps);
        LogConfig {
            format,
            level,
            timestamps,
        }
    }

    /// Level implied by `-v`/`-q`. Quiet wins over any verbosity.
    pub fn level_from_verbosity(verbose: u8, quiet: bool) -> LogLevel {
        match (quiet, verbose) {
            (true, _) => LogLevel::Error,
            (false, 0) => LogLevel::Info,
            (false, 1) => LogLevel::Debug,
            (false, _) => LogLevel::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_level() {
        for level in LogLevel::ALL {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_env_values_apply() {
        let config = LogConfig::resolve(
            env(&[(ENV_LOG, "debug"), (ENV_LOG_FORMAT, "jsonl")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Jsonl);
    }

    #[test]
    fn test_cli_beats_env() {
        let config = LogConfig::resolve(
            env(&[(ENV_LOG, "debug"), (ENV_LOG_FORMAT, "jsonl")]),
            Some(LogLevel::Error),
            Some(LogFormat::Human),
        );
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn test_timestamps_can_be_disabled() {
        let config = LogConfig::resolve(env(&[(ENV_LOG_TIMESTAMPS, "false")]), None, None);
        assert!(!config.timestamps);
        assert!(LogConfig::resolve(env(&[]), None, None).timestamps);
    }

    #[test]
    fn test_bad_env_value_ignored() {
        let config = LogConfig::resolve(env(&[(ENV_LOG, "shouty")]), None, None);
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_level_from_verbosity() {
        assert_eq!(LogConfig::level_from_verbosity(0, false), LogLevel::Info);
        assert_eq!(LogConfig::level_from_verbosity(1, false), LogLevel::Debug);
        assert_eq!(LogConfig::level_from_verbosity(4, false), LogLevel::Trace);
        assert_eq!(LogConfig::level_from_verbosity(2, true), LogLevel::Error);
    }
}
