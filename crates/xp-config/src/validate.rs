//! Configuration validation errors and semantic validation.

use crate::settings::InstallerConfig;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Largest accepted value for any `*_timeout_secs` setting (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

fn layer_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("layer name regex"))
}

/// Check that `name` is usable as a module layer directory name.
pub fn validate_layer_name(name: &str) -> ValidationResult<()> {
    if layer_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: "layer".to_string(),
            message: format!(
                "'{}' must start with a letter or digit and contain only letters, digits, '.', '_' or '-'",
                name
            ),
        })
    }
}

/// Validate installer configuration semantically.
pub fn validate_config(config: &InstallerConfig) -> ValidationResult<()> {
    if config.server.host_command.trim().is_empty() {
        return Err(ValidationError::MissingField("server.host_command".to_string()));
    }

    timeout("server.startup_timeout_secs", config.server.startup_timeout_secs)?;
    timeout("server.shutdown_timeout_secs", config.server.shutdown_timeout_secs)?;
    if let Some(secs) = config.server.operation_timeout_secs {
        timeout("server.operation_timeout_secs", secs)?;
    }

    validate_layer_name(&config.bundle.default_layer).map_err(|_| ValidationError::InvalidValue {
        field: "bundle.default_layer".to_string(),
        message: format!("'{}' is not a valid layer name", config.bundle.default_layer),
    })?;

    let archive_name = &config.bundle.archive_name;
    if archive_name.is_empty() || archive_name.contains(['/', '\\']) {
        return Err(ValidationError::InvalidValue {
            field: "bundle.archive_name".to_string(),
            message: format!("'{}' must be a plain file name", archive_name),
        });
    }

    Ok(())
}

fn timeout(field: &str, value: u64) -> ValidationResult<()> {
    if (1..=MAX_TIMEOUT_SECS).contains(&value) {
        return Ok(());
    }
    Err(ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("Must be between 1 and {}, got {}", MAX_TIMEOUT_SECS, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        validate_config(&InstallerConfig::default()).unwrap();
    }

    #[test]
    fn test_layer_names() {
        for ok in ["microprofile", "mp-2", "a.b_c", "9lives"] {
            validate_layer_name(ok).unwrap();
        }
        for bad in ["", "-lead", ".hidden", "a/b", "a b", ".."] {
            assert!(validate_layer_name(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = InstallerConfig::default();
        config.server.shutdown_timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "server.shutdown_timeout_secs"));
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let mut config = InstallerConfig::default();
        config.server.startup_timeout_secs = u64::MAX;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "server.startup_timeout_secs"));

        config.server.startup_timeout_secs = MAX_TIMEOUT_SECS;
        config.server.operation_timeout_secs = Some(MAX_TIMEOUT_SECS + 1);
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "server.operation_timeout_secs"));
    }

    #[test]
    fn test_empty_host_command_rejected() {
        let mut config = InstallerConfig::default();
        config.server.host_command = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_archive_name_with_separator_rejected() {
        let mut config = InstallerConfig::default();
        config.bundle.archive_name = "out/x.jar".to_string();
        assert!(validate_config(&config).is_err());
    }
}
