//! Error types for installing and bundling expansion packs.

use crate::exit_codes::ExitCode;
use std::path::PathBuf;
use thiserror::Error;
use xp_bundle::BundleError;
use xp_config::ValidationError;

/// Errors raised by the installer and bundler pipelines.
///
/// Every variant is fatal for the current attempt.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The target installation already carries expansion-pack state
    #[error("installation is not pristine: {reason}")]
    NotPristine { reason: String },

    #[error("layer '{0}' is listed more than once")]
    DuplicateLayer(String),

    #[error("invalid layer name '{0}'")]
    InvalidLayerName(String),

    #[error("no layers to create")]
    EmptyLayerList,

    /// No patch payload available to bundle
    #[error("no patch payload: {0}")]
    MissingPayload(String),

    #[error("{} does not exist", path.display())]
    ConfigFileNotFound { path: PathBuf },

    /// The patch operation reported `failed`; carries the description verbatim
    #[error("{0}")]
    PatchApplication(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("management session error: {0}")]
    Session(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("configuration error: {0}")]
    Config(#[from] ValidationError),

    #[error("{0}")]
    InvalidArgument(String),
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn existing_path(path: impl Into<PathBuf>) -> Self {
        InstallError::NotPristine {
            reason: format!("{} already exists", path.into().display()),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            InstallError::NotPristine { .. } => ExitCode::NotPristine,
            InstallError::DuplicateLayer(_)
            | InstallError::InvalidLayerName(_)
            | InstallError::EmptyLayerList => ExitCode::MalformedArchive,
            InstallError::MissingPayload(_) | InstallError::InvalidArgument(_) => {
                ExitCode::ArgsError
            }
            InstallError::ConfigFileNotFound { .. } => ExitCode::ConfigNotFound,
            InstallError::PatchApplication(_) => ExitCode::PatchFailed,
            InstallError::Server(_) | InstallError::Session(_) => ExitCode::ServerError,
            InstallError::Io { .. } | InstallError::Download { .. } => ExitCode::IoError,
            InstallError::Config(_) => ExitCode::ArgsError,
            InstallError::Bundle(BundleError::EmptyArchive) => ExitCode::InternalError,
            InstallError::Bundle(e) if e.is_malformed_archive() => ExitCode::MalformedArchive,
            InstallError::Bundle(_) => ExitCode::IoError,
        }
    }
}

/// Result type alias for installer operations.
pub type Result<T> = std::result::Result<T, InstallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            InstallError::existing_path("/srv/modules/layers.conf").exit_code(),
            ExitCode::NotPristine
        );
        assert_eq!(
            InstallError::PatchApplication("conflicting module".into()).exit_code(),
            ExitCode::PatchFailed
        );
        assert_eq!(
            InstallError::Bundle(BundleError::EmptyArchive).exit_code(),
            ExitCode::InternalError
        );
        assert_eq!(
            InstallError::Bundle(BundleError::Io(std::io::Error::other("disk"))).exit_code(),
            ExitCode::IoError
        );
        assert_eq!(
            InstallError::Bundle(BundleError::InvalidLayerList(",".into())).exit_code(),
            ExitCode::MalformedArchive
        );
    }

    #[test]
    fn test_patch_failure_message_is_verbatim() {
        let err = InstallError::PatchApplication("conflicting module".into());
        assert_eq!(err.to_string(), "conflicting module");
    }

    #[test]
    fn test_not_pristine_names_path() {
        let err = InstallError::existing_path("/srv/modules/layers.conf");
        assert!(err.to_string().contains("/srv/modules/layers.conf"));
    }
}
