//! Error types for archive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing installer archives.
#[derive(Error, Debug)]
pub enum BundleError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a specific path
    #[error("I/O error on {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive carries no patch payload
    #[error("{archive} does not contain the patch to install")]
    MissingPatch { archive: PathBuf },

    /// The archive carries no manifest
    #[error("{archive} has no {manifest} entry")]
    MissingManifest {
        archive: PathBuf,
        manifest: &'static str,
    },

    /// Required manifest key is absent
    #[error("no '{0}' entry found in the manifest")]
    MissingManifestKey(String),

    /// Manifest text could not be parsed
    #[error("malformed manifest at line {line}: {message}")]
    MalformedManifest { line: usize, message: String },

    /// Layer list is empty or otherwise unusable
    #[error("invalid layer list '{0}'")]
    InvalidLayerList(String),

    /// Entry name would escape the extraction root
    #[error("archive entry '{0}' has an unsafe path")]
    UnsafeEntryPath(String),

    /// Patch payload does not match the digest recorded in the manifest
    #[error("patch digest mismatch: manifest records {expected}, payload is {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Nothing to write
    #[error("archive has no content to write")]
    EmptyArchive,
}

impl BundleError {
    pub(crate) fn path_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BundleError::PathIo {
            path: path.into(),
            source,
        }
    }

    /// True when the archive itself is malformed rather than unreadable.
    pub fn is_malformed_archive(&self) -> bool {
        matches!(
            self,
            BundleError::Zip(_)
                | BundleError::MissingPatch { .. }
                | BundleError::MissingManifest { .. }
                | BundleError::MissingManifestKey(_)
                | BundleError::MalformedManifest { .. }
                | BundleError::InvalidLayerList(_)
                | BundleError::UnsafeEntryPath(_)
                | BundleError::DigestMismatch { .. }
        )
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, BundleError>;
