//! Installer archive format for expansion-pack installers.
//!
//! An installer archive is a ZIP container that carries everything needed to
//! apply an expansion pack to an existing server installation.
//!
//! # Archive Format
//!
//! - `META-INF/MANIFEST.MF`: JAR-style manifest; `server-target-layers` lists
//!   the module layers to create (comma-separated, order preserved)
//! - `patch.zip`: the opaque patch payload (exactly one)
//! - `added-configs/<relative-path>`: configuration files to overlay onto the
//!   installation, stored at their path relative to the installation root
//! - anything else the core runtime template ships (ignored by the installer)
//!
//! # Example
//!
//! ```no_run
//! use xp_bundle::{unpack, Manifest, DEFAULT_LAYER};
//! use std::path::Path;
//!
//! // Stamp the layer key into a manifest
//! let mut manifest = Manifest::new();
//! manifest.ensure_layer_key(DEFAULT_LAYER);
//!
//! // Unpack an installer archive into a scratch directory
//! let unpacked = unpack(Path::new("xp-installer.jar")).unwrap();
//! let layers = unpacked.layers().unwrap();
//! ```

pub mod error;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use error::{BundleError, Result};
pub use manifest::{parse_layer_list, Manifest};
pub use reader::{extract_all, unpack, ArchiveSummary, UnpackedArchive};
pub use writer::{ArchiveWriter, WrittenArchive};

/// Name of the patch payload entry.
pub const PATCH_ENTRY: &str = "patch.zip";

/// Directory prefix of added configuration entries.
pub const ADDED_CONFIGS_DIR: &str = "added-configs";

/// Location of the manifest inside the archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Manifest key listing the module layers to create.
pub const LAYERS_KEY: &str = "server-target-layers";

/// Manifest key holding the SHA-256 digest of the patch payload.
pub const PATCH_DIGEST_KEY: &str = "Patch-Sha256";

/// Layer name stamped into manifests that do not declare one.
pub const DEFAULT_LAYER: &str = "microprofile";
