//! Overlay of added configuration files onto the installation.
//!
//! Existing files are never replaced: incoming content that collides is
//! written beside the original with a millisecond timestamp suffix.
//! Overlaid files are left in place if the install later fails.

use crate::error::Result;
use crate::fsutil::copy_tree;
use std::path::{Path, PathBuf};
use tracing::info;

/// One added configuration file placed into the installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayedFile {
    /// Where the file was written.
    pub destination: PathBuf,
    /// Existing file that forced a timestamped name, if any.
    pub preserved: Option<PathBuf>,
}

/// Copy `source_tree` onto `target_root` without overwriting anything.
///
/// A missing source tree overlays nothing.
pub fn overlay(source_tree: &Path, target_root: &Path) -> Result<Vec<OverlayedFile>> {
    let copied = copy_tree(source_tree, target_root)?;

    let mut overlaid = Vec::with_capacity(copied.len());
    for file in copied {
        let destination = file.written_to;
        match &file.conflict_with {
            Some(existing) => info!(
                target: "install.overlay_renamed",
                existing = %existing.display(),
                incoming = %destination.display(),
                "{} already exists; the new version was written to {}",
                existing.display(),
                destination.display()
            ),
            None => info!(
                target: "install.overlay_copied",
                path = %destination.display(),
                "Added configuration file"
            ),
        }
        overlaid.push(OverlayedFile {
            destination,
            preserved: file.conflict_with,
        });
    }
    Ok(overlaid)
}
