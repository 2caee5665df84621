//! Installation state machine.
//!
//! ```text
//! Start → Provisioned → ServerStarted → SessionOpen → VersionChecked → PatchApplied → Done
//!   └────────────┴──────────────┴──────────────┴──────────────┴──────────→ Failed
//! ```
//!
//! Every path created on disk is recorded in a [`MutationLedger`]. Any
//! failure stops the server (closing the session first) and then deletes
//! the recorded paths newest first. Overlaid configuration files are never
//! rolled back.

use super::layers;
use super::ledger::{MutationLedger, RollbackReport};
use super::location::TargetInstallation;
use super::overlay::{overlay, OverlayedFile};
use super::protocol::{Operation, BASE_PATCH_ID};
use super::server::{AdminSession, ServerGuard, ServerLauncher, ServerSpec};
use crate::error::{InstallError, Result};
use crate::exit_codes::ExitCode;
use crate::fsutil::delete_tree;
use crate::logging::generate_attempt_id;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, info_span, warn};
use xp_bundle::UnpackedArchive;

/// States of one install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Start,
    Provisioned,
    ServerStarted,
    SessionOpen,
    VersionChecked,
    PatchApplied,
    Done,
    Failed,
}

impl std::fmt::Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InstallState::Start => "start",
            InstallState::Provisioned => "provisioned",
            InstallState::ServerStarted => "server-started",
            InstallState::SessionOpen => "session-open",
            InstallState::VersionChecked => "version-checked",
            InstallState::PatchApplied => "patch-applied",
            InstallState::Done => "done",
            InstallState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub attempt_id: String,
    pub state: InstallState,
    pub trace: Vec<InstallState>,
    pub layers: Vec<String>,
    pub product_version: Option<String>,
    /// Layer directories and `layers.conf`, in creation order.
    pub created_paths: Vec<PathBuf>,
    pub overlaid: Vec<OverlayedFile>,
}

/// A failed install, after rollback.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct InstallFailure {
    pub error: InstallError,
    pub attempt_id: String,
    /// Last state reached before the failure.
    pub failed_in: InstallState,
    /// States visited, ending in [`InstallState::Failed`].
    pub trace: Vec<InstallState>,
    pub rollback: RollbackReport,
    /// Configuration files left in place.
    pub overlaid: Vec<OverlayedFile>,
}

impl InstallFailure {
    pub fn exit_code(&self) -> ExitCode {
        self.error.exit_code()
    }
}

struct Attempt {
    id: String,
    trace: Vec<InstallState>,
    ledger: MutationLedger,
    layers: Vec<String>,
    product_version: Option<String>,
    overlaid: Vec<OverlayedFile>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            id: generate_attempt_id(),
            trace: vec![InstallState::Start],
            ledger: MutationLedger::new(),
            layers: Vec::new(),
            product_version: None,
            overlaid: Vec::new(),
        }
    }

    fn state(&self) -> InstallState {
        self.trace.last().copied().unwrap_or(InstallState::Start)
    }

    fn advance(&mut self, next: InstallState) {
        info!(
            target: "install.state",
            from = %self.state(),
            to = %next,
            "Install state changed"
        );
        self.trace.push(next);
    }
}

/// Drives one install attempt against a target installation.
pub struct InstallationOrchestrator<'a> {
    target: TargetInstallation,
    launcher: &'a dyn ServerLauncher,
    /// Deletes one created path during rollback.
    remove: fn(&Path) -> io::Result<()>,
}

impl<'a> InstallationOrchestrator<'a> {
    pub fn new(target: TargetInstallation, launcher: &'a dyn ServerLauncher) -> Self {
        Self {
            target,
            launcher,
            remove: delete_tree,
        }
    }

    #[cfg(test)]
    fn with_remover(mut self, remove: fn(&Path) -> io::Result<()>) -> Self {
        self.remove = remove;
        self
    }

    pub fn target(&self) -> &TargetInstallation {
        &self.target
    }

    /// Unpack `archive_path` and install it. The scratch directory is
    /// removed on every exit path.
    pub fn install_archive(
        &self,
        archive_path: &Path,
    ) -> std::result::Result<InstallReport, InstallFailure> {
        let unpacked = match xp_bundle::unpack(archive_path) {
            Ok(unpacked) => unpacked,
            Err(e) => return Err(self.fail(Attempt::new(), e.into())),
        };

        let result = self.install(&unpacked);

        if let Err(e) = unpacked.close() {
            warn!(target: "install.cleanup", error = %e, "Failed to remove scratch directory");
        }
        result
    }

    /// Install an already unpacked archive.
    pub fn install(
        &self,
        archive: &UnpackedArchive,
    ) -> std::result::Result<InstallReport, InstallFailure> {
        let mut attempt = Attempt::new();
        let span = info_span!(
            "install",
            attempt = %attempt.id,
            home = %self.target.home().display()
        );
        let _enter = span.enter();

        match self.drive(archive, &mut attempt) {
            Ok(()) => {
                info!(
                    target: "install.complete",
                    layers = %attempt.layers.join(","),
                    product_version = attempt.product_version.as_deref().unwrap_or("unknown"),
                    "Expansion pack installed"
                );
                Ok(InstallReport {
                    state: attempt.state(),
                    created_paths: attempt.ledger.paths(),
                    attempt_id: attempt.id,
                    trace: attempt.trace,
                    layers: attempt.layers,
                    product_version: attempt.product_version,
                    overlaid: attempt.overlaid,
                })
            }
            Err(e) => Err(self.fail(attempt, e)),
        }
    }

    fn drive(&self, archive: &UnpackedArchive, attempt: &mut Attempt) -> Result<()> {
        let modules_root = self.target.modules_root();
        attempt.layers = archive.layers()?;

        layers::provision(&attempt.layers, &modules_root, &mut attempt.ledger)?;
        attempt.overlaid = overlay(&archive.added_configs_dir(), self.target.home())?;
        attempt.advance(InstallState::Provisioned);

        let spec = ServerSpec {
            home: self.target.home().to_path_buf(),
            module_path: modules_root,
        };
        let mut server = ServerGuard::new(self.launcher.start(&spec)?);
        attempt.advance(InstallState::ServerStarted);

        let outcome = run_session(&mut server, archive, attempt);
        let stopped = server.stop();

        match (outcome, stopped) {
            (Err(e), Err(stop_err)) => {
                warn!(target: "install.server_stop", error = %stop_err, "Failed to stop server");
                return Err(e);
            }
            (Err(e), Ok(())) => return Err(e),
            (Ok(()), Err(stop_err)) => {
                warn!(
                    target: "install.server_stop",
                    error = %stop_err,
                    "Patch applied but the server did not stop cleanly"
                );
            }
            (Ok(()), Ok(())) => {}
        }

        attempt.advance(InstallState::Done);
        Ok(())
    }

    fn fail(&self, mut attempt: Attempt, error: InstallError) -> InstallFailure {
        let failed_in = attempt.state();
        error!(
            target: "install.failed",
            state = %failed_in,
            error = %error,
            "Install failed"
        );

        let rollback = if attempt.ledger.is_empty() {
            RollbackReport::default()
        } else {
            info!(
                target: "install.rollback",
                paths = attempt.ledger.len(),
                "Rolling back created paths"
            );
            std::mem::take(&mut attempt.ledger).rollback_with(self.remove)
        };
        for (path, reason) in &rollback.failures {
            warn!(
                target: "install.rollback",
                path = %path.display(),
                reason = %reason,
                "Created path left behind"
            );
        }

        attempt.trace.push(InstallState::Failed);
        InstallFailure {
            error,
            attempt_id: attempt.id,
            failed_in,
            trace: attempt.trace,
            rollback,
            overlaid: attempt.overlaid,
        }
    }
}

fn run_session(
    server: &mut ServerGuard,
    archive: &UnpackedArchive,
    attempt: &mut Attempt,
) -> Result<()> {
    let mut session = server.open_session()?;
    attempt.advance(InstallState::SessionOpen);

    let applied = apply_patch(session.as_mut(), &archive.patch_path(), attempt);
    let closed = session.close();

    applied?;
    if let Err(e) = closed {
        warn!(target: "install.session", error = %e, "Failed to close management session");
    }
    Ok(())
}

fn apply_patch(
    session: &mut dyn AdminSession,
    patch_path: &Path,
    attempt: &mut Attempt,
) -> Result<()> {
    let version = session.execute(&Operation::read_product_version())?;
    if !version.is_success() {
        return Err(InstallError::Session(format!(
            "reading product-version failed: {}",
            version.failure_text()
        )));
    }
    let product_version = version.result_text();
    info!(target: "install.version", product_version = %product_version, "Server version");
    attempt.product_version = Some(product_version);

    let patch_id = session.execute(&Operation::read_cumulative_patch_id())?;
    if !patch_id.is_success() {
        return Err(InstallError::Session(format!(
            "reading cumulative-patch-id failed: {}",
            patch_id.failure_text()
        )));
    }
    let patch_id = patch_id.result_text();
    if patch_id != BASE_PATCH_ID {
        return Err(InstallError::NotPristine {
            reason: format!(
                "cumulative patch id is '{}', expected '{}'",
                patch_id, BASE_PATCH_ID
            ),
        });
    }
    attempt.advance(InstallState::VersionChecked);

    let response = session.execute(&Operation::patch(patch_path))?;
    if !response.is_success() {
        return Err(InstallError::PatchApplication(response.failure_text()));
    }
    info!(target: "install.patch_applied", patch = %patch_path.display(), "Patch applied");
    attempt.advance(InstallState::PatchApplied);
    Ok(())
}
