//! Installing an expansion pack onto an existing server installation.
//!
//! The pipeline is: locate the installation, unpack the installer archive,
//! provision layers, overlay added configuration, then apply the patch
//! through a management session on an embedded server.

pub mod layers;
pub mod ledger;
pub mod location;
pub mod orchestrator;
pub mod overlay;
pub mod protocol;
pub mod server;

pub use ledger::{MutationLedger, RollbackReport};
pub use location::TargetInstallation;
pub use orchestrator::{InstallFailure, InstallReport, InstallState, InstallationOrchestrator};
pub use overlay::OverlayedFile;
pub use protocol::{Operation, Response};
pub use server::{
    AdminSession, EmbeddedServer, ServerGuard, ServerLauncher, ServerSpec, StdioServerLauncher,
};
