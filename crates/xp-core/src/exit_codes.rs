//! Process exit codes for `xp-installer`.
//!
//! 0 is success, 10-19 are failures the operator can fix (arguments, target
//! state, archive content, the server's verdict), 20-29 are internal or
//! I/O failures. Scripts depend on these values; never renumber.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Clean = 0,

    /// Bad arguments or configuration.
    ArgsError = 10,
    /// The target already carries expansion-pack state or patches.
    NotPristine = 11,
    /// The installer archive is unusable.
    MalformedArchive = 12,
    /// An added configuration file or template is missing.
    ConfigNotFound = 13,
    /// The server rejected the patch.
    PatchFailed = 14,
    /// Server host or management session failure.
    ServerError = 15,

    InternalError = 20,
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Stable symbolic name, used in logs.
    pub fn code_name(self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::NotPristine => "ERR_NOT_PRISTINE",
            ExitCode::MalformedArchive => "ERR_ARCHIVE",
            ExitCode::ConfigNotFound => "ERR_CONFIG_NOT_FOUND",
            ExitCode::PatchFailed => "ERR_PATCH",
            ExitCode::ServerError => "ERR_SERVER",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
