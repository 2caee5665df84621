//! Expansion-pack installer core library.
//!
//! This library provides:
//! - The installer pipeline: layer provisioning, configuration overlay and
//!   patch application through an embedded server, with rollback
//! - The bundler pipeline that builds installer archives
//! - Exit codes, error types and logging for the `xp-installer` binary
//!
//! The binary entry point is in `main.rs`.

pub mod bundler;
pub mod error;
pub mod exit_codes;
pub mod fsutil;
pub mod installer;
pub mod logging;

pub use error::{InstallError, Result};

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
