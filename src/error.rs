//! Crate-level error types for the command line surface.
//!
//! The orchestration core has its own taxonomy in [`crate::orchestrator::error`];
//! this module wraps it together with the configuration and IO failures of the
//! CLI.

use crate::orchestrator::{DistributeError, StartupError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Main error type for CLI operations
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Backends could not be brought up
    #[error("{0}")]
    Startup(#[from] StartupError),

    /// Final bundles could not be produced
    #[error("{0}")]
    Distribute(#[from] DistributeError),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// A path argument could not be made absolute
    #[error("Invalid path {}: {reason}", path.display())]
    InvalidPath {
        /// Path as given
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

impl OrchestratorError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cli(_) => 2,
            _ => 1,
        }
    }
}
