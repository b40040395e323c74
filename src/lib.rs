//! Dev-time bundle orchestrator.
//!
//! Fuses the output of a framework packager and a module bundler into one
//! bundle and one merged source map, served over HTTP behind a readiness gate.
//!
//! It can be used both as a CLI tool and as a library dependency; see
//! [`orchestrator::Orchestrator`].

pub mod cli;
pub mod config_file;
pub mod error;
pub mod orchestrator;

// Re-export commonly used types
pub use error::{CliError, OrchestratorError, Result};
pub use orchestrator::{Config, ConfigBuilder, Orchestrator, Platform};
