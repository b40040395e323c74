//! Command line interface for the bundle orchestrator.
//!
//! - `start` serves bundles until interrupted
//! - `bundle` writes final bundles to disk and exits

mod args;
pub mod commands;
mod signal;

pub use args::{Args, BundleArgs, Command, CommonArgs, StartArgs};
pub use signal::shutdown_signal;

use crate::error::Result;

/// Main CLI entry point
///
/// Returns the process exit code.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    match &args.command {
        Command::Start(start) => commands::start::run(start).await,
        Command::Bundle(bundle) => commands::bundle::run(bundle).await,
    }
}
