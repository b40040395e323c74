//! Bundle orchestrator binary.
//!
//! Runs on a single-threaded runtime: the orchestrator's own work is I/O bound,
//! and compilation happens in the backend processes.

use bundle_orchestrator::cli;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
