//! `start`: run the development bundle server until interrupted.

use crate::cli::args::StartArgs;
use crate::cli::signal::shutdown_signal;
use crate::error::Result;

/// Starts the server and blocks until a termination signal or a startup failure.
///
/// Returns the process exit code.
pub async fn run(args: &StartArgs) -> Result<i32> {
    let orchestrator = super::orchestrator(&args.common, args.hot)?;
    let addr = orchestrator.start().await?;
    println!("Bundle server listening at http://{}", addr);

    let code = tokio::select! {
        _ = shutdown_signal() => 0,
        Err(e) = orchestrator.ready() => {
            eprintln!("Error: {}", e);
            1
        }
    };

    orchestrator.stop();
    Ok(code)
}
