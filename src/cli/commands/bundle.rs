//! `bundle`: write final bundles for every served platform, then exit.

use crate::cli::args::BundleArgs;
use crate::error::Result;
use crate::orchestrator::{
    DistributeError, DistributeOptions, Orchestrator, RequestError, write_bundles,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Writes the bundles. The orchestrator is stopped whatever the outcome.
///
/// Returns 0 when every file was written, 1 otherwise.
pub async fn run(args: &BundleArgs) -> Result<i32> {
    let orchestrator = super::orchestrator(&args.common, false)?;
    let addr = orchestrator.start().await?;

    let options = DistributeOptions {
        optimize: !args.no_optimize,
        source_map: args.source_map,
    };
    let targets: Vec<(_, PathBuf)> = orchestrator
        .config()
        .platforms()
        .map(|platform| (platform, args.bundle_path(platform).to_path_buf()))
        .collect();

    let result = distribute(&orchestrator, addr, &targets, options).await;
    orchestrator.stop();

    match result {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(1)
        }
    }
}

async fn distribute(
    orchestrator: &Orchestrator,
    addr: SocketAddr,
    targets: &[(crate::orchestrator::Platform, PathBuf)],
    options: DistributeOptions,
) -> std::result::Result<Vec<PathBuf>, DistributeError> {
    orchestrator.ready().await.map_err(RequestError::from)?;
    write_bundles(addr, orchestrator.config(), targets, options).await
}
