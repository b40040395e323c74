//! Subcommand implementations.

pub mod bundle;
pub mod start;

use crate::cli::args::CommonArgs;
use crate::config_file::load_bundler_config;
use crate::error::Result;
use crate::orchestrator::{CommandBundler, FrameworkExternals, Orchestrator};
use std::sync::Arc;

/// Builds an orchestrator from the shared options and the bundler config file.
pub(crate) fn orchestrator(common: &CommonArgs, hot: bool) -> Result<Orchestrator> {
    let file = load_bundler_config(&common.config)?;
    let config = common.to_config(hot, file.table)?;
    let externals = FrameworkExternals::react_native(&common.project_root()?).with_extra(file.externals);

    Ok(Orchestrator::new(
        config,
        Box::new(CommandBundler::new()),
        Arc::new(externals),
    ))
}
