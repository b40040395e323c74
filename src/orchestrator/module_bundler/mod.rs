//! Module bundler collaborator interface.
//!
//! The module bundler compiles application code. The orchestrator treats it as
//! a black box: it hands over the externals map, the static asset rewrite rule
//! and an optional hot-reload banner, then waits for two signals from the
//! returned [`BundlerHandle`]: a successful build and a listening HTTP server
//! that serves `<entry>.js` and `<entry>.js.map`.
//!
//! - [`assets`] - static asset URI rewrite rule
//! - [`command`] - [`CommandBundler`], a bundler driven by an external build command
//! - [`externals`] - discovery of module names supplied by the framework

pub mod assets;
pub mod command;
pub mod externals;

pub use assets::AssetRewriteRule;
pub use command::CommandBundler;
pub use externals::{ExternalsResolver, FrameworkExternals, externals_map};

use super::error::StartupError;
use super::scratch::ScratchEntries;
use super::settings::Platform;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Raw banner prepended to entry chunks when hot reload is enabled.
pub const HOT_BANNER: &str = "if (typeof navigator.userAgent === 'undefined') {\n  \
     throw new Error('Hot module replacement only works with RCTWebSocketExecutor; use Cmd + D, \"Debug in Chrome\"');\n\
     }\n";

/// Configuration the orchestrator injects into the module bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundlerInjections {
    /// Module name -> external reference (e.g. `commonjs react-native`)
    pub externals: BTreeMap<String, String>,
    /// Rewrite for static asset requests
    pub asset_rule: AssetRewriteRule,
    /// Raw banner for entry chunks, only with hot reload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Source map module paths are absolute so device exception managers can load them
    pub devtool_module_filename_template: String,
}

impl BundlerInjections {
    /// Builds injections for the given externals.
    pub fn new(externals: BTreeMap<String, String>, hot: bool) -> Self {
        Self {
            externals,
            asset_rule: AssetRewriteRule::default(),
            banner: hot.then(|| HOT_BANNER.to_string()),
            devtool_module_filename_template: "[absolute-resource-path]".to_string(),
        }
    }
}

/// Everything a module bundler needs to start.
#[derive(Debug, Clone)]
pub struct BundlerSetup {
    /// Hostname to listen on
    pub hostname: String,
    /// Port to listen on
    pub port: u16,
    /// Opaque bundler configuration
    pub config: toml::Table,
    /// Orchestrator injections
    pub injections: BundlerInjections,
    /// Entry module name per platform
    pub entries: BTreeMap<Platform, String>,
    /// Hot module replacement enabled
    pub hot: bool,
    /// Scratch directory; the bundler may write auxiliary files into it
    pub scratch: ScratchEntries,
}

/// Summary of one successful build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Wall time of the build
    pub duration: Duration,
    /// Framework modules the application requires; they are added to the
    /// scratch entries so the packager includes them
    pub required_externals: BTreeSet<String>,
}

/// Result of one build; failures carry the bundler's diagnostic text.
pub type BuildOutcome = Result<BuildReport, String>;

/// Signals produced by a started bundler.
#[derive(Debug)]
pub struct BundlerHandle {
    /// One message per finished build. Closing the channel means the bundler stopped.
    pub builds: mpsc::UnboundedReceiver<BuildOutcome>,
    /// Fires once the HTTP listener accepts connections.
    pub listening: oneshot::Receiver<Result<(), String>>,
}

/// The in-process module bundler.
///
/// `start` must not block: it spawns its work on the current tokio runtime and
/// reports progress through the returned handle. `stop` must be synchronous and
/// idempotent, since it runs from `Orchestrator::stop` and `Drop`.
pub trait ModuleBundler: Send + 'static {
    /// Configures the bundler with `setup`, triggers a build and starts serving.
    fn start(&mut self, setup: BundlerSetup) -> Result<BundlerHandle, StartupError>;

    /// Stops building and serving.
    fn stop(&mut self);
}
