//! Dev-time bundle orchestration.
//!
//! Two backends produce halves of one device bundle: the framework packager
//! (a supervised child process) compiles the framework, and the in-process
//! module bundler compiles the application. The [`Orchestrator`] brings both up
//! in order, holds client requests until they are ready, and serves the
//! concatenated script with one merged source map.
//!
//! Module map:
//! - [`settings`] - configuration, platforms, backend endpoints
//! - [`readiness`] - readiness gate, retry policy, startup sequencing
//! - [`compose`] - per-request fetch, strip and concatenation
//! - [`sourcemap`] - Source Map v3 parsing and merging
//! - [`module_bundler`] - module bundler interface and command-driven implementation
//! - [`scratch`] - scratch entry files read by the packager
//! - [`supervisor`] / [`packager`] - framework packager process
//! - [`distribute`] - writing final bundles to disk

pub mod compose;
pub mod distribute;
pub mod error;
pub mod module_bundler;
pub mod packager;
pub mod readiness;
pub mod scratch;
pub mod server;
pub mod settings;
pub mod sourcemap;
pub mod supervisor;
pub mod utils;

pub use compose::{BundleRequest, Composer, strip_source_map_directives};
pub use distribute::{DistributeError, DistributeOptions, write_bundles};
pub use error::{GateError, MalformedSourceMap, RequestError, StartupError};
pub use module_bundler::{
    BuildOutcome, BuildReport, BundlerHandle, BundlerInjections, BundlerSetup, CommandBundler,
    ExternalsResolver, FrameworkExternals, ModuleBundler,
};
pub use readiness::{Phase, ReadinessGate, RetryPolicy};
pub use scratch::ScratchEntries;
pub use server::Orchestrator;
pub use settings::{Config, ConfigBuilder, Endpoints, PackagerSettings, Platform};
pub use sourcemap::{SourceMap, SourceMapConcat, merge_source_maps};
pub use supervisor::Supervisor;
