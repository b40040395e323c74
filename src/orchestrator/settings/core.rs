//! Core Config struct and derived backend endpoints.

use super::Platform;
use crate::orchestrator::error::RequestError;
use crate::orchestrator::readiness::RetryPolicy;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// How to launch the framework packager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagerSettings {
    /// Program resolved on `PATH` (e.g. `node`).
    pub command: String,

    /// Packager CLI script passed as the first argument, checked for existence.
    pub script: Option<PathBuf>,

    /// Extra arguments placed before the `start` subcommand.
    pub extra_args: Vec<String>,
}

impl Default for PackagerSettings {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            script: Some(PathBuf::from("node_modules/react-native/local-cli/cli.js")),
            extra_args: Vec::new(),
        }
    }
}

/// Immutable orchestrator configuration, constructed via [`ConfigBuilder`](super::ConfigBuilder).
///
/// # See Also
///
/// - [`Endpoints`] - Backend URLs derived from this config
#[derive(Clone, Debug)]
pub struct Config {
    pub(super) hostname: String,
    pub(super) port: u16,
    pub(super) bundler_port: u16,
    pub(super) packager_port: u16,
    pub(super) entries: BTreeMap<Platform, String>,
    pub(super) hot: bool,
    pub(super) reset_cache: bool,
    pub(super) haste_externals: bool,
    pub(super) project_roots: Vec<PathBuf>,
    pub(super) roots: Vec<PathBuf>,
    pub(super) asset_roots: Vec<PathBuf>,
    pub(super) entry_dir: PathBuf,
    pub(super) packager: PackagerSettings,
    pub(super) retry: RetryPolicy,
    pub(super) bundler: toml::Table,
}

impl Config {
    /// Hostname shared by the listener and both backends.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Port of this server's own listener. `0` picks an ephemeral port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Port the module bundler serves compiled code on.
    pub fn bundler_port(&self) -> u16 {
        self.bundler_port
    }

    /// Port the framework packager listens on.
    pub fn packager_port(&self) -> u16 {
        self.packager_port
    }

    /// Platforms being served, in stable order.
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.entries.keys().copied()
    }

    /// Entry module name for `platform`, if served.
    pub fn entry_for(&self, platform: Platform) -> Option<&str> {
        self.entries.get(&platform).map(String::as_str)
    }

    /// Platform -> entry module name mapping.
    pub fn entries(&self) -> &BTreeMap<Platform, String> {
        &self.entries
    }

    /// Hot module replacement enabled.
    pub fn hot(&self) -> bool {
        self.hot
    }

    /// Ask the packager to drop its cache on start.
    pub fn reset_cache(&self) -> bool {
        self.reset_cache
    }

    /// Expose the framework's internal Haste modules as externals.
    pub fn haste_externals(&self) -> bool {
        self.haste_externals
    }

    /// Packager project roots.
    pub fn project_roots(&self) -> &[PathBuf] {
        &self.project_roots
    }

    /// Additional packager roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Packager asset roots.
    pub fn asset_roots(&self) -> &[PathBuf] {
        &self.asset_roots
    }

    /// Scratch entry directory.
    pub fn entry_dir(&self) -> &Path {
        &self.entry_dir
    }

    /// Packager launch settings.
    pub fn packager(&self) -> &PackagerSettings {
        &self.packager
    }

    /// Port polling policy for the packager.
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Module bundler configuration. Opaque to the core.
    pub fn bundler(&self) -> &toml::Table {
        &self.bundler
    }

    /// `host:port` of the framework packager.
    pub fn packager_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.packager_port)
    }

    /// `host:port` of the module bundler.
    pub fn bundler_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.bundler_port)
    }

    /// Resolves the platform a request is for.
    ///
    /// The `platform` query parameter wins. Without one, the platform whose entry
    /// name equals `entry_name` is used. Anything else is an unknown platform.
    pub fn resolve_platform(
        &self,
        requested: Option<&str>,
        entry_name: &str,
    ) -> Result<Platform, RequestError> {
        match requested {
            Some(name) => name
                .parse::<Platform>()
                .ok()
                .filter(|platform| self.entries.contains_key(platform))
                .ok_or_else(|| RequestError::UnknownPlatform(name.to_string())),
            None => self
                .entries
                .iter()
                .find(|(_, entry)| entry.as_str() == entry_name)
                .map(|(platform, _)| *platform)
                .ok_or_else(|| RequestError::UnknownPlatform(entry_name.to_string())),
        }
    }
}

/// Backend URLs, computed once from [`Config`].
#[derive(Clone, Debug)]
pub struct Endpoints {
    packager: Url,
    bundler: Url,
    entries: BTreeMap<Platform, String>,
}

impl Endpoints {
    /// Derives the endpoints for `config`.
    pub fn new(config: &Config) -> Result<Self, url::ParseError> {
        Ok(Self {
            packager: base_url(config.hostname(), config.packager_port())?,
            bundler: base_url(config.hostname(), config.bundler_port())?,
            entries: config.entries.clone(),
        })
    }

    /// Framework code for `platform`, with the forwarded query string.
    pub fn framework_code(&self, platform: Platform, query: Option<&str>) -> String {
        self.packager_resource(platform, "bundle", query)
    }

    /// Framework source map for `platform`, with the forwarded query string.
    pub fn framework_map(&self, platform: Platform, query: Option<&str>) -> String {
        self.packager_resource(platform, "map", query)
    }

    /// Application code compiled by the module bundler.
    pub fn app_code(&self, platform: Platform) -> String {
        self.bundler_resource(platform, "js")
    }

    /// Application source map compiled by the module bundler.
    pub fn app_map(&self, platform: Platform) -> String {
        self.bundler_resource(platform, "js.map")
    }

    fn packager_resource(&self, platform: Platform, ext: &str, query: Option<&str>) -> String {
        let mut url = self.packager.clone();
        url.set_path(&format!("{}.{}", platform.scratch_entry_name(), ext));
        url.set_query(query.filter(|q| !q.is_empty()));
        url.to_string()
    }

    fn bundler_resource(&self, platform: Platform, ext: &str) -> String {
        let entry = self
            .entries
            .get(&platform)
            .map(String::as_str)
            .unwrap_or_else(|| platform.as_str());
        let mut url = self.bundler.clone();
        url.set_path(&format!("{}.{}", entry, ext));
        url.to_string()
    }
}

fn base_url(hostname: &str, port: u16) -> Result<Url, url::ParseError> {
    Url::parse(&format!("http://{}:{}/", hostname, port))
}
