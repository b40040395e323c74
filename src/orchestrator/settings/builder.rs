//! Builder for constructing Config.

use super::{Config, PackagerSettings, Platform};
use crate::orchestrator::error::StartupError;
use crate::orchestrator::readiness::RetryPolicy;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Builder for constructing [`Config`].
///
/// Provides a fluent API with validation in [`build`](Self::build).
///
/// # Examples
///
/// ```no_run
/// use bundle_orchestrator::orchestrator::{ConfigBuilder, Platform};
///
/// # fn example() -> Result<(), bundle_orchestrator::orchestrator::StartupError> {
/// let config = ConfigBuilder::new()
///     .hostname("localhost")
///     .port(8080)
///     .entry(Platform::Ios, "index.ios")
///     .entry(Platform::Android, "index.android")
///     .hot(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    hostname: String,
    port: u16,
    bundler_port: u16,
    packager_port: u16,
    entries: BTreeMap<Platform, String>,
    hot: bool,
    reset_cache: bool,
    haste_externals: bool,
    project_roots: Vec<PathBuf>,
    roots: Vec<PathBuf>,
    asset_roots: Vec<PathBuf>,
    entry_dir: PathBuf,
    packager: PackagerSettings,
    retry: RetryPolicy,
    bundler: toml::Table,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 8080,
            packager_port: 8081,
            bundler_port: 8082,
            entries: BTreeMap::new(),
            hot: false,
            reset_cache: false,
            haste_externals: false,
            project_roots: Vec::new(),
            roots: Vec::new(),
            asset_roots: Vec::new(),
            entry_dir: PathBuf::from("_entry"),
            packager: PackagerSettings::default(),
            retry: RetryPolicy::default(),
            bundler: toml::Table::new(),
        }
    }
}

impl ConfigBuilder {
    /// Creates a builder with the default ports (8080 / 8081 / 8082).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hostname for the listener and both backends.
    ///
    /// Default: `localhost`
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Sets this server's listen port. `0` binds an ephemeral port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the framework packager port.
    pub fn packager_port(mut self, port: u16) -> Self {
        self.packager_port = port;
        self
    }

    /// Sets the module bundler port.
    pub fn bundler_port(mut self, port: u16) -> Self {
        self.bundler_port = port;
        self
    }

    /// Serves `platform` with the given entry module name.
    pub fn entry(mut self, platform: Platform, name: impl Into<String>) -> Self {
        self.entries.insert(platform, name.into());
        self
    }

    /// Enables hot module replacement.
    pub fn hot(mut self, hot: bool) -> Self {
        self.hot = hot;
        self
    }

    /// Makes the packager discard its cache.
    pub fn reset_cache(mut self, reset: bool) -> Self {
        self.reset_cache = reset;
        self
    }

    /// Exposes Haste modules of the framework as externals.
    pub fn haste_externals(mut self, enabled: bool) -> Self {
        self.haste_externals = enabled;
        self
    }

    /// Sets the packager project roots.
    pub fn project_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.project_roots = roots;
        self
    }

    /// Sets additional packager roots.
    pub fn roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = roots;
        self
    }

    /// Sets the packager asset roots.
    pub fn asset_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.asset_roots = roots;
        self
    }

    /// Sets the scratch entry directory.
    ///
    /// Default: `_entry`
    pub fn entry_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.entry_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets how the packager is launched.
    pub fn packager(mut self, packager: PackagerSettings) -> Self {
        self.packager = packager;
        self
    }

    /// Sets the packager port polling policy.
    ///
    /// Default: every 250 ms, at most 120 attempts
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the module bundler configuration table.
    pub fn bundler(mut self, table: toml::Table) -> Self {
        self.bundler = table;
        self
    }

    /// Builds the config.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Configuration`] if:
    /// - no platform is served, or an entry name is empty
    /// - a backend port is `0` or two backend ports collide
    /// - the entry directory or hostname is empty
    pub fn build(self) -> Result<Config, StartupError> {
        let fail = |reason: &str| Err(StartupError::Configuration(reason.to_string()));

        if self.entries.is_empty() {
            return fail("at least one platform must be enabled");
        }
        if let Some((platform, _)) = self.entries.iter().find(|(_, name)| name.trim().is_empty()) {
            return Err(StartupError::Configuration(format!(
                "entry module name for {} is empty",
                platform
            )));
        }
        if self.hostname.is_empty() {
            return fail("hostname is empty");
        }
        if self.packager_port == 0 || self.bundler_port == 0 {
            return fail("packager and bundler ports must be non-zero");
        }
        if self.packager_port == self.bundler_port
            || self.port == self.packager_port
            || self.port == self.bundler_port
        {
            return fail("server, packager and bundler ports must differ");
        }
        if self.entry_dir.as_os_str().is_empty() {
            return fail("entry directory is empty");
        }
        if self.retry.max_attempts == 0 {
            return fail("retry policy needs at least one attempt");
        }

        Ok(Config {
            hostname: self.hostname,
            port: self.port,
            bundler_port: self.bundler_port,
            packager_port: self.packager_port,
            entries: self.entries,
            hot: self.hot,
            reset_cache: self.reset_cache,
            haste_externals: self.haste_externals,
            project_roots: self.project_roots,
            roots: self.roots,
            asset_roots: self.asset_roots,
            entry_dir: self.entry_dir,
            packager: self.packager,
            retry: self.retry,
            bundler: self.bundler,
        })
    }
}
