//! Command line argument parsing and validation.
//!
//! Options shared by `start` and `bundle` live in [`CommonArgs`] and are turned
//! into an orchestrator [`Config`] by [`CommonArgs::to_config`].

use crate::error::{CliError, Result};
use crate::orchestrator::{Config, ConfigBuilder, PackagerSettings, Platform};
use clap::{Parser, Subcommand};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Dev-time bundle orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "bundle_orchestrator",
    version,
    about = "Serves one bundle built from a framework packager and a module bundler",
    long_about = "Runs the framework packager and a module bundler side by side and serves
their outputs as one bundle with one merged source map.

Usage:
  bundle_orchestrator start --hot
  bundle_orchestrator bundle --no-android --ios-bundle-path ./ios/main.jsbundle

Requests are held until both backends are ready."
)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development bundle server
    Start(StartArgs),
    /// Write production bundles to disk
    Bundle(BundleArgs),
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// Hostname the servers listen on
    #[arg(long, default_value = "localhost", env = "BUNDLE_ORCHESTRATOR_HOSTNAME")]
    pub hostname: String,

    /// Port of the bundle server
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Port of the framework packager
    #[arg(long, default_value_t = 8081)]
    pub packager_port: u16,

    /// Port of the module bundler
    #[arg(long, default_value_t = 8082)]
    pub bundler_port: u16,

    /// Module bundler configuration file
    #[arg(long, value_name = "PATH", default_value = crate::config_file::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Do not serve Android
    #[arg(long)]
    pub no_android: bool,

    /// Do not serve iOS
    #[arg(long)]
    pub no_ios: bool,

    /// Android entry module name
    #[arg(long, default_value = "index.android")]
    pub android_entry: String,

    /// iOS entry module name
    #[arg(long, default_value = "index.ios")]
    pub ios_entry: String,

    /// Project roots passed to the packager (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub project_roots: Vec<PathBuf>,

    /// Additional packager roots (comma separated)
    #[arg(long = "root", value_delimiter = ',')]
    pub roots: Vec<PathBuf>,

    /// Asset roots passed to the packager (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub asset_roots: Vec<PathBuf>,

    /// Ask the packager to reset its cache
    #[arg(long)]
    pub reset_cache: bool,

    /// Treat every Haste module of the framework as external
    #[arg(long)]
    pub haste_externals: bool,

    /// Directory for the packager's scratch entry files
    #[arg(long, value_name = "DIR", default_value = "_entry")]
    pub entry_dir: PathBuf,

    /// Program running the packager script
    #[arg(long, default_value = "node")]
    pub packager_command: String,

    /// Packager script
    #[arg(long, default_value = "node_modules/react-native/local-cli/cli.js")]
    pub packager_script: PathBuf,
}

/// `start` options
#[derive(clap::Args, Debug, Clone)]
pub struct StartArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Enable hot module replacement
    #[arg(long)]
    pub hot: bool,
}

/// `bundle` options
#[derive(clap::Args, Debug, Clone)]
pub struct BundleArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output path of the Android bundle
    #[arg(long, default_value = "./android/app/src/main/assets/index.android.bundle")]
    pub android_bundle_path: PathBuf,

    /// Output path of the iOS bundle
    #[arg(long, default_value = "./ios/main.jsbundle")]
    pub ios_bundle_path: PathBuf,

    /// Build a development bundle (dev=true, minify=false)
    #[arg(long)]
    pub no_optimize: bool,

    /// Also write source maps next to the bundles
    #[arg(long)]
    pub source_map: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl BundleArgs {
    /// Output path for `platform`.
    pub fn bundle_path(&self, platform: Platform) -> &Path {
        match platform {
            Platform::Android => &self.android_bundle_path,
            Platform::Ios => &self.ios_bundle_path,
        }
    }
}

impl CommonArgs {
    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.no_android && self.no_ios {
            return Err("--no-android and --no-ios leave nothing to serve".to_string());
        }
        Ok(())
    }

    /// Platforms left after `--no-android` / `--no-ios`.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|platform| match platform {
                Platform::Android => !self.no_android,
                Platform::Ios => !self.no_ios,
            })
            .collect()
    }

    /// Builds the orchestrator configuration.
    ///
    /// Relative paths are resolved against the working directory.
    pub fn to_config(&self, hot: bool, bundler: toml::Table) -> Result<Config> {
        self.validate()
            .map_err(|reason| CliError::InvalidArguments { reason })?;

        let mut builder = ConfigBuilder::new()
            .hostname(&self.hostname)
            .port(self.port)
            .packager_port(self.packager_port)
            .bundler_port(self.bundler_port)
            .hot(hot)
            .reset_cache(self.reset_cache)
            .haste_externals(self.haste_externals)
            .project_roots(absolutize_all(&self.project_roots)?)
            .roots(absolutize_all(&self.roots)?)
            .asset_roots(absolutize_all(&self.asset_roots)?)
            .entry_dir(absolutize(&self.entry_dir)?)
            .packager(PackagerSettings {
                command: self.packager_command.clone(),
                script: Some(absolutize(&self.packager_script)?),
                extra_args: Vec::new(),
            })
            .bundler(bundler);

        for platform in self.platforms() {
            let entry = match platform {
                Platform::Android => &self.android_entry,
                Platform::Ios => &self.ios_entry,
            };
            builder = builder.entry(platform, entry.as_str());
        }

        Ok(builder.build()?)
    }

    /// Directory the framework package is installed under.
    pub fn project_root(&self) -> Result<PathBuf> {
        match self.project_roots.first() {
            Some(root) => absolutize(root),
            None => Ok(std::env::current_dir()?),
        }
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    path.absolutize()
        .map(|p| p.into_owned())
        .map_err(|e| {
            CliError::InvalidPath {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        })
}

fn absolutize_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| absolutize(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn start_defaults() {
        let args = parse(&["bundle_orchestrator", "start"]);
        let Command::Start(start) = args.command else {
            panic!("expected start");
        };
        assert!(!start.hot);
        assert_eq!(start.common.port, 8080);
        assert_eq!(start.common.packager_port, 8081);
        assert_eq!(start.common.bundler_port, 8082);
        assert_eq!(start.common.config, PathBuf::from("bundler.toml"));
        assert_eq!(start.common.platforms(), vec![Platform::Android, Platform::Ios]);
    }

    #[test]
    fn builds_config_from_flags() {
        let args = parse(&[
            "bundle_orchestrator",
            "start",
            "--hot",
            "--no-android",
            "--ios-entry",
            "main.ios",
            "--project-roots",
            "/app,/lib",
            "--port",
            "9000",
        ]);
        let Command::Start(start) = args.command else {
            panic!("expected start");
        };
        let config = start.common.to_config(start.hot, toml::Table::new()).unwrap();

        assert!(config.hot());
        assert_eq!(config.port(), 9000);
        assert_eq!(config.entry_for(Platform::Ios), Some("main.ios"));
        assert_eq!(config.entry_for(Platform::Android), None);
        assert_eq!(
            config.project_roots(),
            &[PathBuf::from("/app"), PathBuf::from("/lib")]
        );
        assert!(config.entry_dir().is_absolute());
    }

    #[test]
    fn nothing_to_serve_is_rejected() {
        let args = parse(&["bundle_orchestrator", "bundle", "--no-android", "--no-ios"]);
        let Command::Bundle(bundle) = args.command else {
            panic!("expected bundle");
        };
        assert!(bundle.common.to_config(false, toml::Table::new()).is_err());
    }

    #[test]
    fn bundle_paths_default_per_platform() {
        let args = parse(&["bundle_orchestrator", "bundle", "--source-map"]);
        let Command::Bundle(bundle) = args.command else {
            panic!("expected bundle");
        };
        assert!(bundle.source_map);
        assert_eq!(
            bundle.bundle_path(Platform::Ios),
            Path::new("./ios/main.jsbundle")
        );
    }
}
