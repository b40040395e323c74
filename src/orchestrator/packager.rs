//! Framework packager command resolution.
//!
//! Finds the packager executable and computes its arguments from [`Config`].
//! A packager that cannot be resolved is a configuration problem, reported
//! before anything is spawned.

use super::error::StartupError;
use super::settings::Config;
use std::path::{Path, PathBuf};

/// Fully resolved packager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerCommand {
    /// Absolute path of the program
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<String>,
}

impl PackagerCommand {
    /// Resolves the packager for `config`.
    ///
    /// # Errors
    ///
    /// [`StartupError::Configuration`] when the program is not on `PATH` or the
    /// packager script does not exist.
    pub fn resolve(config: &Config) -> Result<Self, StartupError> {
        let settings = config.packager();

        let program = which::which(&settings.command).map_err(|e| {
            log::debug!("{} not found in PATH: {}", settings.command, e);
            StartupError::Configuration(format!(
                "could not find `{}` in PATH: {}",
                settings.command, e
            ))
        })?;
        log::debug!("Found packager runtime at: {}", program.display());

        if let Some(script) = &settings.script
            && !script.is_file()
        {
            return Err(StartupError::Configuration(format!(
                "Could not find react-native (missing {}). Try `npm install react-native`.",
                script.display()
            )));
        }

        Ok(Self {
            program,
            args: packager_args(config),
        })
    }

    /// Command line for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn join_paths(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> String {
    paths
        .into_iter()
        .map(|p| p.as_ref().display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Arguments passed to the packager program.
///
/// The scratch entry directory always comes first among the roots so the
/// packager finds the `index.<platform>` stubs.
pub fn packager_args(config: &Config) -> Vec<String> {
    let settings = config.packager();
    let mut args = Vec::new();

    if let Some(script) = &settings.script {
        args.push(script.display().to_string());
    }
    args.extend(settings.extra_args.iter().cloned());

    args.push("start".to_string());
    args.push("--root".to_string());
    args.push(join_paths(
        std::iter::once(config.entry_dir()).chain(config.roots().iter().map(PathBuf::as_path)),
    ));
    args.push("--port".to_string());
    args.push(config.packager_port().to_string());

    if !config.project_roots().is_empty() {
        args.push("--projectRoots".to_string());
        args.push(join_paths(config.project_roots()));
    }
    if !config.asset_roots().is_empty() {
        args.push("--assetRoots".to_string());
        args.push(join_paths(config.asset_roots()));
    }
    if config.reset_cache() {
        args.push("--reset-cache".to_string());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::settings::{ConfigBuilder, PackagerSettings, Platform};

    #[test]
    fn computes_arguments() {
        let config = ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .entry_dir("/tmp/_entry")
            .roots(vec![PathBuf::from("/app/vendor")])
            .asset_roots(vec![PathBuf::from("/app/img"), PathBuf::from("/app/fonts")])
            .reset_cache(true)
            .build()
            .unwrap();

        assert_eq!(
            packager_args(&config),
            vec![
                "node_modules/react-native/local-cli/cli.js",
                "start",
                "--root",
                "/tmp/_entry,/app/vendor",
                "--port",
                "8081",
                "--assetRoots",
                "/app/img,/app/fonts",
                "--reset-cache",
            ]
        );
    }

    #[test]
    fn missing_program_is_configuration_error() {
        let config = ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .packager(PackagerSettings {
                command: "definitely-not-a-real-packager-binary".into(),
                script: None,
                extra_args: Vec::new(),
            })
            .build()
            .unwrap();

        assert!(matches!(
            PackagerCommand::resolve(&config),
            Err(StartupError::Configuration(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn missing_script_is_configuration_error() {
        let config = ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .packager(PackagerSettings {
                command: "sh".into(),
                script: Some(PathBuf::from("/nonexistent/cli.js")),
                extra_args: Vec::new(),
            })
            .build()
            .unwrap();

        let err = PackagerCommand::resolve(&config).unwrap_err();
        assert!(err.to_string().contains("npm install react-native"));
    }
}
