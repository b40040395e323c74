//! Module bundler driven by an external build command.
//!
//! Configuration comes from the opaque bundler table:
//!
//! ```toml
//! command = ["npx", "webpack", "--watch"]
//! output_dir = "build"
//! watch = true
//! build_complete_pattern = "compiled successfully"
//! build_failed_pattern = "Failed to compile"
//! ```
//!
//! The injections are written as JSON next to the scratch entries and the path is
//! exported to the command as `BUNDLE_ORCHESTRATOR_INJECTIONS`. Compiled files in
//! `output_dir` are served over HTTP on the module bundler port.
//!
//! After each build the command may write the framework modules the application
//! used to the file named by `BUNDLE_ORCHESTRATOR_STATS`:
//!
//! ```json
//! { "required_externals": ["AdSupportIOS", "react-native"] }
//! ```
//!
//! The list ends up in [`BuildReport::required_externals`]. A command that never
//! writes the file reports an empty list.

use super::{BuildOutcome, BuildReport, BundlerHandle, BundlerSetup, ModuleBundler};
use crate::orchestrator::error::StartupError;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Environment variable holding the injections manifest path.
pub const INJECTIONS_ENV: &str = "BUNDLE_ORCHESTRATOR_INJECTIONS";

/// Environment variable holding the platform -> entry JSON object.
pub const ENTRIES_ENV: &str = "BUNDLE_ORCHESTRATOR_ENTRIES";

/// Environment variable set to `1` when hot reload is enabled.
pub const HOT_ENV: &str = "BUNDLE_ORCHESTRATOR_HOT";

/// Environment variable holding the build stats path.
pub const STATS_ENV: &str = "BUNDLE_ORCHESTRATOR_STATS";

const INJECTIONS_FILE: &str = "injections.json";
const STATS_FILE: &str = "stats.json";

/// Number of output lines kept for the failure message of a one-shot build.
const TAIL_LINES: usize = 20;

/// Settings read from the bundler table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommandBundlerConfig {
    /// Program and arguments
    pub command: Vec<String>,
    /// Directory the command writes `<entry>.js` / `<entry>.js.map` into
    pub output_dir: PathBuf,
    /// Working directory of the command
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Long-running command reporting builds on stdout
    #[serde(default)]
    pub watch: bool,
    /// Stdout line marking a finished build (watch mode)
    #[serde(default)]
    pub build_complete_pattern: Option<String>,
    /// Stdout line marking a failed build (watch mode)
    #[serde(default)]
    pub build_failed_pattern: Option<String>,
}

impl CommandBundlerConfig {
    /// Reads the settings from the opaque bundler table.
    pub fn from_table(table: &toml::Table) -> Result<Self, StartupError> {
        let config: Self = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e| StartupError::Configuration(format!("invalid bundler config: {}", e)))?;

        if config.command.is_empty() {
            return Err(StartupError::Configuration(
                "bundler config `command` is empty".to_string(),
            ));
        }
        if config.watch && config.build_complete_pattern.is_none() {
            return Err(StartupError::Configuration(
                "bundler config needs `build_complete_pattern` when `watch = true`".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Module bundler that shells out to a build command and serves its output.
#[derive(Debug, Default)]
pub struct CommandBundler {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl CommandBundler {
    /// Creates a stopped bundler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleBundler for CommandBundler {
    fn start(&mut self, setup: BundlerSetup) -> Result<BundlerHandle, StartupError> {
        let config = CommandBundlerConfig::from_table(&setup.config)?;
        let complete = compile_pattern(config.build_complete_pattern.as_deref())?;
        let failed = compile_pattern(config.build_failed_pattern.as_deref())?;

        let manifest = serde_json::to_string_pretty(&setup.injections)
            .map_err(|e| StartupError::Bundler(format!("failed to encode injections: {}", e)))?;
        let manifest_path = setup.scratch.write_aux(INJECTIONS_FILE, &manifest)?;
        // Reset stats left over from an earlier run
        let stats_path = setup.scratch.write_aux(STATS_FILE, "{}")?;

        let entries: serde_json::Map<String, serde_json::Value> = setup
            .entries
            .iter()
            .map(|(platform, entry)| (platform.to_string(), entry.clone().into()))
            .collect();

        let mut command = Command::new(&config.command[0]);
        command
            .args(&config.command[1..])
            .env(INJECTIONS_ENV, &manifest_path)
            .env(ENTRIES_ENV, serde_json::Value::Object(entries).to_string())
            .env(HOT_ENV, if setup.hot { "1" } else { "0" })
            .env(STATS_ENV, &stats_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let (build_tx, builds) = mpsc::unbounded_channel();
        let (listening_tx, listening) = oneshot::channel();

        self.shutdown = CancellationToken::new();
        let addr = format!("{}:{}", setup.hostname, setup.port);
        self.tasks.push(tokio::spawn(serve_output(
            addr,
            Arc::new(config.output_dir.clone()),
            listening_tx,
            self.shutdown.clone(),
        )));

        let watcher = BuildWatcher {
            complete,
            failed,
            watch: config.watch,
            stats_path: Some(stats_path),
            sender: build_tx,
        };
        self.tasks.push(tokio::spawn(watcher.run(command, config.command.join(" "))));

        Ok(BundlerHandle { builds, listening })
    }

    fn stop(&mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for CommandBundler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>, StartupError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| {
                StartupError::Configuration(format!("invalid build pattern {:?}: {}", p, e))
            })
        })
        .transpose()
}

/// Build stats the command may write after each build.
#[derive(Debug, Default, Deserialize)]
struct BuildStats {
    #[serde(default)]
    required_externals: BTreeSet<String>,
}

/// Reads the framework modules reported in the stats file at `path`.
///
/// A missing or unreadable file yields an empty set.
async fn read_required_externals(path: &Path) -> BTreeSet<String> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            log::debug!("No build stats at {}: {}", path.display(), e);
            return BTreeSet::new();
        }
    };
    match serde_json::from_str::<BuildStats>(&text) {
        Ok(stats) => stats.required_externals,
        Err(e) => {
            log::warn!("Ignoring malformed build stats {}: {}", path.display(), e);
            BTreeSet::new()
        }
    }
}

struct BuildWatcher {
    complete: Option<Regex>,
    failed: Option<Regex>,
    watch: bool,
    stats_path: Option<PathBuf>,
    sender: mpsc::UnboundedSender<BuildOutcome>,
}

impl BuildWatcher {
    async fn run(self, mut command: Command, display: String) {
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = self
                    .sender
                    .send(Err(format!("failed to run `{}`: {}", display, e)));
                return;
            }
        };
        log::info!("Module bundler running: {}", display);

        let mut started = Instant::now();
        let mut last_lines: Vec<String> = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            while let Some(line) = next_line(&mut reader, &display).await {
                log::info!("{}", line);

                if !self.watch {
                    last_lines.push(line);
                    if last_lines.len() > TAIL_LINES {
                        last_lines.remove(0);
                    }
                    continue;
                }

                if self.failed.as_ref().is_some_and(|re| re.is_match(&line)) {
                    let _ = self.sender.send(Err(line));
                    started = Instant::now();
                } else if self.complete.as_ref().is_some_and(|re| re.is_match(&line)) {
                    let _ = self.sender.send(Ok(self.report(started).await));
                    started = Instant::now();
                }
            }
        }

        match child.wait().await {
            Ok(status) if status.success() && !self.watch => {
                let _ = self.sender.send(Ok(self.report(started).await));
            }
            Ok(status) => {
                let _ = self.sender.send(Err(format!(
                    "`{}` exited with {}\n{}",
                    display,
                    status,
                    last_lines.join("\n")
                )));
            }
            Err(e) => {
                let _ = self.sender.send(Err(format!("failed to wait for `{}`: {}", display, e)));
            }
        }
        // Dropping the sender tells the orchestrator no further builds will come
    }

    async fn report(&self, started: Instant) -> BuildReport {
        let duration = started.elapsed();
        let required_externals = match &self.stats_path {
            Some(path) => read_required_externals(path).await,
            None => BTreeSet::new(),
        };
        BuildReport {
            duration,
            required_externals,
        }
    }
}

/// Reads one line of output, decoding invalid UTF-8 lossily.
///
/// Returns `None` at end of stream or on a read error.
async fn next_line<R>(reader: &mut BufReader<R>, display: &str) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf).await {
        Ok(0) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(&buf);
            Some(line.trim_end_matches(['\r', '\n']).to_string())
        }
        Err(e) => {
            log::warn!("Failed to read output of `{}`: {}", display, e);
            None
        }
    }
}

async fn serve_output(
    addr: String,
    output_dir: Arc<PathBuf>,
    listening: oneshot::Sender<Result<(), String>>,
    shutdown: CancellationToken,
) {
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = listening.send(Err(format!("failed to bind {}: {}", addr, e)));
            return;
        }
    };
    log::info!("Module bundler serving {} at http://{}", output_dir.display(), addr);
    let _ = listening.send(Ok(()));

    let router = Router::new().fallback(serve_file).with_state(output_dir);
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = result {
        log::error!("Module bundler server failed: {}", e);
    }
}

/// Maps a request path onto `root`, refusing anything that escapes it.
fn resolve_output_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

async fn serve_file(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(path) = resolve_output_path(&root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(_) => return (StatusCode::NOT_FOUND, format!("{} not found", uri.path())).into_response(),
    };

    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("js") => "application/javascript",
        Some("map") | Some("json") => "application/json",
        _ => "application/octet-stream",
    };

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Body::from(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::scratch::ScratchEntries;
    use crate::orchestrator::settings::Platform;
    use crate::orchestrator::module_bundler::BundlerInjections;

    fn table(text: &str) -> toml::Table {
        text.parse().unwrap()
    }

    #[test]
    fn reads_config_from_table() {
        let config = CommandBundlerConfig::from_table(&table(
            r#"
            command = ["npx", "webpack"]
            output_dir = "build"
            "#,
        ))
        .unwrap();
        assert_eq!(config.command, vec!["npx", "webpack"]);
        assert!(!config.watch);
    }

    #[test]
    fn watch_mode_needs_pattern() {
        let result = CommandBundlerConfig::from_table(&table(
            r#"
            command = ["npx", "webpack", "--watch"]
            output_dir = "build"
            watch = true
            "#,
        ));
        assert!(matches!(result, Err(StartupError::Configuration(_))));
    }

    #[test]
    fn refuses_paths_outside_output_dir() {
        let root = Path::new("/srv/build");
        assert_eq!(
            resolve_output_path(root, "/index.ios.js"),
            Some(PathBuf::from("/srv/build/index.ios.js"))
        );
        assert_eq!(resolve_output_path(root, "/../etc/passwd"), None);
        assert_eq!(resolve_output_path(root, "/"), None);
    }

    #[tokio::test]
    async fn reads_required_externals_from_stats() {
        let tmp = tempfile::tempdir().unwrap();
        let stats = tmp.path().join("stats.json");

        assert!(read_required_externals(&stats).await.is_empty());

        std::fs::write(&stats, r#"{"required_externals": ["AdSupportIOS"]}"#).unwrap();
        let required = read_required_externals(&stats).await;
        assert_eq!(required, BTreeSet::from(["AdSupportIOS".to_string()]));

        std::fs::write(&stats, "not json").unwrap();
        assert!(read_required_externals(&stats).await.is_empty());
    }

    #[cfg(unix)]
    fn watcher(
        complete: &str,
        stats_path: Option<PathBuf>,
    ) -> (BuildWatcher, mpsc::UnboundedReceiver<BuildOutcome>) {
        let (sender, builds) = mpsc::unbounded_channel();
        let watcher = BuildWatcher {
            complete: Some(Regex::new(complete).unwrap()),
            failed: Some(Regex::new("Failed to compile").unwrap()),
            watch: true,
            stats_path,
            sender,
        };
        (watcher, builds)
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command
            .args(["-c", script])
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_output_does_not_stop_build_detection() {
        let (watcher, mut builds) = watcher("compiled", None);
        let task = tokio::spawn(watcher.run(
            shell(r"printf 'warn \377\ncompiled\n'; sleep 5"),
            "bundler".to_string(),
        ));

        let first = builds.recv().await.unwrap();
        assert_eq!(first.map(|report| report.required_externals), Ok(BTreeSet::new()));
        task.abort();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn watch_builds_report_stats_externals() {
        let tmp = tempfile::tempdir().unwrap();
        let stats = tmp.path().join("stats.json");
        let (watcher, mut builds) = watcher("compiled", Some(stats.clone()));
        let script = format!(
            r#"printf '{{"required_externals":["AdSupportIOS"]}}' > '{}'; echo compiled; echo 'Failed to compile x.js'; sleep 5"#,
            stats.display()
        );
        let task = tokio::spawn(watcher.run(shell(&script), "bundler".to_string()));

        let report = builds.recv().await.unwrap().unwrap();
        assert_eq!(
            report.required_externals,
            BTreeSet::from(["AdSupportIOS".to_string()])
        );
        assert_eq!(
            builds.recv().await.unwrap(),
            Err("Failed to compile x.js".to_string())
        );
        task.abort();
    }

    #[tokio::test]
    async fn injections_manifest_carries_asset_replacement() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchEntries::new(tmp.path().join("_entry"), Platform::ALL);
        let injections = BundlerInjections::new(Default::default(), false);
        let setup = BundlerSetup {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            config: table(
                r#"
                command = ["true"]
                output_dir = "build"
                "#,
            ),
            injections,
            entries: Default::default(),
            hot: false,
            scratch: scratch.clone(),
        };

        let mut bundler = CommandBundler::new();
        bundler.start(setup).unwrap();
        bundler.stop();

        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(scratch.dir().join(INJECTIONS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["asset_rule"]["prefix"], "image!");
        assert_eq!(
            manifest["asset_rule"]["replacement"],
            r#"{"uri":"[name]","isStatic":true}"#
        );
        assert_eq!(
            std::fs::read_to_string(scratch.dir().join(STATS_FILE)).unwrap(),
            "{}"
        );
    }
}
