//! In-process stand-ins for the two backends.

#![allow(dead_code)]

use axum::{
    Router,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use bundle_orchestrator::orchestrator::module_bundler::{
    BuildOutcome, BuildReport, BundlerHandle, BundlerSetup, ModuleBundler,
};
use bundle_orchestrator::orchestrator::readiness::RetryPolicy;
use bundle_orchestrator::orchestrator::{ConfigBuilder, PackagerSettings, Platform, StartupError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub const FRAMEWORK_CODE: &str = "var F=1;\n//# sourceMappingURL=index.ios.map\n";
pub const FRAMEWORK_MAP: &str = r#"{"version":3,"sources":["f.js"],"names":[],"mappings":"AAAA"}"#;
pub const APP_CODE: &str = "var A=2;\n";
pub const APP_MAP: &str = r#"{"version":3,"sources":["a.js"],"names":[],"mappings":"AAAA"}"#;

/// HTTP backend answering from a mutable path -> (status, body) table.
#[derive(Clone, Default)]
pub struct StaticBackend {
    routes: Arc<Mutex<HashMap<String, (StatusCode, String)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StaticBackend {
    pub fn with(self, path: &str, body: &str) -> Self {
        self.set(path, StatusCode::OK, body);
        self
    }

    pub fn set(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Every request seen, as `path?query`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn router(&self) -> Router {
        let backend = self.clone();
        Router::new().fallback(move |uri: Uri| {
            let backend = backend.clone();
            async move {
                backend.requests.lock().unwrap().push(uri.to_string());
                match backend.routes.lock().unwrap().get(uri.path()) {
                    Some((status, body)) => (*status, body.clone()).into_response(),
                    None => StatusCode::NOT_FOUND.into_response(),
                }
            }
        })
    }

    /// Serves on an ephemeral port until the runtime ends.
    pub async fn spawn(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }
}

pub fn framework_backend() -> StaticBackend {
    StaticBackend::default()
        .with("/index.ios.bundle", FRAMEWORK_CODE)
        .with("/index.ios.map", FRAMEWORK_MAP)
}

pub fn app_backend() -> StaticBackend {
    StaticBackend::default()
        .with("/index.ios.js", APP_CODE)
        .with("/index.ios.js.map", APP_MAP)
}

/// Module bundler serving a [`StaticBackend`] and reporting builds on demand.
pub struct FakeBundler {
    backend: StaticBackend,
    release: Option<oneshot::Receiver<()>>,
    builds: Arc<Mutex<Option<mpsc::UnboundedSender<BuildOutcome>>>>,
    shutdown: CancellationToken,
    pub stopped: Arc<Mutex<bool>>,
}

impl FakeBundler {
    /// Reports a successful build right away.
    pub fn new(backend: StaticBackend) -> Self {
        Self {
            backend,
            release: None,
            builds: Arc::default(),
            shutdown: CancellationToken::new(),
            stopped: Arc::default(),
        }
    }

    /// Reports the first build only once the returned sender fires.
    pub fn held(backend: StaticBackend) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let mut bundler = Self::new(backend);
        bundler.release = Some(rx);
        (bundler, tx)
    }
}

impl ModuleBundler for FakeBundler {
    fn start(&mut self, setup: BundlerSetup) -> Result<BundlerHandle, StartupError> {
        let (build_tx, builds) = mpsc::unbounded_channel();
        let (listening_tx, listening) = oneshot::channel();

        let router = self.backend.router();
        let shutdown = self.shutdown.clone();
        let addr = format!("{}:{}", setup.hostname, setup.port);
        tokio::spawn(async move {
            let listener = match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    let _ = listening_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = listening_tx.send(Ok(()));
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
        });

        *self.builds.lock().unwrap() = Some(build_tx.clone());
        match self.release.take() {
            Some(release) => {
                tokio::spawn(async move {
                    if release.await.is_ok() {
                        let _ = build_tx.send(Ok(BuildReport::default()));
                    }
                });
            }
            None => {
                let _ = build_tx.send(Ok(BuildReport::default()));
            }
        }

        Ok(BundlerHandle { builds, listening })
    }

    fn stop(&mut self) {
        self.shutdown.cancel();
        self.builds.lock().unwrap().take();
        *self.stopped.lock().unwrap() = true;
    }
}

/// A port nothing listens on right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Packager stand-in: a shell running `script`.
pub fn shell_packager(script: &str) -> PackagerSettings {
    PackagerSettings {
        command: "sh".to_string(),
        script: None,
        extra_args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
    }
}

/// iOS-only config on loopback with fast polling.
pub fn config(scratch_root: &Path, packager_port: u16, bundler_port: u16) -> ConfigBuilder {
    ConfigBuilder::new()
        .hostname("127.0.0.1")
        .port(0)
        .packager_port(packager_port)
        .bundler_port(bundler_port)
        .entry(Platform::Ios, "index.ios")
        .entry_dir(scratch_root.join("_entry"))
        .packager(shell_packager("sleep 30"))
        .retry(RetryPolicy {
            interval: Duration::from_millis(20),
            max_attempts: 50,
        })
}
