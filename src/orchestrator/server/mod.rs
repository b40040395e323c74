//! The orchestrator: owns configuration, the readiness gate, the HTTP listener
//! and teardown.
//!
//! ```text
//! client -> GET /index.ios.bundle -> gate.wait() -> Composer -> packager + module bundler
//! ```
//!
//! [`Orchestrator::start`] resolves once the listener is bound. Backend readiness
//! is tracked by the gate and only delays request handling. [`Orchestrator::stop`]
//! is synchronous and also runs from `Drop`, so an early return or a panic
//! unwinding through the owner still kills the packager and removes the scratch
//! directory.

mod routes;

pub use routes::{JSON_CONTENT_TYPE, SCRIPT_CONTENT_TYPE};

use super::compose::Composer;
use super::error::StartupError;
use super::module_bundler::{ExternalsResolver, ModuleBundler};
use super::readiness::sequence::{SharedBundler, Startup};
use super::readiness::{Phase, ReadinessGate};
use super::scratch::{ScratchEntries, entry_source};
use super::settings::{Config, Endpoints};
use super::supervisor::Supervisor;
use super::utils::http::Fetcher;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Dev-time bundle server fusing framework and application artifacts.
pub struct Orchestrator {
    config: Arc<Config>,
    gate: ReadinessGate,
    scratch: Arc<ScratchEntries>,
    supervisor: Arc<Supervisor>,
    bundler: SharedBundler,
    externals: Arc<dyn ExternalsResolver>,
    shutdown: CancellationToken,
    starting: tokio::sync::Mutex<()>,
    local_addr: Mutex<Option<SocketAddr>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Creates an orchestrator. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: Config,
        bundler: Box<dyn ModuleBundler>,
        externals: Arc<dyn ExternalsResolver>,
    ) -> Self {
        let scratch = ScratchEntries::new(config.entry_dir(), config.platforms());
        Self {
            config: Arc::new(config),
            gate: ReadinessGate::new(),
            scratch: Arc::new(scratch),
            supervisor: Arc::new(Supervisor::new()),
            bundler: Arc::new(Mutex::new(bundler)),
            externals,
            shutdown: CancellationToken::new(),
            starting: tokio::sync::Mutex::new(()),
            local_addr: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Configuration being served.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current readiness phase.
    pub fn phase(&self) -> Phase {
        self.gate.phase()
    }

    /// Waits until both backends are up, or startup failed.
    pub async fn ready(&self) -> Result<(), super::error::GateError> {
        self.gate.wait().await
    }

    /// Address of the bound listener, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Writes the scratch entries, starts the startup sequence and binds the
    /// listener.
    ///
    /// Resolves once the listener is bound. Calling it again after a successful
    /// start returns the same address.
    ///
    /// # Errors
    ///
    /// - [`StartupError::Scratch`] if the scratch entries cannot be written
    /// - [`StartupError::Bind`] if the listener cannot be bound
    /// - [`StartupError::Stopped`] after [`stop`](Self::stop)
    pub async fn start(&self) -> Result<SocketAddr, StartupError> {
        let _starting = self.starting.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(StartupError::Stopped);
        }
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let endpoints = Endpoints::new(&self.config).map_err(|e| {
            StartupError::Configuration(format!(
                "invalid hostname {:?}: {}",
                self.config.hostname(),
                e
            ))
        })?;

        self.scratch.write_all(&entry_source(&BTreeSet::new()))?;

        let addr = format!("{}:{}", self.config.hostname(), self.config.port());
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let bound = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr, source })?;

        if self.shutdown.is_cancelled() {
            return Err(StartupError::Stopped);
        }

        let composer = Arc::new(Composer::new(
            Arc::clone(&self.config),
            endpoints,
            Fetcher::new(),
        ));
        let app = routes::router(composer, self.gate.clone());
        let shutdown = self.shutdown.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                log::error!("Bundle server failed: {}", e);
            }
        });
        log::info!("Bundle server listening at http://{}", bound);

        let startup = Startup {
            config: Arc::clone(&self.config),
            gate: self.gate.clone(),
            scratch: Arc::clone(&self.scratch),
            supervisor: Arc::clone(&self.supervisor),
            bundler: Arc::clone(&self.bundler),
            externals: Arc::clone(&self.externals),
            shutdown: self.shutdown.clone(),
        };
        let sequence = tokio::spawn(startup.run());

        lock(&self.tasks).extend([server, sequence]);
        *lock(&self.local_addr) = Some(bound);
        Ok(bound)
    }

    /// Kills the packager, stops the module bundler, deletes the scratch
    /// entries and closes the listener.
    ///
    /// Synchronous and idempotent. Queued requests are rejected.
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        log::info!("Stopping bundle server");
        self.shutdown.cancel();

        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.supervisor.kill();
        lock(&self.bundler).stop();
        if let Err(e) = self.scratch.cleanup() {
            log::warn!(
                "Failed to remove scratch entries in {}: {}",
                self.scratch.dir().display(),
                e
            );
        }
        self.gate.stop();
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
