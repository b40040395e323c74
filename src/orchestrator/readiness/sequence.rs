//! Startup sequencer.
//!
//! Drives the gate through `StartingBundler` and `StartingPackager`. The two
//! phases never overlap: the packager is spawned only after the module bundler
//! reported its first successful build and its listener is up.

use super::gate::ReadinessGate;
use super::retry::{Probe, is_port_open, wait_until_reachable};
use crate::orchestrator::error::StartupError;
use crate::orchestrator::module_bundler::{
    BuildOutcome, BuildReport, BundlerHandle, BundlerInjections, BundlerSetup, ExternalsResolver,
    ModuleBundler, externals_map,
};
use crate::orchestrator::packager::PackagerCommand;
use crate::orchestrator::scratch::{ScratchEntries, entry_source};
use crate::orchestrator::settings::Config;
use crate::orchestrator::supervisor::Supervisor;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Module bundler shared between the sequencer and `stop()`.
pub(crate) type SharedBundler = Arc<Mutex<Box<dyn ModuleBundler>>>;

/// Everything the sequencer touches. Owned by the orchestrator.
pub(crate) struct Startup {
    pub config: Arc<Config>,
    pub gate: ReadinessGate,
    pub scratch: Arc<ScratchEntries>,
    pub supervisor: Arc<Supervisor>,
    pub bundler: SharedBundler,
    pub externals: Arc<dyn ExternalsResolver>,
    pub shutdown: CancellationToken,
}

impl Startup {
    /// Runs the sequence and settles the gate with its outcome.
    pub async fn run(self) {
        match self.sequence().await {
            Ok(()) => {
                if self.gate.ready() {
                    log::info!("Bundle server ready");
                }
            }
            Err(e) => {
                log::error!("Startup failed: {}", e);
                self.gate.fail(e);
            }
        }
    }

    async fn sequence(&self) -> Result<(), StartupError> {
        self.gate.starting_bundler();

        let externals = self.externals.resolve_external_module_names(&self.config)?;
        log::debug!("{} external modules", externals.len());

        let setup = BundlerSetup {
            hostname: self.config.hostname().to_string(),
            port: self.config.bundler_port(),
            config: self.config.bundler().clone(),
            injections: BundlerInjections::new(externals_map(&externals), self.config.hot()),
            entries: self.config.entries().clone(),
            hot: self.config.hot(),
            scratch: (*self.scratch).clone(),
        };

        let BundlerHandle {
            mut builds,
            listening,
        } = self
            .bundler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .start(setup)?;

        match listening.await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return Err(StartupError::Bundler(message)),
            Err(_) => {
                return Err(StartupError::Bundler(
                    "module bundler stopped before listening".to_string(),
                ));
            }
        }

        let report = first_build(&mut builds).await?;
        log::info!(
            "Module bundler ready at http://{} (built in {:?})",
            self.config.bundler_addr(),
            report.duration
        );
        refresh_entries(&self.scratch, &report)?;
        tokio::spawn(watch_builds(
            builds,
            Arc::clone(&self.scratch),
            self.shutdown.clone(),
        ));

        self.gate.starting_packager();
        let command = PackagerCommand::resolve(&self.config)?;
        self.supervisor.spawn(&command)?;

        let addr = self.config.packager_addr();
        let attempts = wait_until_reachable(self.config.retry(), &addr, |_| {
            let supervisor = Arc::clone(&self.supervisor);
            let addr = addr.clone();
            async move {
                if let Some(status) = supervisor.exit_status() {
                    return Probe::Abort(StartupError::PackagerExited { status });
                }
                if is_port_open(&addr).await {
                    Probe::Reachable
                } else {
                    Probe::Pending
                }
            }
        })
        .await?;

        log::info!(
            "Framework packager ready at http://{} after {} attempt(s)",
            addr,
            attempts
        );
        Ok(())
    }
}

/// Waits for the first successful build, logging failures along the way.
async fn first_build(
    builds: &mut mpsc::UnboundedReceiver<BuildOutcome>,
) -> Result<BuildReport, StartupError> {
    while let Some(outcome) = builds.recv().await {
        match outcome {
            Ok(report) => return Ok(report),
            Err(message) => log::error!("Module bundler build failed:\n{}", message),
        }
    }
    Err(StartupError::Bundler(
        "module bundler stopped before completing a build".to_string(),
    ))
}

fn refresh_entries(scratch: &ScratchEntries, report: &BuildReport) -> Result<(), StartupError> {
    scratch.write_all(&entry_source(&report.required_externals))?;
    Ok(())
}

/// Refreshes scratch entries after every later build until shutdown.
async fn watch_builds(
    mut builds: mpsc::UnboundedReceiver<BuildOutcome>,
    scratch: Arc<ScratchEntries>,
    shutdown: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => return,
            outcome = builds.recv() => outcome,
        };
        match outcome {
            Some(Ok(report)) => {
                log::info!("Module bundler rebuilt in {:?}", report.duration);
                if let Err(e) = refresh_entries(&scratch, &report) {
                    log::warn!("{}", e);
                }
            }
            Some(Err(message)) => log::error!("Module bundler build failed:\n{}", message),
            None => {
                log::warn!("Module bundler stopped reporting builds");
                return;
            }
        }
    }
}
