//! Readiness gate shared by every in-flight request.

use crate::orchestrator::error::{GateError, StartupError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Phase of the startup state machine.
#[derive(Debug, Clone)]
pub enum Phase {
    /// `start()` has not been called yet
    Idle,
    /// Waiting for the module bundler's first build and listener
    StartingBundler,
    /// Waiting for the framework packager's port
    StartingPackager,
    /// Both backends are operational
    Ready,
    /// Startup failed with the captured error
    Failed(Arc<StartupError>),
    /// The orchestrator was stopped
    Stopped,
}

impl Phase {
    fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Failed(_) | Phase::Stopped)
    }

    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::StartingBundler => "starting-bundler",
            Phase::StartingPackager => "starting-packager",
            Phase::Ready => "ready",
            Phase::Failed(_) => "failed",
            Phase::Stopped => "stopped",
        }
    }
}

type Waiter = oneshot::Sender<Result<(), GateError>>;

#[derive(Debug)]
struct Inner {
    phase: Phase,
    waiters: VecDeque<Waiter>,
}

/// Monotonic readiness state machine.
///
/// Requests call [`wait`](Self::wait) before doing any work. While startup is in
/// progress they are queued in arrival order; reaching `Ready` releases them in
/// that same order, and reaching `Failed` or `Stopped` rejects all of them with
/// the same error.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    inner: Arc<Mutex<Inner>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    /// Creates a gate in the `Idle` phase.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Idle,
                waiters: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned gate still holds a consistent phase; keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase.clone()
    }

    /// Whether the gate reached `Ready`.
    pub fn is_ready(&self) -> bool {
        matches!(self.lock().phase, Phase::Ready)
    }

    /// Number of requests currently queued.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Waits until the gate is `Ready`.
    ///
    /// Returns immediately once `Ready`; fails immediately once `Failed` or
    /// `Stopped`. Otherwise the caller is queued behind earlier arrivals.
    pub async fn wait(&self) -> Result<(), GateError> {
        let receiver = {
            let mut inner = self.lock();
            match &inner.phase {
                Phase::Ready => return Ok(()),
                Phase::Failed(error) => return Err(GateError::Failed(Arc::clone(error))),
                Phase::Stopped => return Err(GateError::Stopped),
                Phase::Idle | Phase::StartingBundler | Phase::StartingPackager => {}
            }
            let (sender, receiver) = oneshot::channel();
            inner.waiters.push_back(sender);
            receiver
        };

        // Sender dropped without a verdict only if the gate itself was dropped
        receiver.await.unwrap_or(Err(GateError::Stopped))
    }

    /// Moves to `StartingBundler`. Ignored once terminal.
    pub fn starting_bundler(&self) -> bool {
        self.advance(Phase::StartingBundler)
    }

    /// Moves to `StartingPackager`. Ignored once terminal.
    pub fn starting_packager(&self) -> bool {
        self.advance(Phase::StartingPackager)
    }

    /// Moves to `Ready` and releases queued requests in arrival order.
    ///
    /// Returns `false` if the gate was already terminal; the transition happens
    /// at most once.
    pub fn ready(&self) -> bool {
        self.finish(Phase::Ready, Ok(()))
    }

    /// Moves to `Failed` and rejects every queued request with `error`.
    pub fn fail(&self, error: StartupError) -> bool {
        let error = Arc::new(error);
        self.finish(
            Phase::Failed(Arc::clone(&error)),
            Err(GateError::Failed(error)),
        )
    }

    /// Moves to `Stopped` from any phase, rejecting queued requests.
    ///
    /// Idempotent.
    pub fn stop(&self) {
        let waiters = {
            let mut inner = self.lock();
            if matches!(inner.phase, Phase::Stopped) {
                return;
            }
            log::debug!("readiness: {} -> stopped", inner.phase.name());
            inner.phase = Phase::Stopped;
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(GateError::Stopped));
        }
    }

    fn advance(&self, next: Phase) -> bool {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            return false;
        }
        log::debug!("readiness: {} -> {}", inner.phase.name(), next.name());
        inner.phase = next;
        true
    }

    fn finish(&self, next: Phase, verdict: Result<(), GateError>) -> bool {
        let waiters = {
            let mut inner = self.lock();
            if inner.phase.is_terminal() {
                return false;
            }
            log::debug!(
                "readiness: {} -> {} ({} queued)",
                inner.phase.name(),
                next.name(),
                inner.waiters.len()
            );
            inner.phase = next;
            std::mem::take(&mut inner.waiters)
        };

        // Released front to back, i.e. in arrival order
        for waiter in waiters {
            let _ = waiter.send(verdict.clone());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_gate_passes_immediately() {
        let gate = ReadinessGate::new();
        assert!(gate.ready());
        gate.wait().await.unwrap();
    }

    #[tokio::test]
    async fn transitions_to_ready_only_once() {
        let gate = ReadinessGate::new();
        gate.starting_bundler();
        gate.starting_packager();
        assert!(gate.ready());
        assert!(!gate.ready());
        assert!(!gate.fail(StartupError::Bundler("late".into())));
        assert!(!gate.starting_bundler());
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn failure_rejects_every_queued_request() {
        let gate = ReadinessGate::new();
        gate.starting_bundler();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move { gate.wait().await }));
        }
        while gate.waiting() < 3 {
            tokio::task::yield_now().await;
        }

        gate.fail(StartupError::Configuration("packager missing".into()));

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.to_string().contains("packager missing"));
        }
        assert!(gate.wait().await.is_err());
    }

    /// Queues `count` waiters one at a time; each records its index once released.
    async fn queue_waiters(
        gate: &ReadinessGate,
        count: usize,
    ) -> (
        Arc<std::sync::Mutex<Vec<usize>>>,
        Vec<tokio::task::JoinHandle<Result<(), GateError>>>,
    ) {
        let released = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for index in 0..count {
            let task_gate = gate.clone();
            let released = Arc::clone(&released);
            handles.push(tokio::spawn(async move {
                let result = task_gate.wait().await;
                released.lock().unwrap().push(index);
                result
            }));
            while gate.waiting() < index + 1 {
                tokio::task::yield_now().await;
            }
        }
        (released, handles)
    }

    #[tokio::test]
    async fn releases_waiters_in_arrival_order() {
        let gate = ReadinessGate::new();
        gate.starting_bundler();
        let (released, handles) = queue_waiters(&gate, 5).await;

        gate.ready();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*released.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(gate.waiting(), 0);
    }

    #[tokio::test]
    async fn failure_rejects_waiters_in_arrival_order() {
        let gate = ReadinessGate::new();
        gate.starting_bundler();
        let (released, handles) = queue_waiters(&gate, 5).await;

        gate.fail(StartupError::Bundler("no build".into()));
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(GateError::Failed(_))
            ));
        }

        assert_eq!(*released.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn stop_rejects_waiters_and_is_idempotent() {
        let gate = ReadinessGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        while gate.waiting() < 1 {
            tokio::task::yield_now().await;
        }

        gate.stop();
        gate.stop();
        assert!(matches!(waiter.await.unwrap(), Err(GateError::Stopped)));
        assert!(matches!(gate.phase(), Phase::Stopped));
    }
}
