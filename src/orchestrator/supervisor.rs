//! Framework packager process supervision.
//!
//! The child inherits stdio so its own logs reach the operator. Launching it is
//! not a readiness signal; the readiness gate polls the port separately and
//! asks [`Supervisor::exit_status`] whether the process died meanwhile.

use super::error::StartupError;
use super::packager::PackagerCommand;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use tokio::process::{Child, Command};

/// Owner of at most one packager process.
#[derive(Debug, Default)]
pub struct Supervisor {
    child: Mutex<Option<Child>>,
}

impl Supervisor {
    /// Creates a supervisor with no process.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns the packager. Any previously supervised process is killed first.
    ///
    /// Returns the process id.
    ///
    /// # Errors
    ///
    /// [`StartupError::Spawn`] when the OS refuses to launch the program. This is
    /// the spawn-level failure, as opposed to a later crash.
    pub fn spawn(&self, command: &PackagerCommand) -> Result<Option<u32>, StartupError> {
        let mut slot = self.lock();
        if let Some(mut previous) = slot.take() {
            let _ = previous.start_kill();
        }

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StartupError::Spawn {
                command: command.display(),
                source,
            })?;

        let pid = child.id();
        log::info!(
            "Spawned framework packager (pid {}): {}",
            pid.map_or_else(|| "?".to_string(), |p| p.to_string()),
            command.display()
        );
        *slot = Some(child);
        Ok(pid)
    }

    /// Exit status if the process has already exited, without blocking.
    pub fn exit_status(&self) -> Option<String> {
        let mut slot = self.lock();
        let child = slot.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(format!("unknown ({})", e)),
        }
    }

    /// Terminates the process if it is still alive. No-op otherwise.
    ///
    /// Synchronous: the kill signal is sent immediately and the handle is
    /// released; reaping happens in the runtime's background. Returns whether
    /// a running process was signalled.
    pub fn kill(&self) -> bool {
        let Some(mut child) = self.lock().take() else {
            return false;
        };

        if let Ok(Some(_)) = child.try_wait() {
            return false;
        }
        match child.start_kill() {
            Ok(()) => {
                log::info!("Stopped framework packager");
                true
            }
            Err(e) => {
                log::warn!("Failed to kill framework packager: {}", e);
                false
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sh(script: &str) -> PackagerCommand {
        PackagerCommand {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn spawn_failure_is_distinguishable() {
        let supervisor = Supervisor::new();
        let command = PackagerCommand {
            program: PathBuf::from("/nonexistent/packager"),
            args: Vec::new(),
        };
        assert!(matches!(
            supervisor.spawn(&command),
            Err(StartupError::Spawn { .. })
        ));
        assert_eq!(supervisor.exit_status(), None);
        assert!(!supervisor.kill());
    }

    #[tokio::test]
    async fn kill_is_idempotent() {
        let supervisor = Supervisor::new();
        supervisor.spawn(&sh("sleep 30")).unwrap();
        assert_eq!(supervisor.exit_status(), None);

        assert!(supervisor.kill());
        assert!(!supervisor.kill());
        assert_eq!(supervisor.exit_status(), None);
    }

    #[tokio::test]
    async fn reports_early_exit() {
        let supervisor = Supervisor::new();
        supervisor.spawn(&sh("exit 3")).unwrap();

        let mut status = None;
        for _ in 0..200 {
            status = supervisor.exit_status();
            if status.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(status.unwrap().contains('3'));
    }
}
