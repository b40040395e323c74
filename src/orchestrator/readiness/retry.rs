//! Port-reachability polling with a bounded retry policy.

use crate::orchestrator::error::StartupError;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// How often and how many times to probe a port before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between two probes
    pub interval: Duration,
    /// Maximum number of probes, including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_attempts: 120,
        }
    }
}

impl RetryPolicy {
    /// Upper bound on the time spent waiting between probes.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Outcome of one probe.
#[derive(Debug)]
pub enum Probe {
    /// Target is accepting connections
    Reachable,
    /// Not yet; try again after the interval
    Pending,
    /// Stop polling with this error (e.g. the process died)
    Abort(StartupError),
}

/// Probes until `probe` reports [`Probe::Reachable`].
///
/// The probe receives the 1-based attempt number. Returns the attempt that
/// succeeded.
///
/// # Errors
///
/// - [`StartupError::ReadinessTimeout`] after `policy.max_attempts` pending probes
/// - whatever error a probe aborts with
pub async fn wait_until_reachable<F, Fut>(
    policy: RetryPolicy,
    addr: &str,
    mut probe: F,
) -> Result<u32, StartupError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe>,
{
    for attempt in 1..=policy.max_attempts {
        match probe(attempt).await {
            Probe::Reachable => return Ok(attempt),
            Probe::Abort(error) => return Err(error),
            Probe::Pending => {
                log::debug!(
                    "{} not reachable yet (attempt {}/{})",
                    addr,
                    attempt,
                    policy.max_attempts
                );
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(StartupError::ReadinessTimeout {
        addr: addr.to_string(),
        attempts: policy.max_attempts,
    })
}

/// Whether something accepts TCP connections at `addr`.
pub async fn is_port_open(addr: &str) -> bool {
    TcpStream::connect(addr).await.is_ok()
}
